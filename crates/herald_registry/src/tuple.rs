//! Service tuples and wildcard templates.

/// Kind tag carried by every service registration tuple.
pub const NAME_KIND: &str = "name";

/// Reference to an advertised object.
///
/// `Remote` handles point at an object living behind some endpoint and can
/// be probed for liveness. `Local` values are plain data carried in the
/// tuple itself, with nothing to probe. Equality is identity of the
/// reference, never the state of whatever it points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceHandle {
    Local(String),
    Remote(RemoteRef),
}

/// Identity of a remote object: where it lives and which object it is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteRef {
    pub endpoint: String,
    pub object_ref: u64,
}

impl RemoteRef {
    pub fn new(endpoint: &str, object_ref: u64) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            object_ref,
        }
    }
}

impl ServiceHandle {
    pub fn remote(endpoint: &str, object_ref: u64) -> Self {
        Self::Remote(RemoteRef::new(endpoint, object_ref))
    }

    pub fn local(value: &str) -> Self {
        Self::Local(value.to_string())
    }

    pub fn as_remote(&self) -> Option<&RemoteRef> {
        match self {
            Self::Remote(r) => Some(r),
            Self::Local(_) => None,
        }
    }
}

/// One registration: `(kind, label, handle, identifier)`.
///
/// `label` names the service type, `identifier` disambiguates multiple
/// registrants of the same label. A registration cycle writes a fresh
/// tuple; a stale one is superseded by lease lapse, never updated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceTuple {
    pub kind: String,
    pub label: String,
    pub handle: ServiceHandle,
    pub identifier: String,
}

impl ServiceTuple {
    pub fn new(label: &str, handle: ServiceHandle, identifier: &str) -> Self {
        Self {
            kind: NAME_KIND.to_string(),
            label: label.to_string(),
            handle,
            identifier: identifier.to_string(),
        }
    }
}

/// An entry as read back from a registry.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredEntry {
    pub label: String,
    pub handle: ServiceHandle,
    pub identifier: String,
}

impl From<ServiceTuple> for DiscoveredEntry {
    fn from(tuple: ServiceTuple) -> Self {
        Self {
            label: tuple.label,
            handle: tuple.handle,
            identifier: tuple.identifier,
        }
    }
}

/// Query pattern over stored tuples. A `None` field matches any value in
/// that position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template {
    pub kind: Option<String>,
    pub label: Option<String>,
    pub handle: Option<ServiceHandle>,
    pub identifier: Option<String>,
}

impl Template {
    /// `(name, *, *, *)`: every service registration.
    pub fn any_service() -> Self {
        Self {
            kind: Some(NAME_KIND.to_string()),
            ..Default::default()
        }
    }

    /// `(name, label, *, *)`: every registrant of one label.
    pub fn service(label: &str) -> Self {
        Self {
            kind: Some(NAME_KIND.to_string()),
            label: Some(label.to_string()),
            ..Default::default()
        }
    }

    /// `(name, label, *, identifier)`: one registrant's entries.
    pub fn registration(label: &str, identifier: &str) -> Self {
        Self {
            kind: Some(NAME_KIND.to_string()),
            label: Some(label.to_string()),
            handle: None,
            identifier: Some(identifier.to_string()),
        }
    }

    pub fn matches(&self, tuple: &ServiceTuple) -> bool {
        fn field<T: PartialEq>(pattern: &Option<T>, value: &T) -> bool {
            match pattern {
                Some(p) => p == value,
                None => true,
            }
        }

        field(&self.kind, &tuple.kind)
            && field(&self.label, &tuple.label)
            && field(&self.handle, &tuple.handle)
            && field(&self.identifier, &tuple.identifier)
    }
}
