use std::fmt;

/// Identity of a watched object: the unit of work carried through the queue.
///
/// Carries no payload. A reconciler re-derives current state from the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ResourceKey {
    pub name: String,
    pub namespace: String,
}

impl ResourceKey {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Key for an object that does not live in a namespace
    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }

    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace.is_empty()
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.is_cluster_scoped() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Every object delivered through a watch must expose its identity.
pub trait Identifiable {
    fn key(&self) -> ResourceKey;
}

impl<T: Identifiable> Identifiable for std::sync::Arc<T> {
    fn key(&self) -> ResourceKey {
        (**self).key()
    }
}
