use crate::Identifiable;
use crate::ResourceKey;

/// Namespaced test object with an opaque payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    pub name: String,
    pub namespace: String,
    pub data: String,
}

impl Identifiable for Secret {
    fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.name, &self.namespace)
    }
}

pub fn secret(
    name: &str,
    namespace: &str,
) -> Secret {
    Secret {
        name: name.to_string(),
        namespace: namespace.to_string(),
        data: String::new(),
    }
}

pub fn secret_with_data(
    name: &str,
    namespace: &str,
    data: &str,
) -> Secret {
    Secret {
        data: data.to_string(),
        ..secret(name, namespace)
    }
}
