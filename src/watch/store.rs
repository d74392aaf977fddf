use dashmap::DashMap;

use crate::Identifiable;
use crate::ResourceKey;

/// Local cache of the last observed state of every object in a watch.
///
/// Written only by its informer; readable from anywhere.
pub struct Store<T> {
    objects: DashMap<ResourceKey, T>,
}

impl<T> Default for Store<T>
where T: Identifiable + Clone
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Store<T>
where T: Identifiable + Clone
{
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
        }
    }

    pub fn get(
        &self,
        key: &ResourceKey,
    ) -> Option<T> {
        self.objects.get(key).map(|o| o.value().clone())
    }

    pub fn list(&self) -> Vec<T> {
        self.objects.iter().map(|o| o.value().clone()).collect()
    }

    pub fn keys(&self) -> Vec<ResourceKey> {
        self.objects.iter().map(|o| o.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Returns the previous state, if any
    pub(crate) fn insert(
        &self,
        object: T,
    ) -> Option<T> {
        self.objects.insert(object.key(), object)
    }

    pub(crate) fn remove(
        &self,
        key: &ResourceKey,
    ) -> Option<T> {
        self.objects.remove(key).map(|(_, o)| o)
    }
}
