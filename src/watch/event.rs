use std::fmt;

/// Kind of change delivered by a watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Add,
    Update,
    Delete,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Add, EventKind::Update, EventKind::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Add => "add",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subset of event kinds a registration reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFilter {
    add: bool,
    update: bool,
    delete: bool,
}

impl EventFilter {
    pub fn all() -> Self {
        Self {
            add: true,
            update: true,
            delete: true,
        }
    }

    /// An empty slice subscribes to every kind, not to none.
    pub fn from_kinds(kinds: &[EventKind]) -> Self {
        if kinds.is_empty() {
            return Self::all();
        }
        let mut filter = Self {
            add: false,
            update: false,
            delete: false,
        };
        for kind in kinds {
            match kind {
                EventKind::Add => filter.add = true,
                EventKind::Update => filter.update = true,
                EventKind::Delete => filter.delete = true,
            }
        }
        filter
    }

    pub fn accepts(
        &self,
        kind: EventKind,
    ) -> bool {
        match kind {
            EventKind::Add => self.add,
            EventKind::Update => self.update,
            EventKind::Delete => self.delete,
        }
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Typed change notification produced by a watch stream
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<T> {
    Added(T),
    Modified(T),
    /// Carries the last known state of the object
    Deleted(T),
}

impl<T> WatchEvent<T> {
    pub fn kind(&self) -> EventKind {
        match self {
            WatchEvent::Added(_) => EventKind::Add,
            WatchEvent::Modified(_) => EventKind::Update,
            WatchEvent::Deleted(_) => EventKind::Delete,
        }
    }

    pub fn object(&self) -> &T {
        match self {
            WatchEvent::Added(o) | WatchEvent::Modified(o) | WatchEvent::Deleted(o) => o,
        }
    }

    pub fn into_object(self) -> T {
        match self {
            WatchEvent::Added(o) | WatchEvent::Modified(o) | WatchEvent::Deleted(o) => o,
        }
    }
}

/// Result of a full list: every object plus the version to watch from
#[derive(Debug, Clone)]
pub struct ObjectList<T> {
    pub items: Vec<T>,
    pub resource_version: u64,
}
