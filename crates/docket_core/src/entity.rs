//! Entity lifecycle tracking.
//!
//! Every repository keeps an [`EntitySet`]: the entities touched in the
//! current attempt together with their [`TrackingMode`]. Modes change only
//! through [`EntitySet::add`], [`EntitySet::remove`] and [`EntitySet::track`]:
//!
//! | current     | `add`     | `remove`    | `track`        |
//! |-------------|-----------|-------------|----------------|
//! | absent      | Create    | Delete      | Tracked        |
//! | `Untracked` | Create    | Untracked   | Untracked      |
//! | `Create`    | Create    | Untracked   | Create         |
//! | `Tracked`   | Tracked   | Delete      | Tracked        |
//! | `Delete`    | Tracked   | Delete      | Delete         |
//!
//! Every transition stores the model it was given, so the latest `add` of an
//! id wins.

use std::fmt;

/// A model with a unique id.
pub trait Identifiable {
    /// Returns the unique id.
    fn id(&self) -> &str;
}

/// Lifecycle mode of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackingMode {
    /// Known but produces no operation.
    Untracked,
    /// New entity to be created.
    Create,
    /// Entity that was read and may be updated.
    Tracked,
    /// Entity to be deleted.
    Delete,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackingMode::Untracked => "untracked",
            TrackingMode::Create => "create",
            TrackingMode::Tracked => "tracked",
            TrackingMode::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// An entity and its lifecycle mode.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEntity<T> {
    /// The latest model stored for this id.
    pub model: T,
    /// Current lifecycle mode.
    pub mode: TrackingMode,
}

/// Ordered per-repository set of tracked entities.
///
/// Entities keep the order in which their id was first seen; operations are
/// emitted in that order.
#[derive(Debug, Clone)]
pub struct EntitySet<T> {
    entries: Vec<TrackedEntity<T>>,
}

impl<T> Default for EntitySet<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Identifiable> EntitySet<T> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.model.id() == id)
    }

    /// Marks `model` for persistence.
    pub fn add(&mut self, model: T) {
        match self.position(model.id()) {
            Some(i) => {
                let entry = &mut self.entries[i];
                entry.mode = match entry.mode {
                    TrackingMode::Delete | TrackingMode::Tracked => TrackingMode::Tracked,
                    TrackingMode::Untracked | TrackingMode::Create => TrackingMode::Create,
                };
                entry.model = model;
            }
            None => self.entries.push(TrackedEntity {
                model,
                mode: TrackingMode::Create,
            }),
        }
    }

    /// Marks `model` for deletion.
    ///
    /// Removing an entity that was only added in this attempt cancels the
    /// create instead.
    pub fn remove(&mut self, model: T) {
        match self.position(model.id()) {
            Some(i) => {
                let entry = &mut self.entries[i];
                entry.mode = match entry.mode {
                    TrackingMode::Tracked | TrackingMode::Delete => TrackingMode::Delete,
                    TrackingMode::Create | TrackingMode::Untracked => TrackingMode::Untracked,
                };
                entry.model = model;
            }
            None => self.entries.push(TrackedEntity {
                model,
                mode: TrackingMode::Delete,
            }),
        }
    }

    /// Records a model that was just read.
    ///
    /// Replaces the stored model of a known id without touching its mode;
    /// otherwise inserts it as [`TrackingMode::Tracked`].
    pub fn track(&mut self, model: T) {
        match self.position(model.id()) {
            Some(i) => self.entries[i].model = model,
            None => self.entries.push(TrackedEntity {
                model,
                mode: TrackingMode::Tracked,
            }),
        }
    }

    /// Returns the mode of `id`, or `None` if it was never seen.
    #[must_use]
    pub fn mode(&self, id: &str) -> Option<TrackingMode> {
        self.position(id).map(|i| self.entries[i].mode)
    }

    /// Returns the stored model of `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&T> {
        self.position(id).map(|i| &self.entries[i].model)
    }

    /// Forgets every entity.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the number of entities, in any mode.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entities in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedEntity<T>> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        name: String,
    }

    impl Identifiable for Item {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn item(id: &str, name: &str) -> Item {
        Item {
            id: id.into(),
            name: name.into(),
        }
    }

    #[test]
    fn add_new_is_create() {
        let mut set = EntitySet::new();
        set.add(item("a", "x"));
        assert_eq!(set.mode("a"), Some(TrackingMode::Create));
    }

    #[test]
    fn add_then_remove_is_untracked() {
        let mut set = EntitySet::new();
        set.add(item("a", "x"));
        set.remove(item("a", "x"));
        assert_eq!(set.mode("a"), Some(TrackingMode::Untracked));
    }

    #[test]
    fn untracked_add_is_create_again() {
        let mut set = EntitySet::new();
        set.add(item("a", "x"));
        set.remove(item("a", "x"));
        set.add(item("a", "y"));
        assert_eq!(set.mode("a"), Some(TrackingMode::Create));
        assert_eq!(set.get("a").unwrap().name, "y");
    }

    #[test]
    fn remove_unknown_is_delete() {
        let mut set = EntitySet::new();
        set.remove(item("a", "x"));
        assert_eq!(set.mode("a"), Some(TrackingMode::Delete));
    }

    #[test]
    fn tracked_remove_is_delete_and_add_resurrects() {
        let mut set = EntitySet::new();
        set.track(item("a", "x"));
        assert_eq!(set.mode("a"), Some(TrackingMode::Tracked));
        set.remove(item("a", "x"));
        assert_eq!(set.mode("a"), Some(TrackingMode::Delete));
        set.remove(item("a", "x"));
        assert_eq!(set.mode("a"), Some(TrackingMode::Delete));
        set.add(item("a", "x"));
        assert_eq!(set.mode("a"), Some(TrackingMode::Tracked));
    }

    #[test]
    fn second_add_replaces_model() {
        let mut set = EntitySet::new();
        set.add(item("a", "first"));
        set.add(item("a", "second"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.mode("a"), Some(TrackingMode::Create));
        assert_eq!(set.get("a").unwrap().name, "second");
    }

    #[test]
    fn track_replaces_model_but_keeps_mode() {
        let mut set = EntitySet::new();
        set.add(item("a", "old"));
        set.track(item("a", "new"));
        assert_eq!(set.mode("a"), Some(TrackingMode::Create));
        assert_eq!(set.get("a").unwrap().name, "new");

        set.remove(item("b", "x"));
        set.track(item("b", "y"));
        assert_eq!(set.mode("b"), Some(TrackingMode::Delete));
    }

    #[test]
    fn iteration_follows_first_seen_order() {
        let mut set = EntitySet::new();
        set.add(item("c", ""));
        set.track(item("a", ""));
        set.add(item("b", ""));
        set.add(item("c", "again"));
        let ids: Vec<_> = set.iter().map(|e| e.model.id.clone()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut set = EntitySet::new();
        set.add(item("a", ""));
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.mode("a"), None);
    }
}
