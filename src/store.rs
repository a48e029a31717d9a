use crate::models::{EntityId, Record};

pub trait Identified {
    fn id(&self) -> &EntityId;
}

impl<D> Identified for Record<D> {
    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// Ordered local mirror of one remote collection.
///
/// Order is the server's list order followed by appends in confirmation
/// order; nothing here re-sorts. Callers only mutate after the matching
/// remote call has succeeded.
#[derive(Debug, Clone)]
pub struct EntityStore<T> {
    items: Vec<T>,
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        EntityStore { items: Vec::new() }
    }
}

impl<T: Identified> EntityStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole sequence. Later duplicates of an id are dropped.
    pub fn load(&mut self, entities: Vec<T>) {
        self.items.clear();
        for entity in entities {
            if self.position(entity.id()).is_some() {
                log::warn!("dropping duplicate id {} from loaded snapshot", entity.id());
                continue;
            }
            self.items.push(entity);
        }
    }

    /// Adds to the end. An id that is already present is replaced in place
    /// so the snapshot stays unique.
    pub fn append(&mut self, entity: T) {
        match self.position(entity.id()) {
            Some(i) => {
                log::warn!("appended id {} already present; replacing", entity.id());
                self.items[i] = entity;
            }
            None => self.items.push(entity),
        }
    }

    /// Swaps the element with `id`; returns false (and changes nothing) when absent.
    pub fn replace(&mut self, id: &EntityId, entity: T) -> bool {
        match self.position(id) {
            Some(i) => {
                self.items[i] = entity;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<T> {
        self.position(id).map(|i| self.items.remove(i))
    }

    pub fn get(&self, id: &EntityId) -> Option<&T> {
        self.position(id).map(|i| &self.items[i])
    }

    pub fn position(&self, id: &EntityId) -> Option<usize> {
        self.items.iter().position(|e| e.id() == id)
    }

    pub fn at(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: EntityId,
        label: &'static str,
    }

    impl Identified for Item {
        fn id(&self) -> &EntityId {
            &self.id
        }
    }

    fn item(id: &str, label: &'static str) -> Item {
        Item {
            id: EntityId::new(id),
            label,
        }
    }

    fn labels(store: &EntityStore<Item>) -> Vec<&'static str> {
        store.iter().map(|i| i.label).collect()
    }

    #[test]
    fn load_keeps_server_order() {
        let mut store = EntityStore::new();
        store.load(vec![item("3", "c"), item("1", "a"), item("2", "b")]);
        assert_eq!(labels(&store), vec!["c", "a", "b"]);

        store.load(vec![item("9", "z")]);
        assert_eq!(labels(&store), vec!["z"]);
    }

    #[test]
    fn load_drops_duplicate_ids() {
        let mut store = EntityStore::new();
        store.load(vec![item("1", "a"), item("1", "again"), item("2", "b")]);
        assert_eq!(labels(&store), vec!["a", "b"]);
    }

    #[test]
    fn append_goes_to_the_end() {
        let mut store = EntityStore::new();
        store.load(vec![item("1", "a")]);
        store.append(item("2", "b"));
        assert_eq!(labels(&store), vec!["a", "b"]);
    }

    #[test]
    fn replace_is_in_place_and_size_preserving() {
        let mut store = EntityStore::new();
        store.load(vec![item("1", "a"), item("2", "b"), item("3", "c")]);
        assert!(store.replace(&EntityId::new("2"), item("2", "B")));
        assert_eq!(labels(&store), vec!["a", "B", "c"]);
        assert_eq!(store.len(), 3);

        assert!(!store.replace(&EntityId::new("7"), item("7", "x")));
        assert_eq!(labels(&store), vec!["a", "B", "c"]);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut store = EntityStore::new();
        store.load(vec![item("1", "a"), item("2", "b")]);
        assert!(store.remove(&EntityId::new("1")).is_some());
        assert!(store.remove(&EntityId::new("1")).is_none());
        assert_eq!(labels(&store), vec!["b"]);
    }
}
