//! Dense table of tracked objects with swap-remove deletion.

use std::mem;

use impostor_atlas::OwnerId;
use rustc_hash::FxHashMap;

use crate::object::{ImpostorSettings, TrackedObject};

/// Tracked objects stored contiguously for the parallel stages, with an
/// owner → index map for lookups.
#[derive(Debug, Default)]
pub struct ObjectTable {
    objects: Vec<TrackedObject>,
    index_of: FxHashMap<OwnerId, usize>,
}

impl ObjectTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an object. Returns `false` and leaves the table unchanged if
    /// the owner is already tracked.
    pub fn push(&mut self, object: TrackedObject) -> bool {
        if self.index_of.contains_key(&object.owner) {
            log::warn!("Object {} is already tracked", object.owner);
            return false;
        }
        self.index_of.insert(object.owner, self.objects.len());
        self.objects.push(object);
        true
    }

    /// Remove an object by moving the last one into its place.
    pub fn remove(&mut self, owner: OwnerId) -> Option<TrackedObject> {
        let index = self.index_of.remove(&owner)?;
        let removed = self.objects.swap_remove(index);
        assert_eq!(
            removed.owner, owner,
            "object table index for {owner} pointed at {}",
            removed.owner
        );
        if let Some(moved) = self.objects.get(index) {
            self.index_of.insert(moved.owner, index);
        }
        Some(removed)
    }

    /// Replace an object's settings. Returns `false` if it is not tracked.
    pub fn update_settings(&mut self, owner: OwnerId, settings: ImpostorSettings) -> bool {
        match self.get_mut(owner) {
            Some(object) => {
                object.settings = settings;
                true
            }
            None => false,
        }
    }

    /// Look up an object.
    pub fn get(&self, owner: OwnerId) -> Option<&TrackedObject> {
        self.index_of.get(&owner).map(|&i| &self.objects[i])
    }

    /// Look up an object mutably.
    pub fn get_mut(&mut self, owner: OwnerId) -> Option<&mut TrackedObject> {
        let index = *self.index_of.get(&owner)?;
        self.objects.get_mut(index)
    }

    /// Dense index of an object.
    pub fn index_of(&self, owner: OwnerId) -> Option<usize> {
        self.index_of.get(&owner).copied()
    }

    /// Returns `true` if the owner is tracked.
    pub fn contains(&self, owner: OwnerId) -> bool {
        self.index_of.contains_key(&owner)
    }

    /// All objects, in table order.
    pub fn objects(&self) -> &[TrackedObject] {
        &self.objects
    }

    /// All objects, mutably. The slice cannot be resized, so the index map
    /// stays valid.
    pub fn objects_mut(&mut self) -> &mut [TrackedObject] {
        &mut self.objects
    }

    /// Number of tracked objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// CPU bytes held by the table.
    pub fn used_bytes(&self) -> usize {
        self.objects.capacity() * mem::size_of::<TrackedObject>()
            + self.index_of.capacity() * mem::size_of::<(OwnerId, usize)>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{LodThresholds, ObjectData};

    fn object(raw: u32) -> TrackedObject {
        TrackedObject::new(
            OwnerId::new(raw).unwrap(),
            ObjectData::default(),
            LodThresholds {
                switch: 0.5,
                cull: 0.01,
            },
            ImpostorSettings::default(),
        )
    }

    fn id(raw: u32) -> OwnerId {
        OwnerId::new(raw).unwrap()
    }

    #[test]
    fn test_push_rejects_duplicate() {
        let mut table = ObjectTable::new();
        assert!(table.push(object(1)));
        assert!(!table.push(object(1)));
        assert_eq!(table.len(), 1);
    }

    /// Removing from the middle moves the last object into the hole and
    /// keeps every lookup pointing at the right record.
    #[test]
    fn test_swap_remove_reindexes() {
        let mut table = ObjectTable::new();
        for raw in 1..=4 {
            table.push(object(raw));
        }
        let removed = table.remove(id(2)).unwrap();
        assert_eq!(removed.owner, id(2));
        assert_eq!(table.len(), 3);
        assert_eq!(table.index_of(id(4)), Some(1));
        assert_eq!(table.objects()[1].owner, id(4));
        for raw in [1, 3, 4] {
            assert_eq!(table.get(id(raw)).unwrap().owner, id(raw));
        }
        assert!(table.get(id(2)).is_none());
    }

    #[test]
    fn test_remove_last_and_unknown() {
        let mut table = ObjectTable::new();
        table.push(object(1));
        table.push(object(2));
        assert!(table.remove(id(2)).is_some());
        assert!(table.remove(id(2)).is_none());
        assert_eq!(table.index_of(id(1)), Some(0));
        assert!(table.remove(id(1)).is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn test_update_settings() {
        let mut table = ObjectTable::new();
        table.push(object(1));
        let settings = ImpostorSettings {
            delta_camera_angle: 5.0,
            ..Default::default()
        };
        assert!(table.update_settings(id(1), settings));
        assert_eq!(table.get(id(1)).unwrap().settings, settings);
        assert!(!table.update_settings(id(9), settings));
    }

    #[test]
    fn test_used_bytes_grows() {
        let mut table = ObjectTable::new();
        let empty = table.used_bytes();
        for raw in 1..=16 {
            table.push(object(raw));
        }
        assert!(table.used_bytes() > empty);
    }
}
