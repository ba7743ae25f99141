//! Per-draw material property overrides.

use glam::Vec4;

use crate::handle::TextureHandle;

/// A single property override value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    /// A four-component vector or color.
    Vector(Vec4),
    /// A texture binding.
    Texture(TextureHandle),
}

/// Ordered set of named property overrides applied on top of a material.
///
/// Setting a name twice replaces the earlier value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyBlock {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertyBlock {
    /// Create an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or replace a property.
    pub fn set(&mut self, name: &str, value: PropertyValue) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    /// Set or replace a vector property.
    pub fn set_vector(&mut self, name: &str, value: Vec4) {
        self.set(name, PropertyValue::Vector(value));
    }

    /// Set or replace a texture property.
    pub fn set_texture(&mut self, name: &str, texture: TextureHandle) {
        self.set(name, PropertyValue::Texture(texture));
    }

    /// Look up a property by name.
    pub fn get(&self, name: &str) -> Option<PropertyValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Look up a vector property by name.
    pub fn vector(&self, name: &str) -> Option<Vec4> {
        match self.get(name)? {
            PropertyValue::Vector(v) => Some(v),
            PropertyValue::Texture(_) => None,
        }
    }

    /// Look up a texture property by name.
    pub fn texture(&self, name: &str) -> Option<TextureHandle> {
        match self.get(name)? {
            PropertyValue::Texture(t) => Some(t),
            PropertyValue::Vector(_) => None,
        }
    }

    /// Iterate over all overrides in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, PropertyValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Remove every override.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of overrides.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the block has no overrides.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_existing() {
        let mut block = PropertyBlock::new();
        block.set_vector("lightmap_st", Vec4::ONE);
        block.set_vector("lightmap_st", Vec4::ZERO);
        assert_eq!(block.len(), 1);
        assert_eq!(block.vector("lightmap_st"), Some(Vec4::ZERO));
    }

    #[test]
    fn test_typed_lookup_mismatch_is_none() {
        let mut block = PropertyBlock::new();
        block.set_texture("lightmap", TextureHandle(7));
        assert_eq!(block.texture("lightmap"), Some(TextureHandle(7)));
        assert_eq!(block.vector("lightmap"), None);
        assert_eq!(block.vector("missing"), None);
    }
}
