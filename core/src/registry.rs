use alloc::vec::Vec;

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

use crate::{
    effector::BUILT_IN_EFFECTORS,
    signals::{BUILT_IN_SIGNALS, SIGNAL_BASE},
    utils::{ByteReader, ByteWriter, Deserializable, DeserializationError, Serializable},
};

// ORDINAL MAP
// ================================================================================================

/// An insertion-ordered byte-name → ordinal interning map.
///
/// Ordinals are assigned densely from `base` in insertion order, which makes interning
/// deterministic: compiling the same inputs twice assigns the same ordinals.
#[derive(Debug, Clone)]
pub struct OrdinalMap {
    base: u32,
    names: IndexSet<Vec<u8>, FxBuildHasher>,
}

impl OrdinalMap {
    pub fn new(base: u32) -> Self {
        Self {
            base,
            names: IndexSet::with_hasher(FxBuildHasher),
        }
    }

    /// Returns a map pre-seeded with the given names at ordinals `base..`.
    pub fn seeded(base: u32, names: &[&str]) -> Self {
        let mut map = Self::new(base);
        for name in names {
            map.intern(name.as_bytes());
        }
        map
    }

    /// Returns the ordinal for `name`, interning it if it has not been seen before.
    pub fn intern(&mut self, name: &[u8]) -> u32 {
        if let Some(index) = self.names.get_index_of(name) {
            return self.base + index as u32;
        }
        self.names.insert(name.to_vec());
        self.base + (self.names.len() - 1) as u32
    }

    pub fn get(&self, name: &[u8]) -> Option<u32> {
        self.names.get_index_of(name).map(|index| self.base + index as u32)
    }

    pub fn name(&self, ordinal: u32) -> Option<&[u8]> {
        let index = ordinal.checked_sub(self.base)? as usize;
        self.names.get_index(index).map(Vec::as_slice)
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// One past the largest assigned ordinal.
    pub fn limit(&self) -> usize {
        self.base as usize + self.names.len()
    }

    /// Iterates `(ordinal, name)` pairs in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.names
            .iter()
            .enumerate()
            .map(|(index, name)| (self.base + index as u32, name.as_slice()))
    }
}

impl Serializable for OrdinalMap {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_i32(self.names.len() as i32);
        for name in &self.names {
            target.write_byte_string(Some(name));
        }
    }
}

impl OrdinalMap {
    /// Reads a map serialized by [Serializable::write_into], re-anchored at `base`.
    pub fn read_with_base<R: ByteReader>(
        source: &mut R,
        base: u32,
    ) -> Result<Self, DeserializationError> {
        let count = source.read_i32()?;
        if count < 0 {
            return Err(DeserializationError::InvalidValue(format!("negative map size {count}")));
        }
        let mut map = Self::new(base);
        for _ in 0..count {
            let name = source
                .read_byte_string()?
                .ok_or_else(|| DeserializationError::InvalidValue("null map entry".into()))?;
            map.intern(&name);
        }
        Ok(map)
    }
}

// MODEL MAPS
// ================================================================================================

/// The four ordinal namespaces of a model: signals, fields, effectors, transducers.
#[derive(Debug, Clone)]
pub struct ModelMaps {
    pub signals: OrdinalMap,
    pub fields: OrdinalMap,
    pub effectors: OrdinalMap,
    pub transducers: OrdinalMap,
}

impl ModelMaps {
    /// Returns maps pre-seeded with the built-in signals (`nul`, `nil`, `eos`), the anonymous and
    /// all-fields field names, and the built-in effectors.
    pub fn new() -> Self {
        Self {
            signals: OrdinalMap::seeded(SIGNAL_BASE as u32, &BUILT_IN_SIGNALS),
            fields: OrdinalMap::seeded(0, &["0", "*"]),
            effectors: OrdinalMap::seeded(0, &BUILT_IN_EFFECTORS),
            transducers: OrdinalMap::new(0),
        }
    }

    /// Total input-token ordinal count: 256 raw bytes plus all signals.
    pub fn signal_limit(&self) -> usize {
        self.signals.limit()
    }
}

impl Default for ModelMaps {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializable for ModelMaps {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.signals.write_into(target);
        self.fields.write_into(target);
        self.effectors.write_into(target);
        self.transducers.write_into(target);
    }
}

impl Deserializable for ModelMaps {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        Ok(Self {
            signals: OrdinalMap::read_with_base(source, SIGNAL_BASE as u32)?,
            fields: OrdinalMap::read_with_base(source, 0)?,
            effectors: OrdinalMap::read_with_base(source, 0)?,
            transducers: OrdinalMap::read_with_base(source, 0)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let mut map = OrdinalMap::new(0);
        assert_eq!(map.intern(b"alpha"), 0);
        assert_eq!(map.intern(b"beta"), 1);
        assert_eq!(map.intern(b"alpha"), 0);
        assert_eq!(map.get(b"beta"), Some(1));
        assert_eq!(map.name(1), Some(b"beta".as_slice()));
        assert_eq!(map.limit(), 2);
    }

    #[test]
    fn base_offsets_apply() {
        let mut map = OrdinalMap::seeded(256, &["nul", "nil", "eos"]);
        assert_eq!(map.get(b"nul"), Some(256));
        assert_eq!(map.intern(b"http11"), 259);
        assert_eq!(map.limit(), 260);
        assert_eq!(map.name(255), None);
    }

    #[test]
    fn model_maps_roundtrip() {
        let mut maps = ModelMaps::new();
        maps.signals.intern(b"http11");
        maps.fields.intern(b"name");
        maps.transducers.intern(b"LinuxKernel");

        let bytes = maps.to_bytes();
        let decoded = ModelMaps::read_from_bytes(&bytes).unwrap();
        assert_eq!(decoded.signals.get(b"http11"), Some(259));
        assert_eq!(decoded.fields.get(b"name"), Some(2));
        assert_eq!(decoded.effectors.get(b"paste"), Some(crate::effector::PASTE));
        assert_eq!(decoded.transducers.get(b"LinuxKernel"), Some(0));
        assert_eq!(decoded.signal_limit(), 260);
    }
}
