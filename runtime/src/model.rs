use alloc::{boxed::Box, string::ToString, sync::Arc, vec::Vec};

use ribose_core::{
    ModelIndex, ModelMaps, ModelPreamble, ParameterTokens, Transducer,
    errors::ModelError,
    utils::{Deserializable, Latch, SliceReader},
};

// MODEL
// ================================================================================================

/// A loaded model: the raw byte image, the parsed preamble and index, and one lazy-load latch
/// per transducer ordinal.
///
/// Transducer records decode on first reference; the per-ordinal latch serializes concurrent
/// loaders while everything else stays immutable and shareable.
pub struct Model {
    image: Vec<u8>,
    preamble: ModelPreamble,
    index: ModelIndex,
    slots: Box<[Latch<Transducer>]>,
}

impl Model {
    /// Parses a model image, refusing unsupported versions.
    pub fn load(image: Vec<u8>) -> Result<Self, ModelError> {
        let preamble = ModelPreamble::read_from_bytes(&image)?;
        if !preamble.is_supported() {
            return Err(ModelError::UnsupportedVersion(preamble.version));
        }
        let index_offset = preamble.index_offset as usize;
        if index_offset >= image.len() {
            return Err(ModelError::Framing(
                ribose_core::utils::DeserializationError::UnexpectedEof,
            ));
        }
        let index = ModelIndex::read_from(&mut SliceReader::new(&image[index_offset..]))?;
        let slots = (0..index.transducers.len()).map(|_| Latch::new()).collect();
        Ok(Self { image, preamble, index, slots })
    }

    /// Reads and parses a model file.
    #[cfg(feature = "std")]
    pub fn open(path: &std::path::Path) -> Result<Self, ModelError> {
        let image = std::fs::read(path).map_err(|err| {
            ModelError::Framing(ribose_core::utils::DeserializationError::InvalidValue(
                alloc::format!("cannot read model file: {err}"),
            ))
        })?;
        Self::load(image)
    }

    pub fn version(&self) -> &str {
        &self.preamble.version
    }

    pub fn target_name(&self) -> &str {
        &self.preamble.target_name
    }

    pub fn maps(&self) -> &ModelMaps {
        &self.index.maps
    }

    pub fn signal_limit(&self) -> usize {
        self.index.maps.signal_limit()
    }

    pub fn field_count(&self) -> usize {
        self.index.maps.fields.len()
    }

    /// Raw parameter token arrays, indexed by effector ordinal.
    pub fn parameters(&self) -> &[Vec<ParameterTokens>] {
        &self.index.parameters
    }

    pub fn transducer_ordinal(&self, name: &str) -> Option<u32> {
        self.index.maps.transducers.get(name.as_bytes())
    }

    /// The named transducer, decoding it on first reference.
    pub fn transducer_named(&self, name: &str) -> Result<Arc<Transducer>, ModelError> {
        let ordinal = self
            .transducer_ordinal(name)
            .ok_or_else(|| ModelError::UnknownTransducer(name.to_string()))?;
        self.transducer(ordinal)
    }

    /// The transducer at `ordinal`, decoding it on first reference.
    ///
    /// Concurrent callers of a not-yet-ready ordinal spin on its latch; exactly one decodes.
    pub fn transducer(&self, ordinal: u32) -> Result<Arc<Transducer>, ModelError> {
        let entry = self
            .index
            .transducers
            .get(ordinal as usize)
            .ok_or_else(|| ModelError::UnknownTransducer(ordinal.to_string()))?;
        let slot = &self.slots[ordinal as usize];
        slot.get_or_try_init(|| self.decode(entry.name.as_str(), entry.offset))
    }

    fn decode(&self, name: &str, offset: u64) -> Result<Transducer, ModelError> {
        let offset = offset as usize;
        if offset >= self.image.len() {
            return Err(ModelError::CorruptTransducer(
                name.to_string(),
                ribose_core::utils::DeserializationError::UnexpectedEof,
            ));
        }
        let mut reader = SliceReader::new(&self.image[offset..]);
        let transducer = Transducer::read_from(&mut reader)
            .map_err(|err| ModelError::CorruptTransducer(name.to_string(), err))?;

        if transducer.name() != name {
            return Err(ModelError::CorruptTransducer(
                name.to_string(),
                ribose_core::utils::DeserializationError::InvalidValue(alloc::format!(
                    "record names '{}'",
                    transducer.name()
                )),
            ));
        }
        if transducer.input_filter().len() != self.signal_limit() {
            return Err(ModelError::CorruptTransducer(
                name.to_string(),
                ribose_core::utils::DeserializationError::InvalidValue(
                    "equivalence map does not span the model signal limit".into(),
                ),
            ));
        }
        Ok(transducer)
    }
}
