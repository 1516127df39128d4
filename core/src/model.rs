use alloc::{string::String, vec::Vec};

use crate::{
    registry::ModelMaps,
    utils::{ByteReader, ByteWriter, Deserializable, DeserializationError, Serializable},
};

// MODEL VERSIONS
// ================================================================================================

/// Version string written into new model files.
pub const MODEL_VERSION: &str = "ribose:0.2";

/// Previous version string still accepted by the loader.
pub const MODEL_VERSION_PREVIOUS: &str = "ribose:0.1";

// PREAMBLE
// ================================================================================================

/// The model-file preamble.
///
/// `index_offset` occupies the first 8 bytes of the file so the compiler can rewrite it after the
/// index block lands; it points at the serialized [ModelIndex].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPreamble {
    pub index_offset: u64,
    pub version: String,
    pub target_name: String,
}

impl ModelPreamble {
    /// Returns true if `version` is one the loader understands.
    pub fn is_supported(&self) -> bool {
        self.version == MODEL_VERSION || self.version == MODEL_VERSION_PREVIOUS
    }
}

impl Serializable for ModelPreamble {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_u64(self.index_offset);
        target.write_byte_string(Some(self.version.as_bytes()));
        target.write_byte_string(Some(self.target_name.as_bytes()));
    }
}

impl Deserializable for ModelPreamble {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let index_offset = source.read_u64()?;
        let version = read_string(source, "model version")?;
        let target_name = read_string(source, "target name")?;
        Ok(Self { index_offset, version, target_name })
    }
}

// INDEX BLOCK
// ================================================================================================

/// A transducer's position in the model file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransducerEntry {
    pub name: String,
    pub offset: u64,
}

/// The raw token arrays of one effector parameter, sigils included.
pub type ParameterTokens = Vec<Vec<u8>>;

/// The model index block: the four ordinal maps, per-transducer file offsets, and per-effector
/// parameter token arrays.
#[derive(Debug, Clone)]
pub struct ModelIndex {
    pub maps: ModelMaps,
    pub transducers: Vec<TransducerEntry>,
    /// Indexed by effector ordinal, then parameter index.
    pub parameters: Vec<Vec<ParameterTokens>>,
}

impl Serializable for ModelIndex {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.maps.write_into(target);

        for entry in &self.transducers {
            target.write_byte_string(Some(entry.name.as_bytes()));
            target.write_u64(entry.offset);
        }

        target.write_i32(self.parameters.len() as i32);
        for params in &self.parameters {
            target.write_i32(params.len() as i32);
            for tokens in params {
                target.write_i32(tokens.len() as i32);
                for token in tokens {
                    target.write_byte_string(Some(token));
                }
            }
        }
    }
}

impl Deserializable for ModelIndex {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let maps = ModelMaps::read_from(source)?;

        let mut transducers = Vec::with_capacity(maps.transducers.len());
        for _ in 0..maps.transducers.len() {
            let name = read_string(source, "transducer name")?;
            let offset = source.read_u64()?;
            transducers.push(TransducerEntry { name, offset });
        }

        let effector_count = read_count(source, "effector parameter table size")?;
        let mut parameters = Vec::with_capacity(effector_count);
        for _ in 0..effector_count {
            let param_count = read_count(source, "parameter count")?;
            let mut params = Vec::with_capacity(param_count);
            for _ in 0..param_count {
                let token_count = read_count(source, "token count")?;
                let mut tokens = Vec::with_capacity(token_count);
                for _ in 0..token_count {
                    tokens.push(source.read_byte_string()?.ok_or_else(|| {
                        DeserializationError::InvalidValue("null parameter token".into())
                    })?);
                }
                params.push(tokens);
            }
            parameters.push(params);
        }

        Ok(Self { maps, transducers, parameters })
    }
}

fn read_string<R: ByteReader>(source: &mut R, what: &str) -> Result<String, DeserializationError> {
    let bytes = source
        .read_byte_string()?
        .ok_or_else(|| DeserializationError::InvalidValue(format!("null {what}")))?;
    String::from_utf8(bytes)
        .map_err(|_| DeserializationError::InvalidValue(format!("{what} is not utf-8")))
}

fn read_count<R: ByteReader>(source: &mut R, what: &str) -> Result<usize, DeserializationError> {
    let value = source.read_i32()?;
    if value < 0 {
        return Err(DeserializationError::InvalidValue(format!("negative {what}: {value}")));
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_roundtrip() {
        let preamble = ModelPreamble {
            index_offset: 0x1234,
            version: MODEL_VERSION.into(),
            target_name: "BaseTarget".into(),
        };
        let bytes = preamble.to_bytes();
        // the index offset occupies the first 8 bytes for in-place rewriting
        assert_eq!(&bytes[..8], &0x1234u64.to_be_bytes());

        let decoded = ModelPreamble::read_from_bytes(&bytes).unwrap();
        assert_eq!(decoded, preamble);
        assert!(decoded.is_supported());
    }

    #[test]
    fn index_roundtrip() {
        let mut maps = ModelMaps::new();
        maps.transducers.intern(b"First");
        maps.transducers.intern(b"Second");
        let index = ModelIndex {
            maps,
            transducers: vec![
                TransducerEntry { name: "First".into(), offset: 100 },
                TransducerEntry { name: "Second".into(), offset: 220 },
            ],
            parameters: vec![vec![], vec![vec![b"~name".to_vec(), b"rest".to_vec()]]],
        };

        let bytes = index.to_bytes();
        let decoded = ModelIndex::read_from_bytes(&bytes).unwrap();
        assert_eq!(decoded.transducers, index.transducers);
        assert_eq!(decoded.parameters, index.parameters);
        assert_eq!(decoded.maps.transducers.get(b"Second"), Some(1));
    }
}
