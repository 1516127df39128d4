//! Shared utilities: model-file framing and the lazy-load latch.

mod serde;
pub use serde::{
    ByteReader, ByteWriter, Deserializable, DeserializationError, Serializable, SliceReader,
};

mod sync;
pub use sync::Latch;
