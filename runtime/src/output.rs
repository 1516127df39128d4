use alloc::{string::ToString, vec::Vec};

use crate::errors::EffectorError;

// OUTPUT SINK
// ================================================================================================

/// The sink the `out` effector writes to.
pub trait Output {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), EffectorError>;
}

impl Output for Vec<u8> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), EffectorError> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Adapts any [std::io::Write] into an [Output].
#[cfg(feature = "std")]
pub struct IoOutput<W: std::io::Write>(pub W);

#[cfg(feature = "std")]
impl<W: std::io::Write> Output for IoOutput<W> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), EffectorError> {
        self.0.write_all(bytes).map_err(|err| EffectorError::Output(err.to_string()))
    }
}
