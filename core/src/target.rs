use alloc::vec::Vec;

use crate::{errors::ParameterError, token::Token};

// TARGET
// ================================================================================================

/// The compile-time face of a transduction target.
///
/// A target names itself and the host effectors it supplies beyond the built-ins; the compiler
/// resolves tape-1 effector references against this list and asks the target to vet parameters
/// for its own effectors. The runtime side extends this with effector instances.
pub trait Target {
    /// The target name recorded in (and checked against) compiled models.
    fn name(&self) -> &str;

    /// Host effector names in ordinal order, following the built-ins at ordinals 19+.
    fn effector_names(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Validates a compile-time parameter for one of this target's own effectors.
    fn validate_parameter(&self, _effector: &str, _tokens: &[Token]) -> Result<(), ParameterError> {
        Ok(())
    }
}

// BASE TARGET
// ================================================================================================

/// The built-in target: no host effectors, only the built-in effector library.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaseTarget;

impl Target for BaseTarget {
    fn name(&self) -> &str {
        "BaseTarget"
    }
}
