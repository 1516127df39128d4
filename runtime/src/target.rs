use alloc::{boxed::Box, format, string::{String, ToString}, vec::Vec};

use ribose_core::{BaseTarget, Effect, Target, Token};

use crate::{errors::EffectorError, transductor::Transduction};

// HOST TARGET
// ================================================================================================

/// The runtime face of a transduction target: the compile-time [Target] contract plus the host
/// effector instances bound at ordinals 19 and above.
pub trait HostTarget: Target {
    /// Host effector instances, in the same order as [Target::effector_names].
    fn effectors(&self) -> Vec<Box<dyn HostEffector<Self>>>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

impl HostTarget for BaseTarget {}

// HOST EFFECTOR
// ================================================================================================

/// A host-supplied effector.
///
/// Scalar effectors implement [invoke][Self::invoke]; parameterized effectors additionally
/// implement the `*_parameter*` entry points and own their compiled parameters, indexed by the
/// parameter ordinal the compiler interned. The default parameterized entry points report an
/// error, so a scalar effector needs nothing beyond `name` and `invoke`.
pub trait HostEffector<T: HostTarget> {
    fn name(&self) -> &str;

    fn invoke(
        &mut self,
        target: &mut T,
        tx: &mut Transduction,
    ) -> Result<Effect, EffectorError>;

    /// Called once at bind time with the number of parameters the model carries.
    fn allocate_parameters(&mut self, _count: usize) {}

    /// Compiles the raw token array at `index` into this effector's parameter storage.
    fn compile_parameter(
        &mut self,
        _index: usize,
        _tokens: &[Token],
    ) -> Result<(), EffectorError> {
        Err(EffectorError::NotParameterized(self.name().to_string()))
    }

    fn invoke_parameterized(
        &mut self,
        _target: &mut T,
        _tx: &mut Transduction,
        _index: usize,
    ) -> Result<Effect, EffectorError> {
        Err(EffectorError::NotParameterized(self.name().to_string()))
    }

    /// Renders the parameter at `index` for diagnostics.
    fn show_parameter(&self, index: usize) -> String {
        format!("[{index}]")
    }
}
