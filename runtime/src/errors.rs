use alloc::string::String;

use ribose_core::errors::{ModelError, ParameterError};

// EFFECTOR ERROR
// ================================================================================================

/// Errors raised by effector invocations, built-in or host-supplied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EffectorError {
    #[error("sentinel effector ordinal {0} cannot be invoked")]
    SentinelInvocation(u32),
    #[error("effector '{0}' has no scalar form")]
    InvalidScalarInvocation(&'static str),
    #[error("effector '{0}' is not parameterized")]
    NotParameterized(String),
    #[error("effector ordinal {effector} has no parameter {parameter}")]
    UnknownParameter { effector: u32, parameter: u32 },
    #[error("the all-fields sentinel is only valid as a clear parameter")]
    AllFieldsSentinel,
    #[error("{0} cannot arm while another match mode is active")]
    TrapModeActive(&'static str),
    #[error("reset without a preceding mark")]
    ResetWithoutMark,
    #[error("prologue signal requires an empty input stack")]
    PrologueWithInput,
    #[error("output sink failure: {0}")]
    Output(String),
    #[error("host effector failure: {0}")]
    Host(String),
}

// TARGET BINDING ERROR
// ================================================================================================

/// Errors raised while binding a loaded model to a target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetBindingError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("model declares {model} effectors but target '{target}' supplies {target_count}")]
    EffectorCount {
        model: usize,
        target: String,
        target_count: usize,
    },
    #[error("effector ordinal {ordinal} is '{model}' in the model but '{target}' in the target")]
    EffectorMismatch {
        ordinal: u32,
        model: String,
        target: String,
    },
    #[error("invalid parameter for effector '{effector}'")]
    Parameter {
        effector: String,
        #[source]
        source: ParameterError,
    },
    #[error("host effector '{effector}' rejected parameter {parameter}")]
    HostParameter {
        effector: String,
        parameter: usize,
        #[source]
        source: EffectorError,
    },
}

// DOMAIN ERROR
// ================================================================================================

/// A `nul` signal arrived while a domain error was already pending: the transduction cannot
/// recover. Carries a rendered diagnostic naming the offending byte, its equivalence class, the
/// transducer stack, and nearby input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("domain error: {0}")]
pub struct DomainError(pub String);

// RUNTIME ERROR
// ================================================================================================

/// Any error that can escape [Transductor::run][crate::Transductor::run].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Effector(#[from] EffectorError),
    #[error(transparent)]
    Model(#[from] ModelError),
}
