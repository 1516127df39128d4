use alloc::string::String;

use crate::utils::DeserializationError;

// MODEL ERROR
// ================================================================================================

/// Errors raised while loading or validating a compiled model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("malformed model data")]
    Framing(#[from] DeserializationError),
    #[error("model version '{0}' is not supported")]
    UnsupportedVersion(String),
    #[error("model was compiled for target '{model}' but bound to target '{target}'")]
    TargetMismatch { model: String, target: String },
    #[error("model does not contain transducer '{0}'")]
    UnknownTransducer(String),
    #[error("transducer record for '{0}' is corrupt: {1}")]
    CorruptTransducer(String, DeserializationError),
}

// PARAMETER ERROR
// ================================================================================================

/// Errors raised while compiling an effector parameter from its token array.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterError {
    #[error("effector '{effector}' takes {expected}")]
    WrongArity {
        effector: &'static str,
        expected: &'static str,
    },
    #[error("effector '{effector}' cannot take parameter {token}")]
    BadTokenType { effector: &'static str, token: String },
    #[error("effector '{effector}' expects a decimal count, got {token}")]
    InvalidNumber { effector: &'static str, token: String },
    #[error("unknown signal reference '{0}'")]
    UnknownSignal(String),
    #[error("unknown field reference '{0}'")]
    UnknownField(String),
    #[error("unknown transducer reference '{0}'")]
    UnknownTransducer(String),
    #[error("effector '{0}' is not parameterized")]
    NotParameterized(&'static str),
    #[error("sentinel effector '{0}' cannot be invoked")]
    SentinelEffector(&'static str),
}
