#![no_std]

#[macro_use]
extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod errors;
pub mod utils;

pub mod effector;
pub use effector::{
    BUILT_IN_EFFECTORS, BuiltinParam, EFFECT_INPUT, EFFECT_NONE, EFFECT_PAUSE, EFFECT_SIGNAL,
    EFFECT_START, EFFECT_STOP, EFFECT_STOPPED, Effect, OutToken, compile_builtin_parameter,
    effect_signal, signal_of_effect,
};

mod registry;
pub use registry::{ModelMaps, OrdinalMap};

mod signals;
pub use signals::{BUILT_IN_SIGNALS, SIGNAL_BASE, Signal};

mod token;
pub use token::Token;

mod transducer;
pub use transducer::{
    Transducer, action_effector, action_parameter, cell, cell_action, cell_state, is_parametric,
    parametric_action,
};

mod model;
pub use model::{
    MODEL_VERSION, MODEL_VERSION_PREVIOUS, ModelIndex, ModelPreamble, ParameterTokens,
    TransducerEntry,
};

mod target;
pub use target::{BaseTarget, Target};
