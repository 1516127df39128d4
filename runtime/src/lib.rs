//! The ribose runtime: loads compiled models and drives transductions.
//!
//! A [Model] is an immutable, shareable view of a compiled model file; a [Transductor] binds one
//! model to a [HostTarget] and an [Output] sink and interprets transducers over pushed input,
//! executing effector side effects against the target.

#![no_std]

#[macro_use]
extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod errors;

mod input;
pub use input::{InputFrame, InputStack};

mod metrics;
pub use metrics::{Metrics, TrapMetric};

mod model;
pub use model::Model;

mod output;
#[cfg(feature = "std")]
pub use output::IoOutput;
pub use output::Output;

mod stack;
pub use stack::{TransducerFrame, TransducerStack};

mod target;
pub use target::{HostEffector, HostTarget};

mod transductor;
pub use transductor::{Status, Transduction, Transductor};

mod value;
pub use value::Value;

// RE-EXPORTS
// ================================================================================================

pub use ribose_core::{BaseTarget, Effect, Signal, Target, Token};
