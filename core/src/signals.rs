use core::fmt;

use derive_more::From;

// SIGNALS
// ================================================================================================

/// First signal ordinal; token ordinals below this are raw byte values.
pub const SIGNAL_BASE: usize = 256;

/// Built-in signal names, in ordinal order starting at [SIGNAL_BASE].
pub const BUILT_IN_SIGNALS: [&str; 3] = ["nul", "nil", "eos"];

/// A virtual input token with ordinal ≥ [SIGNAL_BASE].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, From)]
pub struct Signal(u32);

impl Signal {
    /// Domain error signal, raised when input has no transition in the current state.
    pub const NUL: Signal = Signal(SIGNAL_BASE as u32);
    /// Start marker, conventionally the first token a transduction consumes.
    pub const NIL: Signal = Signal(SIGNAL_BASE as u32 + 1);
    /// End of stream.
    pub const EOS: Signal = Signal(SIGNAL_BASE as u32 + 2);

    pub const fn ordinal(self) -> usize {
        self.0 as usize
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Signal::NUL => f.write_str("!nul"),
            Signal::NIL => f.write_str("!nil"),
            Signal::EOS => f.write_str("!eos"),
            Signal(ordinal) => write!(f, "!{ordinal}"),
        }
    }
}
