use std::{io, path::PathBuf};

// COMPILATION ERROR
// ================================================================================================

/// A single diagnostic produced while compiling one transducer.
///
/// Diagnostics accumulate on the model compiler; any non-empty list at the end of a compile fails
/// the whole model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileDiagnostic {
    /// The transducer (file stem) the diagnostic belongs to, if known.
    pub transducer: Option<String>,
    pub message: String,
}

impl core::fmt::Display for CompileDiagnostic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.transducer {
            Some(name) => write!(f, "{name}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Errors surfaced by the compiler driver.
#[derive(Debug, thiserror::Error)]
pub enum CompilationError {
    #[error("no .inr automata found under {0}")]
    NoSources(PathBuf),
    #[error("model compilation failed with {} error(s)", .0.len())]
    Failed(Vec<CompileDiagnostic>),
    #[error("i/o failure")]
    Io(#[from] io::Error),
}

impl CompilationError {
    /// The accumulated diagnostics, if this is a compilation failure.
    pub fn diagnostics(&self) -> &[CompileDiagnostic] {
        match self {
            CompilationError::Failed(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}
