use std::path::PathBuf;

use clap::Args;
use ribose_compiler::{CompilationError, compile_model};
use ribose_core::BaseTarget;

// COMPILE COMMAND
// ================================================================================================

#[derive(Args)]
pub struct CompileCmd {
    /// Target class the model is compiled against.
    #[arg(long, default_value = "BaseTarget")]
    target: String,

    /// Output model file; a companion .map file is written beside it.
    #[arg(long, short = 'm')]
    model: PathBuf,

    /// Directory of .inr automata, compiled in file-name order.
    automata: PathBuf,
}

impl CompileCmd {
    pub fn execute(&self) -> Result<(), String> {
        let target = BaseTarget;
        if self.target != ribose_core::Target::name(&target) {
            return Err(format!(
                "unknown target '{}'; this binary provides only 'BaseTarget'",
                self.target
            ));
        }

        match compile_model(&target, &self.automata, &self.model) {
            Ok(()) => {
                println!("wrote {}", self.model.display());
                Ok(())
            },
            Err(CompilationError::Failed(diagnostics)) => {
                for diagnostic in &diagnostics {
                    eprintln!("{diagnostic}");
                }
                Err(format!("{} compilation error(s)", diagnostics.len()))
            },
            Err(err) => Err(err.to_string()),
        }
    }
}
