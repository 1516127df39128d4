use indexmap::IndexSet;
use ribose_core::{
    BUILT_IN_EFFECTORS, ModelMaps, ParameterTokens, Signal, Target, Token, Transducer,
    compile_builtin_parameter,
};
use rustc_hash::FxBuildHasher;

use crate::{
    MAX_PARAMETERS,
    assembler::{Assembler, Cell, RawMatrix},
    automaton::Automaton,
    errors::CompileDiagnostic,
};

// MODEL COMPILER
// ================================================================================================

/// Model-wide compilation state: the ordinal namespaces, the per-effector parameter interning
/// tables, the accumulated diagnostics, and the transducers parsed so far.
///
/// One `ModelCompiler` produces one model. Parsing and chain extraction run per automaton as the
/// files stream through; matrix assembly is deferred to [ModelCompiler::finish] because the input
/// equivalence map of every transducer spans the model-wide signal limit, which later automata can
/// still extend.
pub struct ModelCompiler<'a> {
    target: &'a dyn Target,
    pub(crate) maps: ModelMaps,
    parameters: Vec<IndexSet<ParameterTokens, FxBuildHasher>>,
    pub(crate) errors: Vec<CompileDiagnostic>,
    pending: Vec<PendingTransducer>,
    current: Option<String>,
}

/// A parsed and chained automaton awaiting matrix assembly.
pub(crate) struct PendingTransducer {
    pub name: String,
    pub num_states: usize,
    pub entries: Vec<MatrixEntry>,
    pub vectors: IndexSet<Vec<i32>, FxBuildHasher>,
}

/// One raw kernel cell produced by chain extraction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MatrixEntry {
    /// Input token ordinal (byte value or signal ordinal).
    pub token: usize,
    /// Dense tape-0 state index the transition leaves.
    pub from: u32,
    /// Dense tape-0 state index the chain continues in.
    pub to: u32,
    /// Classified chain action.
    pub action: i32,
}

/// Everything the model writer needs to emit a model file.
pub struct CompiledModel {
    pub maps: ModelMaps,
    /// Raw parameter token arrays, indexed by effector ordinal then parameter index.
    pub parameters: Vec<Vec<ParameterTokens>>,
    /// Compiled transducers in ordinal order.
    pub transducers: Vec<Transducer>,
}

impl<'a> ModelCompiler<'a> {
    pub fn new(target: &'a dyn Target) -> Self {
        let mut maps = ModelMaps::new();
        let mut errors = Vec::new();
        for name in target.effector_names() {
            if maps.effectors.get(name.as_bytes()).is_some() {
                errors.push(CompileDiagnostic {
                    transducer: None,
                    message: format!("target '{}' redeclares effector '{name}'", target.name()),
                });
                continue;
            }
            maps.effectors.intern(name.as_bytes());
        }
        let parameters =
            (0..maps.effectors.len()).map(|_| IndexSet::with_hasher(FxBuildHasher)).collect();
        Self {
            target,
            maps,
            parameters,
            errors,
            pending: Vec::new(),
            current: None,
        }
    }

    pub fn target_name(&self) -> &str {
        self.target.name()
    }

    /// Parses one INR automaton and extracts its chains; diagnostics accumulate on failure.
    #[tracing::instrument(skip(self, source))]
    pub fn compile_transducer(&mut self, name: &str, source: &[u8]) {
        self.current = Some(name.to_string());
        self.maps.transducers.intern(name.as_bytes());
        let errors_before = self.errors.len();

        if let Some(automaton) = Automaton::parse(source, self)
            && self.errors.len() == errors_before
            && let Some(pending) = automaton.into_pending(name, self)
            && self.errors.len() == errors_before
        {
            self.pending.push(pending);
        }
        self.current = None;
    }

    /// Assembles every pending transducer, validates interned parameters, and returns the
    /// compiled model, or the accumulated diagnostics if anything failed.
    pub fn finish(mut self) -> Result<CompiledModel, Vec<CompileDiagnostic>> {
        let signal_limit = self.maps.signal_limit();
        let nul_token = Signal::NUL.ordinal();

        let mut compiled = Vec::with_capacity(self.pending.len());
        let pending = core::mem::take(&mut self.pending);
        for transducer in pending {
            let Some(raw) = self.fill_matrix(&transducer, signal_limit) else {
                continue;
            };
            let (rows, input_eq, vector_pool) =
                Assembler::new(raw, nul_token).assemble(&mut self);
            tracing::debug!(
                transducer = %transducer.name,
                states = rows.len(),
                classes = rows.first().map(Vec::len).unwrap_or(0),
                "assembled kernel matrix"
            );
            compiled.push(Transducer::from_rows(
                transducer.name,
                self.target.name().to_string(),
                input_eq,
                &rows,
                vector_pool,
            ));
        }

        self.validate_parameters();
        self.validate_transducer_references(&compiled);
        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        // order transducer records by ordinal, which may differ from compile order when a
        // start[@..] parameter interned a name ahead of its file
        let mut by_ordinal = Vec::with_capacity(compiled.len());
        for (_, name) in self.maps.transducers.iter() {
            let record = compiled
                .iter()
                .position(|t: &Transducer| t.name().as_bytes() == name)
                .expect("validated transducer reference");
            by_ordinal.push(compiled[record].clone());
        }

        Ok(CompiledModel {
            maps: self.maps,
            parameters: self.parameters.into_iter().map(|set| set.into_iter().collect()).collect(),
            transducers: by_ordinal,
        })
    }

    /// Builds the raw `[token][state]` matrix for one pending transducer.
    fn fill_matrix(
        &mut self,
        transducer: &PendingTransducer,
        signal_limit: usize,
    ) -> Option<RawMatrix> {
        let num_states = transducer.num_states;
        let mut tokens: Vec<Vec<Cell>> = (0..signal_limit)
            .map(|_| (0..num_states).map(|s| Cell { to: s as u32, action: 0 }).collect())
            .collect();

        let mut failed = false;
        for entry in &transducer.entries {
            let cell = &mut tokens[entry.token][entry.from as usize];
            if !(cell.to == entry.from && cell.action == 0) {
                self.errors.push(CompileDiagnostic {
                    transducer: Some(transducer.name.clone()),
                    message: format!(
                        "ambiguous transitions from state {} on token {}",
                        entry.from, entry.token
                    ),
                });
                failed = true;
                continue;
            }
            *cell = Cell { to: entry.to, action: entry.action };
        }
        if failed {
            return None;
        }

        Some(RawMatrix {
            tokens,
            num_states,
            vectors: transducer.vectors.clone(),
        })
    }

    // DIAGNOSTICS
    // --------------------------------------------------------------------------------------------

    pub(crate) fn error(&mut self, message: String) {
        self.errors.push(CompileDiagnostic {
            transducer: self.current.clone(),
            message,
        });
    }

    // EFFECTORS AND PARAMETERS
    // --------------------------------------------------------------------------------------------

    pub(crate) fn effector_ordinal(&self, name: &[u8]) -> Option<u32> {
        self.maps.effectors.get(name)
    }

    /// Interns a raw parameter token array for `effector`, registering any signal, field, or
    /// transducer names the tokens reference. Returns the parameter index.
    pub(crate) fn intern_parameter(
        &mut self,
        effector: u32,
        raw: ParameterTokens,
    ) -> Result<u32, String> {
        for bytes in &raw {
            match Token::parse(bytes) {
                Token::Signal(name) => {
                    self.maps.signals.intern(&name);
                },
                Token::Field(name) => {
                    self.maps.fields.intern(&name);
                },
                Token::Transducer(name) => {
                    self.maps.transducers.intern(&name);
                },
                Token::Literal(_) => {},
            }
        }

        let table = &mut self.parameters[effector as usize];
        let (index, _) = table.insert_full(raw);
        if index > MAX_PARAMETERS {
            return Err(format!(
                "effector '{}' has more than {MAX_PARAMETERS} distinct parameters",
                String::from_utf8_lossy(self.maps.effectors.name(effector).unwrap_or(b"?")),
            ));
        }
        Ok(index as u32)
    }

    fn validate_parameters(&mut self) {
        let mut diagnostics = Vec::new();
        for (effector, table) in self.parameters.iter().enumerate() {
            let effector = effector as u32;
            for raw in table {
                let tokens: Vec<Token> = raw.iter().map(|bytes| Token::parse(bytes)).collect();
                let result = if (effector as usize) < BUILT_IN_EFFECTORS.len() {
                    compile_builtin_parameter(effector, &tokens, &self.maps).map(|_| ())
                } else {
                    let name = self
                        .maps
                        .effectors
                        .name(effector)
                        .map(|n| String::from_utf8_lossy(n).into_owned())
                        .unwrap_or_default();
                    self.target.validate_parameter(&name, &tokens)
                };
                if let Err(err) = result {
                    diagnostics.push(format!("invalid parameter: {err}"));
                }
            }
        }
        for message in diagnostics {
            self.errors.push(CompileDiagnostic { transducer: None, message });
        }
    }

    fn validate_transducer_references(&mut self, compiled: &[Transducer]) {
        let mut missing = Vec::new();
        for (_, name) in self.maps.transducers.iter() {
            if !compiled.iter().any(|t| t.name().as_bytes() == name) {
                missing.push(String::from_utf8_lossy(name).into_owned());
            }
        }
        for name in missing {
            self.errors.push(CompileDiagnostic {
                transducer: None,
                message: format!("transducer '{name}' is referenced but was not compiled"),
            });
        }
    }
}
