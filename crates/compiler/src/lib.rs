//! Compiles INR three-tape automata into packed ribose model files.
//!
//! Each `.inr` save stream is parsed by the [Automaton][automaton] reader, its tape-0 transitions
//! are chained into effector vectors, and the [Assembler][assembler] factors the result into an
//! input-equivalence map, a kernel transition matrix with trap fast paths, and an effector-vector
//! pool. The model writer packs the records, the ordinal namespaces, and the effector parameters
//! into one model file.

use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use ribose_core::Target;

mod assembler;
mod automaton;
mod chain;
mod compiler;
mod errors;
mod model_writer;
mod traps;


pub use compiler::{CompiledModel, ModelCompiler};
pub use errors::{CompilationError, CompileDiagnostic};
pub use model_writer::{write_map, write_model};

// CONSTANTS
// ================================================================================================

/// The INR save-stream version the automaton reader understands.
pub const INR_VERSION: u32 = 210;

/// Ribose patterns are three-tape relations: input, effector, parameter.
pub const MAX_TAPES: u32 = 3;

/// A state self-looping on strictly more byte values than this absorbs input through `msum`.
pub const MSUM_THRESHOLD: usize = 64;

/// A state self-looping on at least this many of the 256 byte values absorbs input through
/// `mscan`, hunting the one byte that leaves the loop.
pub const MSCAN_THRESHOLD: usize = 255;

/// Minimum number of chained single-exit states compressed into one `mproduct` invocation.
pub const MPRODUCT_MIN_RUN: usize = 4;

/// Largest parameter index a packed parametric action can carry.
pub(crate) const MAX_PARAMETERS: usize = 0x7FFE;

// COMPILER DRIVERS
// ================================================================================================

/// Compiles every `.inr` automaton under `inr_dir` into a model file at `model_path`, with a
/// companion `.map` file beside it.
///
/// Automata compile in file-name order, which fixes ordinal assignment. Any diagnostic fails the
/// whole model; a failed compile deletes the partial model and map files.
#[tracing::instrument(skip(target), fields(target = target.name()))]
pub fn compile_model(
    target: &dyn Target,
    inr_dir: &Path,
    model_path: &Path,
) -> Result<(), CompilationError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(inr_dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "inr"))
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(CompilationError::NoSources(inr_dir.to_path_buf()));
    }

    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        sources.push((name, fs::read(&path)?));
    }

    let map_path = model_path.with_extension("map");
    let result = (|| {
        let compiled = compile_sources(
            target,
            sources.iter().map(|(name, bytes)| (name.as_str(), bytes.as_slice())),
        )?;
        let mut model_file = fs::File::create(model_path)?;
        write_model(&compiled, target.name(), &mut model_file)?;
        let mut map_file = fs::File::create(&map_path)?;
        write_map(&compiled, target.name(), &mut map_file)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(model_path);
        let _ = fs::remove_file(&map_path);
    }
    result
}

/// Compiles named INR sources into an in-memory model image.
pub fn compile_to_vec<'s>(
    target: &dyn Target,
    sources: impl IntoIterator<Item = (&'s str, &'s [u8])>,
) -> Result<Vec<u8>, CompilationError> {
    let compiled = compile_sources(target, sources)?;
    let mut cursor = Cursor::new(Vec::new());
    write_model(&compiled, target.name(), &mut cursor)?;
    Ok(cursor.into_inner())
}

fn compile_sources<'s>(
    target: &dyn Target,
    sources: impl IntoIterator<Item = (&'s str, &'s [u8])>,
) -> Result<CompiledModel, CompilationError> {
    let mut compiler = ModelCompiler::new(target);
    for (name, bytes) in sources {
        compiler.compile_transducer(name, bytes);
    }
    compiler.finish().map_err(CompilationError::Failed)
}

// TEST SUPPORT
// ================================================================================================

/// Builders for INR save streams, used by this crate's tests and by downstream integration tests.
pub mod inr {
    /// Serializes a three-tape transition list into an INR save stream, header included.
    ///
    /// States and symbol counts in the header are derived from the transitions; a final
    /// transition `(from, 1, 0, b"")` marks acceptance.
    pub fn save_stream(tapes: u32, transitions: &[(u32, u32, i32, &[u8])]) -> Vec<u8> {
        use std::collections::BTreeSet;

        let mut states = BTreeSet::new();
        let mut symbols = BTreeSet::new();
        for &(from, to, _, symbol) in transitions {
            states.insert(from);
            states.insert(to);
            symbols.insert(symbol.to_vec());
        }

        let mut stream = Vec::new();
        stream.extend_from_slice(
            format!(
                "INR{}\t{tapes}\t{}\t{}\t{}\n",
                super::INR_VERSION,
                transitions.len(),
                states.len(),
                symbols.len()
            )
            .as_bytes(),
        );
        for &(from, to, tape, symbol) in transitions {
            stream.extend_from_slice(format!("{from}\t{to}\t{tape}\t{}\t", symbol.len()).as_bytes());
            stream.extend_from_slice(symbol);
            stream.push(b'\n');
        }
        stream
    }
}
