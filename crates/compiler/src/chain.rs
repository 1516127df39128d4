use ribose_core::{ParameterTokens, effector};
use smallvec::SmallVec;

use crate::{automaton::Automaton, compiler::ModelCompiler};

// CHAIN EXTRACTOR
// ================================================================================================

/// The effector-vector continuation of one tape-0 transition: the terminated vector walked off
/// the transition's tape-1/tape-2 tail, and the tape-0 state the transduction continues in
/// (`None` when the tail ran out, which maps to state 0).
pub(crate) struct Chain {
    pub vector: SmallVec<[i32; 8]>,
    pub continuation: Option<u32>,
}

/// Walks the tape-1/tape-2 tail of the tape-0 transition at `start`.
///
/// The walk follows the unique successor for as long as it is a single tape-1 or tape-2
/// transition: tape-1 symbols name effectors, tape-2 symbols contribute parameters to the most
/// recent effector. It stops at a state with no outgoing transitions, a tape-0 successor, or
/// multiple all-tape-0 successors; branching that includes tape 1 or 2 is ambiguous.
pub(crate) fn extract(
    automaton: &Automaton,
    start: usize,
    compiler: &mut ModelCompiler<'_>,
) -> Result<Chain, String> {
    let mut vector: SmallVec<[i32; 8]> = SmallVec::new();
    let mut pending: Option<(u32, ParameterTokens)> = None;
    let mut cursor = automaton.transitions[start].to;

    // a tape-1/2 cycle would walk forever; any chain is shorter than the transition table
    let mut fuel = automaton.transitions.len() + 1;

    let continuation = loop {
        if fuel == 0 {
            return Err(format!("unterminated effector chain at state {cursor}"));
        }
        fuel -= 1;

        let outgoing = match automaton.outgoing.get(&cursor) {
            Some(outgoing) => outgoing.as_slice(),
            None => &[],
        };
        match outgoing {
            [] => break None,
            [index] => {
                let transition = &automaton.transitions[*index];
                match transition.tape {
                    0 => break Some(cursor),
                    1 => {
                        flush(&mut pending, &mut vector, compiler)?;
                        let ordinal = compiler
                            .effector_ordinal(&transition.symbol)
                            .ok_or_else(|| {
                                format!(
                                    "unknown effector '{}'",
                                    String::from_utf8_lossy(&transition.symbol)
                                )
                            })?;
                        if ordinal == effector::NUL {
                            return Err("sentinel effector 'nul' cannot be invoked".to_string());
                        }
                        pending = Some((ordinal, ParameterTokens::new()));
                        cursor = transition.to;
                    },
                    _ => {
                        match &mut pending {
                            Some((_, parameters)) => parameters.push(transition.symbol.clone()),
                            None => {
                                return Err(format!("parameter without effector at state {cursor}"));
                            },
                        }
                        cursor = transition.to;
                    },
                }
            },
            many => {
                if many.iter().all(|&index| automaton.transitions[index].tape == 0) {
                    break Some(cursor);
                }
                return Err(format!("ambiguous state {cursor}"));
            },
        }
    };

    flush(&mut pending, &mut vector, compiler)?;
    vector.push(0);
    Ok(Chain { vector, continuation })
}

/// Emits the pending effector into the vector: a bare ordinal for scalar invocations, the negated
/// ordinal followed by the interned parameter index for parameterized ones.
fn flush(
    pending: &mut Option<(u32, ParameterTokens)>,
    vector: &mut SmallVec<[i32; 8]>,
    compiler: &mut ModelCompiler<'_>,
) -> Result<(), String> {
    if let Some((ordinal, parameters)) = pending.take() {
        if parameters.is_empty() {
            vector.push(ordinal as i32);
        } else {
            let index = compiler.intern_parameter(ordinal, parameters)?;
            vector.push(-(ordinal as i32));
            vector.push(index as i32);
        }
    }
    Ok(())
}
