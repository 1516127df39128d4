use indexmap::{IndexMap, IndexSet};
use ribose_core::parametric_action;
use rustc_hash::FxBuildHasher;

use crate::{
    INR_VERSION, MAX_TAPES, chain,
    compiler::{MatrixEntry, ModelCompiler, PendingTransducer},
};

// INR TRANSITION
// ================================================================================================

/// A raw three-tape transition as read from an INR save stream.
#[derive(Debug, Clone)]
pub(crate) struct Transition {
    pub from: u32,
    pub to: u32,
    pub tape: u32,
    pub symbol: Vec<u8>,
}

// AUTOMATON
// ================================================================================================

/// One parsed INR automaton, assembled by the `header`/`transition`/`automaton` effector entry
/// points as the save stream is read.
///
/// INR state 0 is the start state and state 1 the final state; final transitions
/// (`to == 1`, tape 0, empty symbol) are dropped on input.
pub(crate) struct Automaton {
    declared_tapes: u32,
    pub(crate) transitions: Vec<Transition>,
    /// `from` state → indices of its outgoing transitions, in stream order.
    pub(crate) outgoing: IndexMap<u32, Vec<usize>, FxBuildHasher>,
    /// Dense renumbering of tape-0 states; the start state holds index 0.
    tape0_states: IndexSet<u32, FxBuildHasher>,
}

impl Automaton {
    /// Parses an INR save stream, recording diagnostics on the compiler. Returns `None` when the
    /// stream is too malformed to continue.
    pub fn parse(source: &[u8], compiler: &mut ModelCompiler<'_>) -> Option<Self> {
        let mut scanner = Scanner::new(source);

        let header = match scanner.header() {
            Ok(header) => header,
            Err(message) => {
                compiler.error(message);
                return None;
            },
        };

        let mut automaton = Self {
            declared_tapes: 0,
            transitions: Vec::new(),
            outgoing: IndexMap::with_hasher(FxBuildHasher),
            tape0_states: IndexSet::with_hasher(FxBuildHasher),
        };
        if !automaton.header(&header, compiler) {
            return None;
        }

        for _ in 0..header.transitions {
            match scanner.transition() {
                Ok(record) => automaton.transition(record, compiler),
                Err(message) => {
                    compiler.error(message);
                    return None;
                },
            }
        }
        if let Err(message) = scanner.finish() {
            compiler.error(message);
            return None;
        }

        Some(automaton)
    }

    // EFFECTOR ENTRY POINTS
    // --------------------------------------------------------------------------------------------

    /// `header` effector: validates the INR version and tape count and sizes the tables.
    fn header(&mut self, header: &Header, compiler: &mut ModelCompiler<'_>) -> bool {
        if header.version != INR_VERSION {
            compiler.error(format!(
                "INR version {} is not supported (expected {INR_VERSION})",
                header.version
            ));
            return false;
        }
        if header.tapes == 0 || header.tapes > MAX_TAPES {
            compiler.error(format!("automaton declares {} tapes (expected 1..=3)", header.tapes));
            return false;
        }
        self.declared_tapes = header.tapes;
        self.transitions.reserve(header.transitions);
        self.tape0_states.insert(0);
        true
    }

    /// `transition` effector: drops finals, validates the record, and registers its symbol.
    fn transition(&mut self, record: RawTransition, compiler: &mut ModelCompiler<'_>) {
        let RawTransition { from, to, tape, symbol } = record;
        if to == 1 && tape == 0 && symbol.is_empty() {
            return;
        }
        if tape < 0 {
            compiler.error(format!("epsilon transition {from} -> {to}"));
            return;
        }
        let tape = tape as u32;
        if tape >= self.declared_tapes {
            compiler.error(format!("invalid tape {tape} on transition {from} -> {to}"));
            return;
        }
        if symbol.is_empty() {
            compiler.error(format!("empty symbol on transition {from} -> {to}"));
            return;
        }

        if tape == 0 {
            self.tape0_states.insert(from);
            // multi-byte tape-0 symbols are signal references
            if symbol.len() > 1 {
                compiler.maps.signals.intern(&symbol);
            }
        }

        let index = self.transitions.len();
        self.outgoing.entry(from).or_default().push(index);
        self.transitions.push(Transition { from, to, tape, symbol });
    }

    /// `automaton` effector: chains every tape-0 transition and emits the raw matrix entries.
    pub fn into_pending(
        self,
        name: &str,
        compiler: &mut ModelCompiler<'_>,
    ) -> Option<PendingTransducer> {
        let mut vectors: IndexSet<Vec<i32>, FxBuildHasher> = IndexSet::with_hasher(FxBuildHasher);
        vectors.insert(vec![0]);

        let mut entries = Vec::new();
        let mut failed = false;
        for state_index in 0..self.tape0_states.len() {
            let state = *self.tape0_states.get_index(state_index).expect("indexed state");
            let outgoing = match self.outgoing.get(&state) {
                Some(outgoing) => outgoing.as_slice(),
                None => &[],
            };
            for &transition in outgoing {
                if self.transitions[transition].tape != 0 {
                    continue;
                }
                let chain = match chain::extract(&self, transition, compiler) {
                    Ok(chain) => chain,
                    Err(message) => {
                        compiler.error(message);
                        failed = true;
                        continue;
                    },
                };

                let symbol = &self.transitions[transition].symbol;
                let token = if symbol.len() == 1 {
                    symbol[0] as usize
                } else {
                    compiler.maps.signals.get(symbol).expect("registered signal") as usize
                };

                let action = classify(&chain.vector, &mut vectors);
                let to = match chain.continuation {
                    None => 0,
                    Some(state) => match self.tape0_states.get_index_of(&state) {
                        Some(index) => index as u32,
                        None => {
                            compiler.error(format!(
                                "chain from state {state} continues in a state with no input \
                                 transitions"
                            ));
                            failed = true;
                            continue;
                        },
                    },
                };
                entries.push(MatrixEntry {
                    token,
                    from: state_index as u32,
                    to,
                    action,
                });
            }
        }

        if failed {
            return None;
        }
        Some(PendingTransducer {
            name: name.to_string(),
            num_states: self.tape0_states.len(),
            entries,
            vectors,
        })
    }
}

/// Classifies a terminated effector vector into a cell action: empty chains map to nil, single
/// scalars to the effector ordinal, single parameterized effectors to a packed word, anything
/// longer to an interned vector.
fn classify(vector: &[i32], vectors: &mut IndexSet<Vec<i32>, FxBuildHasher>) -> i32 {
    match vector {
        [0] => 1,
        [effector, 0] if *effector > 0 => *effector,
        [effector, parameter, 0] if *effector < 0 => {
            parametric_action(-effector as u32, *parameter as u32)
        },
        _ => {
            let (index, _) = vectors.insert_full(vector.to_vec());
            -(index as i32)
        },
    }
}

// INR SAVE-STREAM SCANNER
// ================================================================================================

struct Header {
    version: u32,
    tapes: u32,
    transitions: usize,
}

struct RawTransition {
    from: u32,
    to: u32,
    tape: i64,
    symbol: Vec<u8>,
}

/// A byte scanner over the INR save format:
/// `INR{version}\t{tapes}\t{transitions}\t{states}\t{symbols}\n` followed by `transitions`
/// records `{from}\t{to}\t{tape}\t{len}\t{symbol bytes}\n`.
struct Scanner<'s> {
    source: &'s [u8],
    pos: usize,
}

impl<'s> Scanner<'s> {
    fn new(source: &'s [u8]) -> Self {
        Self { source, pos: 0 }
    }

    fn header(&mut self) -> Result<Header, String> {
        self.expect_tag(b"INR")?;
        let version = self.read_int()?;
        self.expect_byte(b'\t')?;
        let tapes = self.read_int()?;
        self.expect_byte(b'\t')?;
        let transitions = self.read_int()?;
        self.expect_byte(b'\t')?;
        let _states = self.read_int()?;
        self.expect_byte(b'\t')?;
        let _symbols = self.read_int()?;
        self.expect_byte(b'\n')?;
        if version < 0 || tapes < 0 || transitions < 0 {
            return Err("negative header field".to_string());
        }
        Ok(Header {
            version: version as u32,
            tapes: tapes as u32,
            transitions: transitions as usize,
        })
    }

    fn transition(&mut self) -> Result<RawTransition, String> {
        let from = self.read_int()?;
        self.expect_byte(b'\t')?;
        let to = self.read_int()?;
        self.expect_byte(b'\t')?;
        let tape = self.read_int()?;
        self.expect_byte(b'\t')?;
        let len = self.read_int()?;
        self.expect_byte(b'\t')?;
        if from < 0 || to < 0 || len < 0 {
            return Err(format!("negative transition field at offset {}", self.pos));
        }
        let symbol = self.read_exact(len as usize)?.to_vec();
        self.expect_byte(b'\n')?;
        Ok(RawTransition {
            from: from as u32,
            to: to as u32,
            tape,
            symbol,
        })
    }

    fn finish(&mut self) -> Result<(), String> {
        if self.pos != self.source.len() {
            return Err(format!("trailing bytes at offset {}", self.pos));
        }
        Ok(())
    }

    fn read_int(&mut self) -> Result<i64, String> {
        let negative = self.source.get(self.pos) == Some(&b'-');
        if negative {
            self.pos += 1;
        }
        let start = self.pos;
        let mut value: i64 = 0;
        while let Some(&byte) = self.source.get(self.pos) {
            if !byte.is_ascii_digit() {
                break;
            }
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add((byte - b'0') as i64))
                .ok_or_else(|| format!("integer overflow at offset {start}"))?;
            self.pos += 1;
        }
        if self.pos == start {
            return Err(format!("expected integer at offset {start}"));
        }
        Ok(if negative { -value } else { value })
    }

    fn expect_byte(&mut self, expected: u8) -> Result<(), String> {
        match self.source.get(self.pos) {
            Some(&byte) if byte == expected => {
                self.pos += 1;
                Ok(())
            },
            _ => Err(format!("expected {:?} at offset {}", expected as char, self.pos)),
        }
    }

    fn expect_tag(&mut self, tag: &[u8]) -> Result<(), String> {
        if self.source[self.pos..].starts_with(tag) {
            self.pos += tag.len();
            Ok(())
        } else {
            Err(format!("stream does not start with {:?} header", "INR"))
        }
    }

    fn read_exact(&mut self, len: usize) -> Result<&'s [u8], String> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.source.len());
        match end {
            Some(end) => {
                let bytes = &self.source[self.pos..end];
                self.pos = end;
                Ok(bytes)
            },
            None => Err(format!("truncated symbol at offset {}", self.pos)),
        }
    }
}
