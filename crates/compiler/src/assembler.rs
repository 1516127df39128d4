use indexmap::{IndexMap, IndexSet};
use ribose_core::{action_effector, action_parameter, is_parametric};
use rustc_hash::FxBuildHasher;

use crate::{
    compiler::ModelCompiler,
    traps::{self, Traps},
};

// RAW MATRIX
// ================================================================================================

/// One kernel transition cell: the plain next-state index and the classified action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Cell {
    pub to: u32,
    pub action: i32,
}

/// The raw `[token][state]` matrix produced by chain extraction, before input-equivalence
/// factoring. Cells default to `(current_state, 0)`, the nul action.
pub(crate) struct RawMatrix {
    pub tokens: Vec<Vec<Cell>>,
    pub num_states: usize,
    /// Interned effector vectors, terminator included; ordinal 0 is the empty vector.
    pub vectors: IndexSet<Vec<i32>, FxBuildHasher>,
}

// TRANSITION ASSEMBLER
// ================================================================================================

/// Factors the raw matrix into input equivalence classes, instruments trap fast paths,
/// materializes the effector-vector pool, and compacts dead states.
pub(crate) struct Assembler {
    raw: RawMatrix,
    nul_token: usize,
}

impl Assembler {
    pub fn new(raw: RawMatrix, nul_token: usize) -> Self {
        Self { raw, nul_token }
    }

    /// Runs assembly steps A through F and returns state-major kernel rows, the composed input
    /// equivalence map, and the flat effector-vector pool.
    pub fn assemble(
        self,
        compiler: &mut ModelCompiler<'_>,
    ) -> (Vec<Vec<(u32, i32)>>, Vec<u32>, Vec<i32>) {
        let Self { raw, nul_token } = self;
        let RawMatrix { tokens, num_states, mut vectors } = raw;

        // Step A: group tokens with identical transition columns into input classes
        let (mut eq, mut classes) = factor(&tokens);
        let byte_members = byte_membership(&eq, classes.len());
        let nul_class = eq[nul_token];

        // Step B: discover msum/mscan/mproduct candidates
        let traps = traps::discover(&classes, &byte_members, nul_class, compiler);

        // Step C: splice trap effectors onto entering transitions (sum/scan first, then product)
        splice_sums(&mut classes, &traps, &mut vectors);
        splice_products(&mut classes, &traps, &mut vectors);

        // Step D: materialize referenced vectors into the flat pool
        let pool = materialize_pool(&mut classes, num_states, &vectors);

        // Step E: drop states unreachable from state 0 and renumber densely
        let live = reachable_states(&classes, num_states);
        compact_states(&mut classes, &live);

        // Step F: re-factor; splicing can collapse previously distinct classes
        let (regroup, final_classes) = refactor(&classes);
        for class in eq.iter_mut() {
            *class = regroup[*class as usize];
        }

        // transpose to state-major rows for the packed matrix
        let final_states = final_classes.first().map(Vec::len).unwrap_or(0);
        let mut rows = vec![Vec::with_capacity(final_classes.len()); final_states];
        for column in &final_classes {
            for (state, cell) in column.iter().enumerate() {
                rows[state].push((cell.to, cell.action));
            }
        }

        (rows, eq, pool)
    }
}

// STEP A / STEP F: ROW FACTORING
// ================================================================================================

/// Groups identical token columns, assigning class indices in first-seen token order.
fn factor(tokens: &[Vec<Cell>]) -> (Vec<u32>, Vec<Vec<Cell>>) {
    let mut groups: IndexMap<&[Cell], u32, FxBuildHasher> = IndexMap::with_hasher(FxBuildHasher);
    let mut eq = Vec::with_capacity(tokens.len());
    for column in tokens {
        let next = groups.len() as u32;
        let class = *groups.entry(column.as_slice()).or_insert(next);
        eq.push(class);
    }
    let classes = groups.into_keys().map(<[Cell]>::to_vec).collect();
    (eq, classes)
}

/// Groups identical classes, returning the old-class → new-class map and the surviving columns.
fn refactor(classes: &[Vec<Cell>]) -> (Vec<u32>, Vec<Vec<Cell>>) {
    factor(classes)
}

/// The byte tokens (ordinals < 256) in each input class.
fn byte_membership(eq: &[u32], num_classes: usize) -> Vec<Vec<u8>> {
    let mut members = vec![Vec::new(); num_classes];
    for byte in 0u16..256 {
        members[eq[byte as usize] as usize].push(byte as u8);
    }
    members
}

// STEP C: TRAP SPLICING
// ================================================================================================

/// Splices sum/scan effectors onto every transition entering an instrumented state.
fn splice_sums(
    classes: &mut [Vec<Cell>],
    traps: &Traps,
    vectors: &mut IndexSet<Vec<i32>, FxBuildHasher>,
) {
    for column in classes.iter_mut() {
        for (state, cell) in column.iter_mut().enumerate() {
            if cell.action == 0 || cell.to == state as u32 {
                continue;
            }
            let target = cell.to as usize;
            if let Some((effector, parameter)) = traps.scan[target].or(traps.sum[target]) {
                cell.action = splice(cell.action, effector, parameter, vectors);
            }
        }
    }
}

/// Rewrites product-chain endpoints, then splices the product effector onto every transition
/// entering a chain-start state (self-loops included).
fn splice_products(
    classes: &mut [Vec<Cell>],
    traps: &Traps,
    vectors: &mut IndexSet<Vec<i32>, FxBuildHasher>,
) {
    // endpoint rewrite first: the re-delivered last byte of an absorbed chain must jump straight
    // to the end state, and chained chains need the rewritten cell spliced below
    for (state, product) in traps.product.iter().enumerate() {
        if let Some(product) = product {
            classes[product.end_class as usize][state] = Cell {
                to: product.end_state,
                action: 1,
            };
        }
    }

    for column in classes.iter_mut() {
        for cell in column.iter_mut() {
            if cell.action == 0 {
                continue;
            }
            if let Some(product) = traps.product[cell.to as usize] {
                cell.action =
                    splice(cell.action, ribose_core::effector::MPRODUCT, product.parameter, vectors);
            }
        }
    }
}

/// Splices a trap effector tuple onto an existing action: the action is promoted to a vector,
/// the terminator dropped, the tuple appended, and the result re-interned.
fn splice(
    action: i32,
    effector: u32,
    parameter: u32,
    vectors: &mut IndexSet<Vec<i32>, FxBuildHasher>,
) -> i32 {
    let mut elements: Vec<i32> = if action == 1 {
        Vec::with_capacity(3)
    } else if action < 0 {
        let existing = vectors.get_index((-action) as usize).expect("interned vector");
        let mut elements = existing.clone();
        elements.pop();
        elements
    } else if is_parametric(action) {
        vec![-(action_effector(action) as i32), action_parameter(action) as i32]
    } else {
        vec![action]
    };

    elements.push(-(effector as i32));
    elements.push(parameter as i32);
    elements.push(0);
    let (index, _) = vectors.insert_full(elements);
    -(index as i32)
}

// STEP D: VECTOR POOL
// ================================================================================================

/// Emits every vector still referenced by a cell into the flat pool, rewriting cell actions from
/// vector ordinals to pool offsets. The pool opens with a lone terminator, so offsets start at 1.
fn materialize_pool(
    classes: &mut [Vec<Cell>],
    num_states: usize,
    vectors: &IndexSet<Vec<i32>, FxBuildHasher>,
) -> Vec<i32> {
    let mut pool: Vec<i32> = vec![0];
    let mut offsets: IndexMap<usize, i32, FxBuildHasher> = IndexMap::with_hasher(FxBuildHasher);

    // walk in row-major order so offsets are assigned deterministically
    for state in 0..num_states {
        for column in classes.iter_mut() {
            let cell = &mut column[state];
            if cell.action >= 0 {
                continue;
            }
            let ordinal = (-cell.action) as usize;
            let offset = match offsets.get(&ordinal) {
                Some(&offset) => offset,
                None => {
                    let offset = pool.len() as i32;
                    pool.extend_from_slice(vectors.get_index(ordinal).expect("interned vector"));
                    offsets.insert(ordinal, offset);
                    offset
                },
            };
            cell.action = -offset;
        }
    }
    pool
}

// STEP E: DEAD-STATE ELIMINATION
// ================================================================================================

/// Reachability from state 0 over every cell's next state.
fn reachable_states(classes: &[Vec<Cell>], num_states: usize) -> Vec<bool> {
    let mut live = vec![false; num_states];
    if num_states == 0 {
        return live;
    }
    let mut queue = vec![0usize];
    live[0] = true;
    while let Some(state) = queue.pop() {
        for column in classes {
            let to = column[state].to as usize;
            if !live[to] {
                live[to] = true;
                queue.push(to);
            }
        }
    }
    live
}

/// Renumbers live states densely, preserving ascending order, and drops dead rows.
fn compact_states(classes: &mut [Vec<Cell>], live: &[bool]) {
    let mut renumber = vec![u32::MAX; live.len()];
    let mut next = 0u32;
    for (state, &alive) in live.iter().enumerate() {
        if alive {
            renumber[state] = next;
            next += 1;
        }
    }

    for column in classes.iter_mut() {
        let mut compacted = Vec::with_capacity(next as usize);
        for (state, cell) in column.iter().enumerate() {
            if live[state] {
                compacted.push(Cell {
                    to: renumber[cell.to as usize],
                    action: cell.action,
                });
            }
        }
        *column = compacted;
    }
}
