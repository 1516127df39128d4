use ribose_core::{Token, effector};

use crate::{
    MPRODUCT_MIN_RUN, MSCAN_THRESHOLD, MSUM_THRESHOLD, assembler::Cell, compiler::ModelCompiler,
};

// TRAP DISCOVERY
// ================================================================================================

/// A compressed mproduct chain: the interned byte-sequence parameter, the state the chain ends
/// in, and the input class of the last byte walked.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Product {
    pub parameter: u32,
    pub end_state: u32,
    pub end_class: u32,
}

/// Per-state trap annotations discovered by the static walk over the kernel matrix.
///
/// `sum` and `scan` are mutually exclusive; product chains never start or pass through a
/// sum/scan state because their candidate test requires every non-exit class to hold the default
/// nul cell.
pub(crate) struct Traps {
    /// `(msum, parameter)` for states with more than [MSUM_THRESHOLD] self-looping bytes.
    pub sum: Vec<Option<(u32, u32)>>,
    /// `(mscan, parameter)` for states that self-loop on at least [MSCAN_THRESHOLD] byte values.
    pub scan: Vec<Option<(u32, u32)>>,
    pub product: Vec<Option<Product>>,
}

/// Walks the factored matrix and synthesizes msum/mscan/mproduct annotations, interning their
/// parameters on the model compiler.
pub(crate) fn discover(
    classes: &[Vec<Cell>],
    byte_members: &[Vec<u8>],
    nul_class: u32,
    compiler: &mut ModelCompiler<'_>,
) -> Traps {
    let num_states = classes.first().map(Vec::len).unwrap_or(0);
    let mut traps = Traps {
        sum: vec![None; num_states],
        scan: vec![None; num_states],
        product: vec![None; num_states],
    };

    discover_sums(classes, byte_members, compiler, &mut traps);
    discover_products(classes, byte_members, nul_class, compiler, &mut traps);
    traps
}

/// msum/mscan candidates: states that absorb a large share of the byte alphabet on nil
/// self-loops.
fn discover_sums(
    classes: &[Vec<Cell>],
    byte_members: &[Vec<u8>],
    compiler: &mut ModelCompiler<'_>,
    traps: &mut Traps,
) {
    let num_states = traps.sum.len();
    for state in 0..num_states {
        let mut member = [false; 256];
        let mut count = 0usize;
        for (class, column) in classes.iter().enumerate() {
            let cell = column[state];
            if cell.to == state as u32 && cell.action == 1 {
                for &byte in &byte_members[class] {
                    member[byte as usize] = true;
                    count += 1;
                }
            }
        }

        if count == MSCAN_THRESHOLD {
            let target = member.iter().position(|&m| !m).expect("one non-looping byte") as u8;
            let parameter = intern_literal(compiler, effector::MSCAN, vec![target]);
            traps.scan[state] = Some((effector::MSCAN, parameter));
        } else if count > MSUM_THRESHOLD {
            // at 256 looping bytes there is no scan target left; a full msum mask absorbs instead
            let mut mask = [0u8; 32];
            for (byte, &is_member) in member.iter().enumerate() {
                if is_member {
                    mask[byte >> 3] |= 1 << (byte & 7);
                }
            }
            let parameter = intern_literal(compiler, effector::MSUM, mask.to_vec());
            traps.sum[state] = Some((effector::MSUM, parameter));
        }
    }
}

/// mproduct candidates: linear runs of states whose only live transition is a singleton byte
/// with a nil action, every other class holding the default nul cell.
fn discover_products(
    classes: &[Vec<Cell>],
    byte_members: &[Vec<u8>],
    nul_class: u32,
    compiler: &mut ModelCompiler<'_>,
    traps: &mut Traps,
) {
    let num_states = traps.product.len();
    let exits: Vec<Option<(u32, u8, u32)>> =
        (0..num_states).map(|state| exit_class(classes, byte_members, nul_class, state)).collect();

    // interior states of a recorded chain must not start (or be walked into by) another chain
    let mut consumed = vec![false; num_states];
    for state in 0..num_states {
        if consumed[state] || exits[state].is_none() {
            continue;
        }
        let nul_anchor = classes[nul_class as usize][state];

        let mut bytes = Vec::new();
        let mut cursor = state;
        let mut endpoint = None;
        while let Some((class, byte, to)) = exits[cursor] {
            if consumed[to as usize] || to as usize == state || bytes.len() > num_states {
                break;
            }
            // the error transition must stay consistent along the chain
            if nul_behavior(classes[nul_class as usize][cursor], cursor)
                != nul_behavior(nul_anchor, state)
            {
                break;
            }
            bytes.push(byte);
            endpoint = Some((to, class));
            cursor = to as usize;
        }

        if bytes.len() >= MPRODUCT_MIN_RUN {
            let (end_state, end_class) = endpoint.expect("non-empty walk");
            let parameter = intern_literal(compiler, effector::MPRODUCT, bytes);
            traps.product[state] = Some(Product { parameter, end_state, end_class });
            // walk the interior again to mark it consumed; the endpoint may anchor its own chain
            let mut cursor = state;
            while cursor != end_state as usize {
                consumed[cursor] = true;
                cursor = exits[cursor].expect("walked state").2 as usize;
            }
        }
    }
}

/// The unique exit of a product-chain state: one singleton-byte class advancing with a nil
/// action while every other class holds the default nul cell.
fn exit_class(
    classes: &[Vec<Cell>],
    byte_members: &[Vec<u8>],
    nul_class: u32,
    state: usize,
) -> Option<(u32, u8, u32)> {
    let mut exit = None;
    for (class, column) in classes.iter().enumerate() {
        let cell = column[state];
        if cell.to == state as u32 && cell.action == 0 {
            continue;
        }
        let is_exit = class as u32 != nul_class
            && cell.to != state as u32
            && cell.action == 1
            && byte_members[class].len() == 1;
        if !is_exit || exit.is_some() {
            return None;
        }
        exit = Some((class as u32, byte_members[class][0], cell.to));
    }
    exit
}

/// Normalizes a nul-class cell for chain-consistency comparison: the default self cell reads as
/// "no recovery" regardless of which state holds it.
fn nul_behavior(cell: Cell, state: usize) -> Option<Cell> {
    if cell.to == state as u32 && cell.action == 0 { None } else { Some(cell) }
}

fn intern_literal(compiler: &mut ModelCompiler<'_>, effector: u32, bytes: Vec<u8>) -> u32 {
    let raw = vec![Token::Literal(bytes).raw()];
    compiler
        .intern_parameter(effector, raw)
        .expect("trap parameters stay within the parameter limit")
}
