use alloc::{boxed::Box, string::String, vec::Vec};

use crate::utils::{ByteReader, ByteWriter, Deserializable, DeserializationError, Serializable};

// TRANSITION PACKING
// ================================================================================================

// A kernel transition is one u64: low 32 bits hold the action (signed), high 32 bits hold the
// next state as a pre-multiplied row offset (state × num_classes), so the inner loop jumps rows
// by adding the input equivalence class without a multiply.
//
// Action encoding: 0 = nul (missing transition), 1 = nil (accept), 2..=0xFFFF = scalar effector
// ordinal, > 0xFFFF = packed parametric effector (parameter index + 1 in the high half-word),
// negative = offset into the effector-vector pool, negated.

/// Packs a transition cell from a pre-multiplied next-state row offset and an action.
pub const fn cell(next_state_offset: u32, action: i32) -> u64 {
    ((next_state_offset as u64) << 32) | (action as u32 as u64)
}

/// The pre-multiplied next-state row offset of a transition cell.
pub const fn cell_state(cell: u64) -> usize {
    (cell >> 32) as usize
}

/// The action word of a transition cell.
pub const fn cell_action(cell: u64) -> i32 {
    cell as u32 as i32
}

/// Packs a parameterized-effector action word.
///
/// The parameter index is stored plus one so the word stays distinguishable from a scalar
/// effector ordinal when the index is 0. Parameter indices are limited to 0x7FFE so the sign bit
/// stays clear (negative actions name effector vectors).
pub const fn parametric_action(effector: u32, parameter: u32) -> i32 {
    (((parameter + 1) << 16) | (effector & 0xFFFF)) as i32
}

/// Returns true if the action word encodes a single parameterized effector.
pub const fn is_parametric(action: i32) -> bool {
    action > 0xFFFF
}

/// The effector ordinal of a scalar or parametric action word.
pub const fn action_effector(action: i32) -> u32 {
    (action as u32) & 0xFFFF
}

/// The parameter index of a parametric action word.
pub const fn action_parameter(action: i32) -> u32 {
    ((action as u32) >> 16) - 1
}

// TRANSDUCER
// ================================================================================================

/// A compiled transducer: input equivalence map, kernel transition matrix, and effector-vector
/// pool, ready to drive a transduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transducer {
    name: String,
    target_name: String,
    input_eq: Box<[u32]>,
    num_states: usize,
    num_classes: usize,
    matrix: Box<[u64]>,
    effector_vectors: Box<[i32]>,
}

impl Transducer {
    /// Builds a transducer from state-major rows of `(next_state, action)` cells.
    ///
    /// `rows[s][c]` gives the plain (unmultiplied) next state and action for state `s` on input
    /// class `c`; states are premultiplied into row offsets here.
    pub fn from_rows(
        name: String,
        target_name: String,
        input_eq: Vec<u32>,
        rows: &[Vec<(u32, i32)>],
        effector_vectors: Vec<i32>,
    ) -> Self {
        let num_states = rows.len();
        let num_classes = if num_states > 0 { rows[0].len() } else { 0 };
        debug_assert!(input_eq.iter().all(|&class| (class as usize) < num_classes.max(1)));

        let mut matrix = Vec::with_capacity(num_states * num_classes);
        for row in rows {
            debug_assert_eq!(row.len(), num_classes);
            for &(to, action) in row {
                matrix.push(cell(to * num_classes as u32, action));
            }
        }

        Self {
            name,
            target_name,
            input_eq: input_eq.into_boxed_slice(),
            num_states,
            num_classes,
            matrix: matrix.into_boxed_slice(),
            effector_vectors: effector_vectors.into_boxed_slice(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// The input equivalence map over `[0, signal_limit)` token ordinals.
    pub fn input_filter(&self) -> &[u32] {
        &self.input_eq
    }

    /// The dense kernel matrix, row-major by state, with premultiplied next states.
    pub fn matrix(&self) -> &[u64] {
        &self.matrix
    }

    /// The effector-vector pool; offset 0 holds the lone terminator.
    pub fn effector_vectors(&self) -> &[i32] {
        &self.effector_vectors
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// The equivalence class of a token ordinal.
    #[inline(always)]
    pub fn input_class(&self, token: usize) -> usize {
        self.input_eq[token] as usize
    }

    /// The plain (unmultiplied) state index of a premultiplied row offset.
    pub fn state_index(&self, state_offset: usize) -> usize {
        if self.num_classes == 0 { 0 } else { state_offset / self.num_classes }
    }
}

impl Serializable for Transducer {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_byte_string(Some(self.name.as_bytes()));
        target.write_byte_string(Some(self.target_name.as_bytes()));
        target.write_i32(self.input_eq.len() as i32);
        for &class in &self.input_eq {
            target.write_i32(class as i32);
        }

        // sparse row-major matrix; unlisted cells default to (next_state = row, action = 0)
        target.write_i32(self.num_states as i32);
        target.write_i32(self.num_classes as i32);
        for state in 0..self.num_states {
            let row = &self.matrix[state * self.num_classes..(state + 1) * self.num_classes];
            let default = cell((state * self.num_classes) as u32, 0);
            let nonzero = row.iter().filter(|&&value| value != default).count();
            target.write_i32(nonzero as i32);
            for (class, &value) in row.iter().enumerate() {
                if value != default {
                    target.write_i32(class as i32);
                    target.write_i32((cell_state(value) / self.num_classes) as i32);
                    target.write_i32(cell_action(value));
                }
            }
        }

        target.write_int_array(&self.effector_vectors);
    }
}

impl Deserializable for Transducer {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let name = read_name(source)?;
        let target_name = read_name(source)?;

        let eq_len = read_count(source, "equivalence map length")?;
        let mut input_eq = Vec::with_capacity(eq_len);
        for _ in 0..eq_len {
            input_eq.push(source.read_i32()? as u32);
        }

        let num_states = read_count(source, "state count")?;
        let num_classes = read_count(source, "class count")?;
        if input_eq.iter().any(|&class| class as usize >= num_classes.max(1)) {
            return Err(DeserializationError::InvalidValue(
                "equivalence class out of range".into(),
            ));
        }

        let mut matrix = Vec::with_capacity(num_states * num_classes);
        for state in 0..num_states {
            matrix.extend(core::iter::repeat_n(
                cell((state * num_classes) as u32, 0),
                num_classes,
            ));
        }
        for state in 0..num_states {
            let nonzero = read_count(source, "row cell count")?;
            for _ in 0..nonzero {
                let class = source.read_i32()? as usize;
                let to = source.read_i32()? as usize;
                let action = source.read_i32()?;
                if class >= num_classes || to >= num_states {
                    return Err(DeserializationError::InvalidValue(
                        "transition cell out of range".into(),
                    ));
                }
                matrix[state * num_classes + class] = cell((to * num_classes) as u32, action);
            }
        }

        let effector_vectors = source.read_int_array()?;

        Ok(Self {
            name,
            target_name,
            input_eq: input_eq.into_boxed_slice(),
            num_states,
            num_classes,
            matrix: matrix.into_boxed_slice(),
            effector_vectors: effector_vectors.into_boxed_slice(),
        })
    }
}

fn read_name<R: ByteReader>(source: &mut R) -> Result<String, DeserializationError> {
    let bytes = source
        .read_byte_string()?
        .ok_or_else(|| DeserializationError::InvalidValue("null name".into()))?;
    String::from_utf8(bytes)
        .map_err(|_| DeserializationError::InvalidValue("name is not utf-8".into()))
}

fn read_count<R: ByteReader>(
    source: &mut R,
    what: &str,
) -> Result<usize, DeserializationError> {
    let value = source.read_i32()?;
    if value < 0 {
        return Err(DeserializationError::InvalidValue(format!("negative {what}: {value}")));
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn action_packing_roundtrip() {
        let action = parametric_action(7, 0);
        assert!(is_parametric(action));
        assert_eq!(action_effector(action), 7);
        assert_eq!(action_parameter(action), 0);

        let action = parametric_action(18, 0x7FFE - 1);
        assert!(action > 0);
        assert_eq!(action_parameter(action), 0x7FFE - 1);

        // scalar ordinals stay below the parametric range
        assert!(!is_parametric(15));
    }

    #[test]
    fn cell_packing_roundtrip() {
        let packed = cell(3 * 7, -42);
        assert_eq!(cell_state(packed), 21);
        assert_eq!(cell_action(packed), -42);

        let packed = cell(0, 1);
        assert_eq!(cell_state(packed), 0);
        assert_eq!(cell_action(packed), 1);
    }

    fn sample() -> Transducer {
        // two states, three classes; state 0 advances to 1 on class 1 with a nil action and
        // self-loops pasting on class 2
        let rows = vec![
            vec![(0, 0), (1, 1), (0, 2)],
            vec![(1, 0), (1, 1), (0, -1)],
        ];
        let mut eq = vec![0u32; 259];
        eq[b'a' as usize] = 1;
        eq[b'b' as usize] = 2;
        Transducer::from_rows(
            "sample".into(),
            "BaseTarget".into(),
            eq,
            &rows,
            vec![0, 10, 15, 0],
        )
    }

    #[test]
    fn serialization_roundtrip_is_bytewise_identical() {
        let transducer = sample();
        let bytes = transducer.to_bytes();
        let decoded = Transducer::read_from_bytes(&bytes).unwrap();
        assert_eq!(decoded, transducer);
        assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn premultiplied_states_index_rows() {
        let transducer = sample();
        let class = transducer.input_class(b'a' as usize);
        let next = transducer.matrix()[class];
        assert_eq!(cell_state(next), 3);
        assert_eq!(transducer.state_index(cell_state(next)), 1);
    }

    #[test]
    fn corrupt_record_is_rejected() {
        let transducer = sample();
        let mut bytes = transducer.to_bytes();
        // truncating the vector pool trips the framing guard
        bytes.truncate(bytes.len() - 2);
        assert!(Transducer::read_from_bytes(&bytes).is_err());
    }
}
