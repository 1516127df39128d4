use alloc::{string::String, vec::Vec};

use crate::{errors::ParameterError, registry::ModelMaps, signals::Signal, token::Token};

// BUILT-IN EFFECTOR ORDINALS
// ================================================================================================

// The built-in effectors occupy ordinals 0..=18 of every model's effector namespace; host target
// effectors follow. Ordinals 0 and 1 are sentinels recognized by the transductor's inner loop and
// may never be invoked through the dispatch table.

pub const NUL: u32 = 0;
pub const NIL: u32 = 1;
pub const PASTE: u32 = 2;
pub const SELECT: u32 = 3;
pub const COPY: u32 = 4;
pub const CUT: u32 = 5;
pub const CLEAR: u32 = 6;
pub const COUNT: u32 = 7;
pub const SIGNAL: u32 = 8;
pub const IN: u32 = 9;
pub const OUT: u32 = 10;
pub const MARK: u32 = 11;
pub const RESET: u32 = 12;
pub const START: u32 = 13;
pub const PAUSE: u32 = 14;
pub const STOP: u32 = 15;
pub const MSUM: u32 = 16;
pub const MPRODUCT: u32 = 17;
pub const MSCAN: u32 = 18;

/// Built-in effector names, in ordinal order.
pub const BUILT_IN_EFFECTORS: [&str; 19] = [
    "nul", "nil", "paste", "select", "copy", "cut", "clear", "count", "signal", "in", "out",
    "mark", "reset", "start", "pause", "stop", "msum", "mproduct", "mscan",
];

// AFTER-EFFECT MASK
// ================================================================================================

/// Bitmask returned by effector invocations to inform the main loop of required after-effects.
///
/// Bits 0..=15 hold flags; bits 16..=31 hold a raised signal ordinal when [EFFECT_SIGNAL] is set.
pub type Effect = u32;

pub const EFFECT_NONE: Effect = 0;
/// The input stack was mutated; the main loop must re-peek the top frame.
pub const EFFECT_INPUT: Effect = 1 << 0;
/// A signal was raised; it replaces the next input token.
pub const EFFECT_SIGNAL: Effect = 1 << 1;
/// A transducer was pushed; the main loop restarts on the new top frame.
pub const EFFECT_START: Effect = 1 << 2;
/// A transducer was popped (not the last).
pub const EFFECT_STOP: Effect = 1 << 3;
/// The last transducer was popped.
pub const EFFECT_STOPPED: Effect = 1 << 4;
/// Cooperative yield; `run` returns to the caller.
pub const EFFECT_PAUSE: Effect = 1 << 5;

/// Encodes a raised signal into an after-effect word.
pub const fn effect_signal(signal: Signal) -> Effect {
    EFFECT_SIGNAL | (signal.as_u32() << 16)
}

/// Extracts the raised signal ordinal from an after-effect word.
pub const fn signal_of_effect(effect: Effect) -> u32 {
    effect >> 16
}

// BUILT-IN EFFECTOR PARAMETERS
// ================================================================================================

/// One element of an `out`/`paste`/`in` parameter: a field reference or a literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutToken {
    Field(u32),
    Literal(Vec<u8>),
}

/// A compiled parameter for one of the built-in effectors.
///
/// Raw parameter token arrays are carried in the model file; this is the typed form the runtime
/// binds them to. The compiler runs the same conversion to validate parameters early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuiltinParam {
    /// `select[~f]`, `copy[~f]`, `cut[~f]`, `clear[~f]`, `clear[~*]`.
    Field(u32),
    /// `paste[..]`, `out[..]`, `in[..]`: fields and literals, in order.
    Tokens(Vec<OutToken>),
    /// `count[n !signal]`: a countdown and the signal raised when it reaches zero.
    Count { n: u64, signal: u32 },
    /// `signal[!s]`.
    Signal(u32),
    /// `start[@t]`.
    Transducer(u32),
    /// `msum[..]`: 256-bit membership mask over byte values, synthesized by the compiler.
    SumMask([u64; 4]),
    /// `mproduct[..]`: the byte sequence to match, synthesized by the compiler.
    Product(Vec<u8>),
    /// `mscan[..]`: the byte to scan for, synthesized by the compiler.
    Scan(u8),
}

/// Compiles a raw parameter token array for built-in effector `effector` into its typed form.
///
/// Signal, field, and transducer references are resolved against `maps`; the compiler applies the
/// same conversion after interning so that invalid parameters fail the compile rather than the
/// bind.
pub fn compile_builtin_parameter(
    effector: u32,
    tokens: &[Token],
    maps: &ModelMaps,
) -> Result<BuiltinParam, ParameterError> {
    match effector {
        SELECT | COPY | CUT | CLEAR => {
            let field = single_field(effector, tokens, maps)?;
            // the all-fields sentinel is a clear parameter only
            if field == 1 && effector != CLEAR {
                return Err(ParameterError::BadTokenType {
                    effector: effector_name(effector),
                    token: "~*".into(),
                });
            }
            Ok(BuiltinParam::Field(field))
        },
        PASTE | IN | OUT => {
            if tokens.is_empty() {
                return Err(ParameterError::WrongArity {
                    effector: effector_name(effector),
                    expected: "at least one token",
                });
            }
            let mut out = Vec::with_capacity(tokens.len());
            for token in tokens {
                match token {
                    Token::Field(name) => out.push(OutToken::Field(resolve_field(name, maps)?)),
                    Token::Literal(bytes) => out.push(OutToken::Literal(bytes.clone())),
                    other => {
                        return Err(ParameterError::BadTokenType {
                            effector: effector_name(effector),
                            token: format!("{other}"),
                        });
                    },
                }
            }
            Ok(BuiltinParam::Tokens(out))
        },
        COUNT => {
            let [n, signal] = tokens else {
                return Err(ParameterError::WrongArity {
                    effector: effector_name(COUNT),
                    expected: "a count and a signal",
                });
            };
            let n = parse_decimal(n.name()).ok_or_else(|| ParameterError::InvalidNumber {
                effector: effector_name(COUNT),
                token: format!("{n}"),
            })?;
            Ok(BuiltinParam::Count { n, signal: resolve_signal(signal, maps)? })
        },
        SIGNAL => {
            let [signal] = tokens else {
                return Err(ParameterError::WrongArity {
                    effector: effector_name(SIGNAL),
                    expected: "one signal",
                });
            };
            Ok(BuiltinParam::Signal(resolve_signal(signal, maps)?))
        },
        START => {
            let [Token::Transducer(name)] = tokens else {
                return Err(ParameterError::WrongArity {
                    effector: effector_name(START),
                    expected: "one transducer reference",
                });
            };
            let ordinal = maps
                .transducers
                .get(name)
                .ok_or_else(|| ParameterError::UnknownTransducer(lossy(name)))?;
            Ok(BuiltinParam::Transducer(ordinal))
        },
        MSUM => {
            let [Token::Literal(bytes)] = tokens else {
                return Err(ParameterError::WrongArity {
                    effector: effector_name(MSUM),
                    expected: "one 32-byte mask literal",
                });
            };
            let bytes: &[u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                ParameterError::BadTokenType {
                    effector: effector_name(MSUM),
                    token: format!("{}-byte literal", bytes.len()),
                }
            })?;
            let mut mask = [0u64; 4];
            for (word, chunk) in mask.iter_mut().zip(bytes.chunks_exact(8)) {
                *word = u64::from_le_bytes(chunk.try_into().expect("8-byte chunk"));
            }
            Ok(BuiltinParam::SumMask(mask))
        },
        MPRODUCT => {
            let [Token::Literal(bytes)] = tokens else {
                return Err(ParameterError::WrongArity {
                    effector: effector_name(MPRODUCT),
                    expected: "one byte-sequence literal",
                });
            };
            if bytes.is_empty() {
                return Err(ParameterError::WrongArity {
                    effector: effector_name(MPRODUCT),
                    expected: "a non-empty byte-sequence literal",
                });
            }
            Ok(BuiltinParam::Product(bytes.clone()))
        },
        MSCAN => {
            let [Token::Literal(bytes)] = tokens else {
                return Err(ParameterError::WrongArity {
                    effector: effector_name(MSCAN),
                    expected: "one single-byte literal",
                });
            };
            let [byte] = bytes.as_slice() else {
                return Err(ParameterError::BadTokenType {
                    effector: effector_name(MSCAN),
                    token: format!("{}-byte literal", bytes.len()),
                });
            };
            Ok(BuiltinParam::Scan(*byte))
        },
        NUL | NIL => Err(ParameterError::SentinelEffector(effector_name(effector))),
        _ => Err(ParameterError::NotParameterized(effector_name(effector))),
    }
}

fn effector_name(effector: u32) -> &'static str {
    BUILT_IN_EFFECTORS.get(effector as usize).copied().unwrap_or("?")
}

fn single_field(effector: u32, tokens: &[Token], maps: &ModelMaps) -> Result<u32, ParameterError> {
    let [Token::Field(name)] = tokens else {
        return Err(ParameterError::WrongArity {
            effector: effector_name(effector),
            expected: "one field reference",
        });
    };
    resolve_field(name, maps)
}

fn resolve_field(name: &[u8], maps: &ModelMaps) -> Result<u32, ParameterError> {
    maps.fields.get(name).ok_or_else(|| ParameterError::UnknownField(lossy(name)))
}

fn resolve_signal(token: &Token, maps: &ModelMaps) -> Result<u32, ParameterError> {
    // a bare literal may name a signal already registered on tape 0
    match token {
        Token::Signal(name) | Token::Literal(name) => {
            maps.signals.get(name).ok_or_else(|| ParameterError::UnknownSignal(lossy(name)))
        },
        other => Err(ParameterError::BadTokenType {
            effector: effector_name(SIGNAL),
            token: format!("{other}"),
        }),
    }
}

fn parse_decimal(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut value: u64 = 0;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add((byte - b'0') as u64)?;
    }
    Some(value)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maps() -> ModelMaps {
        let mut maps = ModelMaps::new();
        maps.fields.intern(b"name");
        maps.signals.intern(b"http11");
        maps.transducers.intern(b"HeaderLine");
        maps
    }

    #[test]
    fn field_parameters_resolve() {
        let maps = maps();
        let param = compile_builtin_parameter(SELECT, &[Token::parse(b"~name")], &maps).unwrap();
        assert_eq!(param, BuiltinParam::Field(2));

        let param = compile_builtin_parameter(CLEAR, &[Token::parse(b"~*")], &maps).unwrap();
        assert_eq!(param, BuiltinParam::Field(1));

        let err = compile_builtin_parameter(CUT, &[Token::parse(b"~missing")], &maps).unwrap_err();
        assert!(matches!(err, ParameterError::UnknownField(_)));
    }

    #[test]
    fn count_parameter_parses_decimal_and_signal() {
        let maps = maps();
        let tokens = [Token::parse(b"10"), Token::parse(b"!http11")];
        let param = compile_builtin_parameter(COUNT, &tokens, &maps).unwrap();
        assert_eq!(param, BuiltinParam::Count { n: 10, signal: 259 });

        let tokens = [Token::parse(b"ten"), Token::parse(b"!http11")];
        assert!(compile_builtin_parameter(COUNT, &tokens, &maps).is_err());
    }

    #[test]
    fn out_parameter_mixes_fields_and_literals() {
        let maps = maps();
        let tokens = [Token::parse(b"~name"), Token::parse(b": "), Token::parse(b"~0")];
        let param = compile_builtin_parameter(OUT, &tokens, &maps).unwrap();
        assert_eq!(
            param,
            BuiltinParam::Tokens(vec![
                OutToken::Field(2),
                OutToken::Literal(b": ".to_vec()),
                OutToken::Field(0),
            ])
        );
    }

    #[test]
    fn trap_parameters_decode() {
        let maps = maps();
        let mut mask_bytes = vec![0u8; 32];
        mask_bytes[b'a' as usize >> 3] |= 1 << (b'a' as usize & 7);
        let param =
            compile_builtin_parameter(MSUM, &[Token::Literal(mask_bytes)], &maps).unwrap();
        let BuiltinParam::SumMask(mask) = param else { panic!("expected mask") };
        assert_eq!(mask[(b'a' as usize) >> 6] >> ((b'a' as usize) & 63) & 1, 1);

        let param =
            compile_builtin_parameter(MSCAN, &[Token::Literal(vec![b'\n'])], &maps).unwrap();
        assert_eq!(param, BuiltinParam::Scan(b'\n'));
    }

    #[test]
    fn sentinels_are_rejected() {
        let maps = maps();
        assert!(matches!(
            compile_builtin_parameter(NUL, &[], &maps),
            Err(ParameterError::SentinelEffector(_))
        ));
    }
}
