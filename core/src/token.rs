use alloc::{string::String, vec::Vec};
use core::fmt;

// TOKEN SIGILS
// ================================================================================================

const SIGNAL_SIGIL: u8 = b'!';
const FIELD_SIGIL: u8 = b'~';
const TRANSDUCER_SIGIL: u8 = b'@';
const ESCAPE: u8 = b'\\';

// TOKEN
// ================================================================================================

/// A typed parameter token from tape 2 of a transducer pattern.
///
/// The first byte of the raw token selects the type: `!name` is a signal reference, `~name` a
/// field reference, `@name` a transducer reference; anything else is a literal byte sequence. A
/// leading `\` escapes a sigil byte into a literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Literal(Vec<u8>),
    Signal(Vec<u8>),
    Field(Vec<u8>),
    Transducer(Vec<u8>),
}

impl Token {
    /// Types a raw tape-2 token by its sigil byte.
    pub fn parse(raw: &[u8]) -> Self {
        match raw.first() {
            Some(&SIGNAL_SIGIL) => Token::Signal(raw[1..].to_vec()),
            Some(&FIELD_SIGIL) => Token::Field(raw[1..].to_vec()),
            Some(&TRANSDUCER_SIGIL) => Token::Transducer(raw[1..].to_vec()),
            Some(&ESCAPE) => Token::Literal(raw[1..].to_vec()),
            _ => Token::Literal(raw.to_vec()),
        }
    }

    /// The token name without its sigil; for literals, the literal bytes.
    pub fn name(&self) -> &[u8] {
        match self {
            Token::Literal(bytes)
            | Token::Signal(bytes)
            | Token::Field(bytes)
            | Token::Transducer(bytes) => bytes,
        }
    }

    /// Re-encodes the token into its raw sigil-prefixed form.
    pub fn raw(&self) -> Vec<u8> {
        let (sigil, bytes) = match self {
            Token::Literal(bytes) => {
                // re-escape literals that would otherwise parse as a reference
                match bytes.first() {
                    Some(&SIGNAL_SIGIL) | Some(&FIELD_SIGIL) | Some(&TRANSDUCER_SIGIL)
                    | Some(&ESCAPE) => (Some(ESCAPE), bytes),
                    _ => (None, bytes),
                }
            },
            Token::Signal(bytes) => (Some(SIGNAL_SIGIL), bytes),
            Token::Field(bytes) => (Some(FIELD_SIGIL), bytes),
            Token::Transducer(bytes) => (Some(TRANSDUCER_SIGIL), bytes),
        };
        let mut raw = Vec::with_capacity(bytes.len() + 1);
        if let Some(sigil) = sigil {
            raw.push(sigil);
        }
        raw.extend_from_slice(bytes);
        raw
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Token::Literal(_))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sigil = match self {
            Token::Literal(_) => "",
            Token::Signal(_) => "!",
            Token::Field(_) => "~",
            Token::Transducer(_) => "@",
        };
        write!(f, "{sigil}{}", String::from_utf8_lossy(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigils_type_tokens() {
        assert_eq!(Token::parse(b"!nul"), Token::Signal(b"nul".to_vec()));
        assert_eq!(Token::parse(b"~name"), Token::Field(b"name".to_vec()));
        assert_eq!(Token::parse(b"@Automaton"), Token::Transducer(b"Automaton".to_vec()));
        assert_eq!(Token::parse(b"10"), Token::Literal(b"10".to_vec()));
        assert_eq!(Token::parse(b"\\!bang"), Token::Literal(b"!bang".to_vec()));
    }

    #[test]
    fn raw_roundtrip_preserves_type() {
        for raw in [&b"!eos"[..], b"~0", b"@T", b"plain", b"\\~tilde"] {
            let token = Token::parse(raw);
            assert_eq!(Token::parse(&token.raw()), token);
        }
    }
}
