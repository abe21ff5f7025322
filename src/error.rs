// src/error.rs
//! Error taxonomy shared by every codec.
//!
//! All failures are pure functions of the input bytes: decoding the same
//! buffer twice fails the same way. Nothing here is retried or logged; the
//! caller decides whether to skip the enclosing segment or abort.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Code text, bit stream or out-of-band queue ran out before the
    /// declared symbol/element count was reached.
    #[error("stream exhausted while reading {what}: requested {requested}, available {available}")]
    StreamExhausted {
        what:      &'static str,
        requested: u64,
        available: u64,
    },

    /// Invalid tags, table counts, or declared sizes that disagree with what
    /// was actually consumed/produced.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// An out-of-band symbol decoded in a context that does not permit it.
    #[error("out-of-band escape not permitted in context {context}")]
    InvalidEscape { context: i32 },

    /// The header was fine but the payload drove a decoder into an
    /// impossible state.
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    /// A caller-supplied argument is outside the accepted range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;

impl CodecError {
    pub fn exhausted(what: &'static str, requested: u64, available: u64) -> Self {
        Self::StreamExhausted { what, requested, available }
    }

    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedHeader(message.into())
    }

    pub fn corrupt<S: Into<String>>(message: S) -> Self {
        Self::CorruptStream(message.into())
    }

    pub fn invalid_parameter<S: Into<String>>(message: S) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// True for truncation failures, which callers usually treat as
    /// "segment incomplete" rather than "segment corrupt".
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::StreamExhausted { .. })
    }
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::exhausted("underlying reader", 0, 0),
            _ => Self::corrupt(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_maps_to_exhausted() {
        let err: CodecError = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(err.is_exhausted());
    }

    #[test]
    fn other_io_errors_map_to_corrupt() {
        let err: CodecError = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad").into();
        assert!(matches!(err, CodecError::CorruptStream(_)));
    }

    #[test]
    fn messages_carry_context() {
        let err = CodecError::exhausted("code text", 16, 3);
        assert_eq!(
            err.to_string(),
            "stream exhausted while reading code text: requested 16, available 3"
        );
        assert_eq!(
            CodecError::InvalidEscape { context: 0 }.to_string(),
            "out-of-band escape not permitted in context 0"
        );
    }
}
