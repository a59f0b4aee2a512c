/*!
The error taxonomy shared by every component of the engine.

Errors are values: fallible operations return `Result<T, Error>` and stop at
the first failure. An [`Error`] carries a closed [`ErrorKind`], a message
bounded to 255 bytes and, where one exists, the byte offset into the pattern
that produced it.
*/

use std::fmt;

use arraystring::{typenum::U255, ArrayString};

/// A specialized `Result` type for engine operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;

type Message = ArrayString<U255>;

/// The closed set of failure kinds an engine operation can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Empty input, zero size where positive is required, out-of-range index.
    InvalidParameter,
    /// Malformed pattern.
    Syntax,
    /// Recognized but disabled or not implemented, e.g. a raw literal
    /// without [`Flags::RAW_LITERAL`](crate::Flags::RAW_LITERAL).
    UnsupportedFeature,
    /// An allocation request was refused.
    Memory,
    /// Depth, transitions or states past a configured ceiling.
    LimitExceeded,
    /// Wall-clock limit hit.
    Timeout,
    /// Bytecode deserialization mismatch (bad magic, newer version).
    ConversionFailed,
    /// Post-load bytecode validation fault.
    InvalidBytecode,
    /// Caller-supplied output buffer too small.
    BufferOverflow,
    /// An internal invariant was broken; a bug in this crate.
    Internal,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidParameter => "invalid parameter",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::UnsupportedFeature => "unsupported feature",
            ErrorKind::Memory => "out of memory",
            ErrorKind::LimitExceeded => "limit exceeded",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ConversionFailed => "conversion failed",
            ErrorKind::InvalidBytecode => "invalid bytecode",
            ErrorKind::BufferOverflow => "buffer overflow",
            ErrorKind::Internal => "internal error",
        }
    }
}

/// An error produced by compiling or matching a pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: Message,
    position: Option<usize>,
}

impl Error {
    /// Creates an error of `kind`. Messages longer than 255 bytes are
    /// truncated at a character boundary.
    pub fn new(kind: ErrorKind, message: &str) -> Error {
        Error {
            kind,
            message: Message::from_str_truncate(message),
            position: None,
        }
    }

    pub(crate) fn syntax(message: &str, position: usize) -> Error {
        Error::new(ErrorKind::Syntax, message).at(position)
    }

    pub(crate) fn unsupported(message: &str) -> Error {
        Error::new(ErrorKind::UnsupportedFeature, message)
    }

    pub(crate) fn invalid_parameter(message: &str) -> Error {
        Error::new(ErrorKind::InvalidParameter, message)
    }

    pub(crate) fn limit(message: &str) -> Error {
        Error::new(ErrorKind::LimitExceeded, message)
    }

    pub(crate) fn timeout(message: &str) -> Error {
        Error::new(ErrorKind::Timeout, message)
    }

    pub(crate) fn conversion(message: &str) -> Error {
        Error::new(ErrorKind::ConversionFailed, message)
    }

    pub(crate) fn bytecode(message: &str) -> Error {
        Error::new(ErrorKind::InvalidBytecode, message)
    }

    pub(crate) fn internal(message: &str) -> Error {
        Error::new(ErrorKind::Internal, message)
    }

    /// Attaches the byte offset into the pattern at which the error occurred.
    pub(crate) fn at(mut self, position: usize) -> Error {
        self.position = Some(position);
        self
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human-readable message, at most 255 bytes.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// The byte offset into the pattern, when the error has one.
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// True for the kinds a match-time caller usually treats as "no match
    /// with a diagnosis" rather than a programming error.
    pub fn is_resource_bound(&self) -> bool {
        matches!(self.kind, ErrorKind::LimitExceeded | ErrorKind::Timeout)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)?;
        if let Some(pos) = self.position {
            write!(f, " (at byte {pos})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}
