use crate::prelude::*;
use thiserror::Error as ThisError;

/// Represents an error while decoding a Standard Midi File.
///
/// This type wraps an [`ErrorKind`], the byte offset at which decoding stopped (if known) and a
/// list of context messages collected while the error bubbled up through the decoder.
///
/// The `Display` implementation only shows the kind and offset, while the `Debug` implementation
/// also prints the full context chain, innermost first.
#[derive(Clone, PartialEq, Eq)]
pub struct Error {
    inner: Box<Inner>,
}

#[derive(Clone, PartialEq, Eq)]
struct Inner {
    kind: ErrorKind,
    position: Option<usize>,
    context: Vec<&'static str>,
}

impl Error {
    /// Create a new error with the given `ErrorKind`.
    #[inline]
    pub fn new(kind: ErrorKind) -> Error {
        Error {
            inner: Box::new(Inner {
                kind,
                position: None,
                context: Vec::new(),
            }),
        }
    }

    /// Create a new error that occurred at the given byte offset of the input.
    #[inline]
    pub(crate) fn at(kind: ErrorKind, position: usize) -> Error {
        let mut err = Error::new(kind);
        err.inner.position = Some(position);
        err
    }

    /// More information about the error itself.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    /// The byte offset into the input buffer at which decoding failed, if known.
    #[inline]
    pub fn position(&self) -> Option<usize> {
        self.inner.position
    }

    /// What the decoder was doing when the error occurred, innermost first.
    #[inline]
    pub fn context(&self) -> &[&'static str] {
        &self.inner.context
    }

    #[inline]
    pub(crate) fn chain_ctx(mut self, ctx: &'static str) -> Error {
        self.inner.context.push(ctx);
        self
    }

    /// Replace the kind of this error, keeping the old message as context.
    pub(crate) fn reclassify(mut self, kind: ErrorKind) -> Error {
        let old = mem::replace(&mut self.inner.kind, kind);
        self.inner.context.insert(0, old.message());
        self
    }
}
impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Error {
        Error::new(kind)
    }
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.inner.kind, f)?;
        if let Some(pos) = self.inner.position {
            write!(f, " (at byte {})", pos)?;
        }
        Ok(())
    }
}
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)?;
        for ctx in self.inner.context.iter() {
            writeln!(f)?;
            write!(f, "  while: {}", ctx)?;
        }
        Ok(())
    }
}
impl std::error::Error for Error {}

/// The type of error that occurred while decoding.
///
/// Every variant carries a non-normative message describing what exact part of the MIDI format
/// was not respected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, ThisError)]
pub enum ErrorKind {
    /// A read went past the end of the input buffer.
    #[error("unexpected end of input: {0}")]
    OutOfBounds(&'static str),
    /// The `MThd` chunk is missing, has the wrong length, or holds values out of range.
    #[error("invalid midi header: {0}")]
    InvalidHeader(&'static str),
    /// A variable-length integer did not terminate within 4 bytes.
    #[error("malformed varlen integer: {0}")]
    MalformedVlq(&'static str),
    /// A chunk's declared length does not match the bytes its contents consume.
    #[error("truncated chunk: {0}")]
    TruncatedChunk(&'static str),
    /// An event could not be decoded without losing track of the byte stream.
    #[error("unsupported event: {0}")]
    UnsupportedEvent(&'static str),
    /// The in-memory model cannot be represented as a Standard Midi File.
    #[error("unencodable midi: {0}")]
    InvalidInput(&'static str),
}
impl ErrorKind {
    /// Get the informative message on what exact part of the MIDI format was not respected.
    #[inline]
    pub fn message(&self) -> &'static str {
        match *self {
            ErrorKind::OutOfBounds(msg) => msg,
            ErrorKind::InvalidHeader(msg) => msg,
            ErrorKind::MalformedVlq(msg) => msg,
            ErrorKind::TruncatedChunk(msg) => msg,
            ErrorKind::UnsupportedEvent(msg) => msg,
            ErrorKind::InvalidInput(msg) => msg,
        }
    }
}

macro_rules! err {
    ($kind:ident, $msg:expr) => {{
        ErrorKind::$kind($msg)
    }};
}

pub(crate) trait ResultExt<T> {
    fn context(self, ctx: &'static str) -> Result<T>;
}
impl<T> ResultExt<T> for StdResult<T, Error> {
    #[inline]
    fn context(self, ctx: &'static str) -> Result<T> {
        self.map_err(|err| err.chain_ctx(ctx))
    }
}
impl<T> ResultExt<T> for StdResult<T, ErrorKind> {
    #[inline]
    fn context(self, ctx: &'static str) -> Result<T> {
        self.map_err(|kind| Error::new(kind).chain_ctx(ctx))
    }
}

/// The result type used by the MIDI decoder.
pub type Result<T> = StdResult<T, Error>;
pub(crate) use core::result::Result as StdResult;
