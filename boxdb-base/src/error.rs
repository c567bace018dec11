// We want a few things here:
// 1. A way to create a new error with a backtrace
// 2. A way to centralize setting a breakpoint to trap any error in the system fairly soon
//    after it's created (or at least when it's propagated from a library we use back to us)
// 3. Same but for logging / emitting error messages into the tracing/logging system
// 4. A way for callers to recover which error kind a failure represents, since callers
//    branch on DuplicateKey vs NoSuchKey vs ReadOnly etc.

use std::borrow::Cow;
use backtrace_error::DynBacktraceError;
use tracing::error;

#[cfg(test)]
use test_log::test;

/// The classification of an [`Error`]: table/index lookup failures, the
/// insert/replace/delete conflicts, malformed wire data, and the durability
/// and availability failures surfaced by the transaction and WAL layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    NoSuchTable,
    NoSuchIndex,
    DuplicateKey,
    NoSuchKey,
    CardinalityMismatch,
    MalformedTuple,
    TruncatedField,
    BadOpcode,
    UpdateOutOfRange,
    ReadOnly,
    WalFailure,
    CorruptLog,
    ShardUnavailable,
    /// A failure from a dependency (`io::Error`, etc.) with no more
    /// specific classification.
    Other,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    inner: DynBacktraceError,
}
pub type Result<T> = std::result::Result<T, Error>;

struct SimpleErr(Cow<'static, str>);
impl std::fmt::Debug for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for SimpleErr {
    fn description(&self) -> &str {
        &self.0
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<E> for Error {
    fn from(err: E) -> Error {
        Error::new(Kind::Other, err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.inner)
    }
}

impl Error {
    pub fn new<E: std::error::Error + Send + Sync + 'static>(kind: Kind, err: E) -> Error {
        error!(target: "boxdb", ?kind, "{:?}", err);
        let inner = DynBacktraceError::from(err);
        Error { kind, inner }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }
}

pub fn err(msg: impl Into<Cow<'static, str>>) -> Error {
    kind_err(Kind::Other, msg)
}

pub fn kind_err(kind: Kind, msg: impl Into<Cow<'static, str>>) -> Error {
    let err = SimpleErr(msg.into());
    Error::new(kind, err)
}

/// A fatal invariant violation during commit: commit cannot fail, so
/// discovering one here means the process must abort rather than continue
/// running with a half-committed transaction.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        tracing::error!(target: "boxdb", "fatal invariant violation during commit: {}", format!($($arg)*));
        std::process::abort();
    }};
}

#[test]
fn test_error() {
    let e = kind_err(Kind::NoSuchKey, "test error");
    assert_eq!(e.kind(), Kind::NoSuchKey);
}

#[test]
fn test_error_from_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
    let e: Error = io_err.into();
    assert_eq!(e.kind(), Kind::Other);
}
