//! Error types and the related `Result<T>`

use std::fmt;
use std::io;

use thiserror::Error;

pub type ZipResult<T> = Result<T, ZipError>;

/// Boxed error from an object store's transport.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The object store call that failed
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransportOperation {
    ListContainers,
    ListObjectVersions,
    FetchRange,
}

impl fmt::Display for TransportOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportOperation::ListContainers => "container list",
            TransportOperation::ListObjectVersions => "object version list",
            TransportOperation::FetchRange => "range fetch",
        })
    }
}

#[derive(Debug, Error)]
pub enum ZipError {
    /// An error from underlying I/O
    #[error("I/O Error")]
    Io(#[from] io::Error),

    /// The object is too small to hold an End Of Central Directory Record,
    /// or no record was found near its end.
    #[error("Not a zip file: {0}")]
    NotAZipFile(String),

    /// A mandatory header signature was missing or a header was malformed.
    #[error("Corrupt zip headers: {0}")]
    CorruptHeaders(String),

    /// The Zip64 locator pointed somewhere nonsensical.
    #[error("Invalid offset {0} for Zip64 End Of Central Directory Record")]
    InvalidOffset(u64),

    /// A seek or read fell outside the object.
    /// `start` and `end` are inclusive.
    #[error("Range {start}..={end} is outside the object's {length} bytes")]
    OutOfBounds { start: u64, end: u64, length: u64 },

    /// The object store's client failed
    #[error("Remote {operation} failed")]
    Transport {
        operation: TransportOperation,
        #[source]
        source: TransportError,
    },

    /// The remote object doesn't exist (or can't be read).
    #[error("Remote object not found: {0}")]
    ObjectNotFound(String),

    /// The reader was used after `close()`
    #[error("Reader is closed")]
    Closed,

    /// A reader or parser was configured with nonsensical values
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(&'static str),

    /// The ZIP archive uses an unsupported feature
    #[error("Unsupported Zip archive: {0}")]
    UnsupportedArchive(String),

    /// A cast from a 64-bit int to a usize failed while sizing a buffer,
    /// probably on a 32-bit system.
    #[error("Zip archive too large for address space")]
    InsufficientAddressSpace,
}

impl ZipError {
    pub(crate) fn transport<E>(operation: TransportOperation, source: E) -> Self
    where
        E: Into<TransportError>,
    {
        ZipError::Transport {
            operation,
            source: source.into(),
        }
    }
}

impl From<ZipError> for io::Error {
    fn from(e: ZipError) -> io::Error {
        match e {
            ZipError::Io(inner) => inner,
            ZipError::OutOfBounds { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, e),
            ZipError::ObjectNotFound(_) => io::Error::new(io::ErrorKind::NotFound, e),
            ZipError::Closed => io::Error::new(io::ErrorKind::NotConnected, e),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
