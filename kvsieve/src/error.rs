use std::path::PathBuf;
use thiserror::Error as ThisError;

#[non_exhaustive]
#[derive(Debug, ThisError)]
pub(crate) enum KvSieveError {
    #[error("iterator not initialized")]
    IteratorNotInitialized,

    #[error("sorted run entries out of order. id=`{id}`, index=`{index}`")]
    UnsortedRun { id: u32, index: usize },

    #[error("compaction already running for destination. destination=`{0}`")]
    DestinationInUse(u32),

    #[error("invalid max concurrent compactions, it must be greater than 0")]
    InvalidMaxConcurrentCompactions,

    #[error("compactor is closed")]
    Closed,

    #[error("background task panicked. name=`{0}`")]
    BackgroundTaskPanic(String),

    #[error("unknown configuration file format. path=`{0}`")]
    UnknownConfigurationFormat(PathBuf),

    #[error("invalid configuration format")]
    InvalidConfigurationFormat(#[from] Box<figment::Error>),
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Represents the kind of public errors that can be returned to the user.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The compactor has been stopped. Runs that were in flight were aborted and
    /// their filters dropped.
    Closed,

    /// User attempted an invalid request. This might be:
    ///
    /// - An invalid configuration
    /// - An invalid argument to a method, such as a duplicate destination
    ///
    /// The user must correct the code, configuration, or argument and retry.
    Invalid,

    /// Input data is in an unexpected state, such as a sorted run whose entries
    /// are out of order.
    Data,

    /// An unexpected internal error occurred, including a panic inside a
    /// user-supplied filter.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Closed => write!(f, "Closed error"),
            ErrorKind::Invalid => write!(f, "Invalid error"),
            ErrorKind::Data => write!(f, "Data error"),
            ErrorKind::Internal => write!(f, "Internal error"),
        }
    }
}

/// Represents a public error that can be returned to the user.
#[non_exhaustive]
#[derive(Debug)]
pub struct Error {
    msg: String,
    kind: ErrorKind,
    source: Option<BoxError>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)?;
        if let Some(source) = self.source.as_ref() {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl Error {
    /// Creates a new closed error.
    pub fn closed(msg: String) -> Self {
        Self {
            msg,
            kind: ErrorKind::Closed,
            source: None,
        }
    }

    /// Creates a new invalid request or configuration error.
    pub fn invalid(msg: String) -> Self {
        Self {
            msg,
            kind: ErrorKind::Invalid,
            source: None,
        }
    }

    /// Creates a new data error.
    pub fn data(msg: String) -> Self {
        Self {
            msg,
            kind: ErrorKind::Data,
            source: None,
        }
    }

    /// Creates a new internal error.
    pub fn internal(msg: String) -> Self {
        Self {
            msg,
            kind: ErrorKind::Internal,
            source: None,
        }
    }

    /// Adds a source to the error.
    pub fn with_source(mut self, source: BoxError) -> Self {
        self.source = Some(source);
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<KvSieveError> for Error {
    fn from(err: KvSieveError) -> Self {
        let msg = err.to_string();
        match err {
            KvSieveError::Closed => Error::closed(msg),

            KvSieveError::IteratorNotInitialized => Error::invalid(msg),
            KvSieveError::DestinationInUse(_) => Error::invalid(msg),
            KvSieveError::InvalidMaxConcurrentCompactions => Error::invalid(msg),
            KvSieveError::UnknownConfigurationFormat(_) => Error::invalid(msg),
            KvSieveError::InvalidConfigurationFormat(err) => {
                Error::invalid(msg).with_source(Box::new(err))
            }

            KvSieveError::UnsortedRun { .. } => Error::data(msg),

            KvSieveError::BackgroundTaskPanic(_) => Error::internal(msg),
        }
    }
}
