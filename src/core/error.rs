/*!
Error handling for the envelope.

Cryptographic failures carry as little detail as possible; engine failures
keep enough context (exit status, truncated stderr) to diagnose a broken host.
*/

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for envelope operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for envelope operations
#[derive(Error, Debug)]
pub enum Error {
    /// No usable key-exchange primitive on this host
    #[error("No suitable cryptographic primitive available")]
    CapabilityUnavailable,

    /// An external or in-process primitive invocation failed
    #[error("Key exchange backend failed: {0}")]
    BackendInvocation(#[source] BackendError),

    /// MAC mismatch (limited details for security)
    #[error("Integrity check failed")]
    Integrity,

    /// Authenticated ciphertext is structurally invalid
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Envelope is structurally invalid or was sealed at another level
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Operation invoked out of sequence
    #[error("Envelope not in correct state: expected {expected}, but was {actual}")]
    IllegalState {
        expected: String,
        actual: String,
    },

    /// Secure scope filesystem error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Backend invocation errors
#[derive(Error, Debug)]
pub enum BackendError {
    /// The engine binary could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The engine exited with a failure status
    #[error("{operation} exited with status {code:?}: {stderr}")]
    Status {
        operation: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    /// The engine did not finish in time and was killed
    #[error("{operation} timed out after {} ms", .timeout.as_millis())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// Key or ciphertext bytes could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// The backend does not support the requested algorithm
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

impl From<BackendError> for Error {
    fn from(error: BackendError) -> Self {
        Error::BackendInvocation(error)
    }
}

impl Error {
    /// True for failures caused by the data handed to `open`/`decrypt`
    /// rather than by the host or the call sequence.
    pub fn is_input_rejection(&self) -> bool {
        matches!(
            self,
            Error::Integrity | Error::MalformedInput(_) | Error::MalformedEnvelope(_)
        )
    }
}

/// Create a malformed envelope error
#[macro_export]
macro_rules! envelope_err {
    ($msg:expr) => {
        Err($crate::core::error::Error::MalformedEnvelope($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        Err($crate::core::error::Error::MalformedEnvelope(format!($fmt, $($arg)*)))
    };
}

/// Create a malformed input error
#[macro_export]
macro_rules! input_err {
    ($msg:expr) => {
        Err($crate::core::error::Error::MalformedInput($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        Err($crate::core::error::Error::MalformedInput(format!($fmt, $($arg)*)))
    };
}

/// Create an illegal state error
#[macro_export]
macro_rules! invalid_state_err {
    ($expected:expr, $actual:expr) => {
        Err($crate::core::error::Error::IllegalState {
            expected: $expected.to_string(),
            actual: $actual.to_string(),
        })
    };
}

/// Create a backend decode error
#[macro_export]
macro_rules! decode_err {
    ($($arg:tt)*) => {
        Err($crate::core::error::Error::BackendInvocation(
            $crate::core::error::BackendError::Decode(format!($($arg)*)),
        ))
    };
}

/// Convert from Error to io::Error (for CLI plumbing)
impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Io(io_error) => io_error,
            Error::CapabilityUnavailable => {
                io::Error::new(io::ErrorKind::Unsupported, "No suitable cryptographic primitive")
            }
            Error::BackendInvocation(e) => io::Error::other(e.to_string()),
            Error::Integrity => io::Error::new(io::ErrorKind::InvalidData, "Integrity check failed"),
            Error::MalformedInput(msg) | Error::MalformedEnvelope(msg) => {
                io::Error::new(io::ErrorKind::InvalidData, msg)
            }
            Error::IllegalState { expected, actual } => io::Error::other(format!(
                "Invalid state: expected {}, but was {}",
                expected, actual
            )),
            Error::Config(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MalformedEnvelope("bad json".to_string());
        assert_eq!(format!("{}", err), "Malformed envelope: bad json");

        let err = Error::Integrity;
        assert_eq!(format!("{}", err), "Integrity check failed");

        let err: Error = BackendError::Timeout {
            operation: "genpkey",
            timeout: Duration::from_millis(1500),
        }
        .into();
        assert_eq!(
            format!("{}", err),
            "Key exchange backend failed: genpkey timed out after 1500 ms"
        );
    }

    #[test]
    fn test_macros() {
        let r: Result<()> = invalid_state_err!("Created", "Destroyed");
        match r {
            Err(Error::IllegalState { expected, actual }) => {
                assert_eq!(expected, "Created");
                assert_eq!(actual, "Destroyed");
            }
            other => panic!("unexpected: {:?}", other),
        }

        let r: Result<()> = envelope_err!("level {} unsupported", 9);
        assert!(matches!(r, Err(Error::MalformedEnvelope(m)) if m == "level 9 unsupported"));

        let r: Result<()> = decode_err!("bad pem");
        assert!(matches!(r, Err(Error::BackendInvocation(BackendError::Decode(_)))));
    }

    #[test]
    fn test_input_rejection() {
        assert!(Error::Integrity.is_input_rejection());
        assert!(Error::MalformedInput("x".into()).is_input_rejection());
        assert!(!Error::CapabilityUnavailable.is_input_rejection());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::from(Error::MalformedInput("short".to_string()));
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
        assert!(format!("{}", io_err).contains("short"));
    }
}
