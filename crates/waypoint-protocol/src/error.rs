//! Client-facing protocol errors.
//!
//! Every error carries a wire code and a human-readable description; the
//! framed payload sent to the client is `<CODE> <description>`. Fatal errors
//! close the connection after the reply is flushed; recoverable errors let
//! the command loop continue. No command currently produces a recoverable
//! error, but the class is part of the protocol contract.

use thiserror::Error;

/// Unknown command, wrong connection state, or insufficient parameters.
pub const E_INVALID: &str = "E_INVALID";
/// IDENTIFY body could not be read, decoded, or validated.
pub const E_BAD_BODY: &str = "E_BAD_BODY";
/// Topic name failed validation.
pub const E_BAD_TOPIC: &str = "E_BAD_TOPIC";
/// Channel name failed validation.
pub const E_BAD_CHANNEL: &str = "E_BAD_CHANNEL";

/// An error reported to a client over the TCP protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} {description}")]
pub struct ClientError {
    code: &'static str,
    description: String,
    fatal: bool,
}

impl ClientError {
    /// An error that closes the connection after the reply is sent.
    #[must_use]
    pub fn fatal(code: &'static str, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            fatal: true,
        }
    }

    /// An error the command loop survives.
    #[must_use]
    pub fn recoverable(code: &'static str, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            fatal: false,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_payload_format() {
        let err = ClientError::fatal(E_INVALID, "invalid command FOO");
        assert_eq!(err.to_string(), "E_INVALID invalid command FOO");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_recoverable_class() {
        let err = ClientError::recoverable(E_BAD_BODY, "try again");
        assert!(!err.is_fatal());
        assert_eq!(err.code(), E_BAD_BODY);
    }
}
