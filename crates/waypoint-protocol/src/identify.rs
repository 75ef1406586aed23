//! IDENTIFY request and response bodies.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, E_BAD_BODY};

/// The JSON body a producer sends immediately after the `IDENTIFY` command
/// line. Unknown fields are ignored.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct IdentifyRequest {
    #[serde(default)]
    pub broadcast_address: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub tcp_port: u16,
    #[serde(default)]
    pub http_port: u16,
    #[serde(default)]
    pub version: String,
}

impl IdentifyRequest {
    /// Decode a request from raw body bytes.
    ///
    /// # Errors
    ///
    /// Fatal `E_BAD_BODY` when the body is not valid JSON.
    pub fn decode(body: &[u8]) -> Result<Self, ClientError> {
        serde_json::from_slice(body).map_err(|_| {
            ClientError::fatal(E_BAD_BODY, "IDENTIFY failed to decode JSON body")
        })
    }

    /// Require `broadcast_address`, `tcp_port`, `http_port` and `version`.
    ///
    /// # Errors
    ///
    /// Fatal `E_BAD_BODY` when any required field is empty or zero.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.broadcast_address.is_empty()
            || self.tcp_port == 0
            || self.http_port == 0
            || self.version.is_empty()
        {
            return Err(ClientError::fatal(E_BAD_BODY, "IDENTIFY missing fields"));
        }
        Ok(())
    }
}

/// The JSON object returned on successful IDENTIFY, describing the lookup
/// service itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyResponse {
    pub tcp_port: u16,
    pub http_port: u16,
    pub version: String,
    pub broadcast_address: String,
    pub hostname: String,
}
