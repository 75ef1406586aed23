//! # waypoint-protocol
//!
//! Wire protocol for the waypoint lookup service's producer-facing TCP port.
//!
//! The protocol is line-oriented: producers send `\n`-terminated command
//! lines (`PING`, `IDENTIFY`, `REGISTER`, `UNREGISTER`). IDENTIFY is followed
//! by a length-prefixed JSON body; every response travels as a 4-byte
//! big-endian length prefix plus payload. Errors are framed the same way,
//! carrying `<CODE> <text>`, and fatal ones close the connection.
//!
//! ## Example
//!
//! ```rust
//! use waypoint_protocol::codec;
//!
//! let framed = codec::encode_frame(b"OK");
//! assert_eq!(&framed[..4], &2i32.to_be_bytes());
//! ```

pub mod codec;
pub mod command;
pub mod error;
pub mod identify;
pub mod names;

pub use codec::{encode_frame, read_frame, write_frame, FrameError};
pub use command::{get_topic_channel, split_command_line};
pub use error::{ClientError, E_BAD_BODY, E_BAD_CHANNEL, E_BAD_TOPIC, E_INVALID};
pub use identify::{IdentifyRequest, IdentifyResponse};
