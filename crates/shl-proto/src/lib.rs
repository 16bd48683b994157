//! Wire protocol for SHL smart-home bridges.
//!
//! This crate covers everything below the connection layer and above the
//! socket: the numeric message-type catalogue, the JSON envelope every
//! frame carries, the AES/RSA session crypto, and the base64 + sentinel
//! frame codec. It performs no I/O; `shl-client` drives it against a
//! live WebSocket.
//!
//! Frames on the wire (after the key exchange) look like
//!
//! ```text
//! base64( aes256cbc( {"type_int": 170, "mc": 7, "payload": {...}} ) ) 0x04
//! ```
//!
//! where `0x04` (ASCII EOT) terminates the frame inside the WebSocket
//! text message.

pub mod codec;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod message;

pub use codec::{FrameAssembler, END_OF_FRAME};
pub use crypto::{generate_salt, password_hash, SessionCipher};
pub use envelope::{Envelope, HANDSHAKE_MC};
pub use error::ProtoError;
pub use message::MessageType;
