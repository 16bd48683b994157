use thiserror::Error;

use crate::bridge::BridgeState;
use crate::handshake::HandshakePhase;

/// Top-level error type for the client.
///
/// Everything the run loop can retry stays internal (it logs and
/// reconnects); what surfaces here is either a handshake verdict from
/// the bridge, a dead transport, or caller misuse.
#[derive(Debug, Error)]
pub enum Error {
    // ── Handshake ───────────────────────────────────────────────────
    /// The bridge refused us outright (NACK on connect, or the hello
    /// was declined).
    #[error("bridge rejected the connection: {message}")]
    HandshakeRejected { message: String },

    /// The bridge broke the handshake sequence. Wrong credentials also
    /// land here: a failed login answers with anything but an accept.
    #[error("unexpected message type {got} while waiting for {phase}")]
    HandshakeProtocol { phase: HandshakePhase, got: i32 },

    // ── Transport ───────────────────────────────────────────────────
    /// The WebSocket connection could not be established.
    #[error("WebSocket connection failed: {0}")]
    Connect(String),

    /// The WebSocket failed mid-session.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// The socket closed while a handshake frame was still expected.
    #[error("connection closed by the bridge")]
    ConnectionClosed,

    /// A frame failed to encode, decrypt, or parse.
    #[error(transparent)]
    Proto(#[from] shl_proto::ProtoError),

    /// The configured host does not form a valid WebSocket URL.
    #[error("invalid bridge URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Lifecycle ───────────────────────────────────────────────────
    /// `run()` called while a run loop already exists.
    #[error("run() is only valid on an uninitialized bridge (currently {state:?})")]
    InvalidRunState { state: BridgeState },
}
