// ── Frame codec ──
//
// One protocol frame = base64(aes(json)) + 0x04, sent as WebSocket text.
// The sentinel is what delimits frames: a single WebSocket message may
// carry a partial frame or several frames back to back, so inbound text
// goes through a `FrameAssembler` before decoding.

use base64::{engine::general_purpose, Engine as _};

use crate::crypto::SessionCipher;
use crate::envelope::Envelope;
use crate::error::ProtoError;

/// ASCII EOT, terminates every encrypted frame.
pub const END_OF_FRAME: u8 = 0x04;

/// Encrypt and encode an envelope into one wire frame.
pub fn encode_frame(cipher: &SessionCipher, envelope: &Envelope) -> Result<String, ProtoError> {
    let json = serde_json::to_vec(envelope)?;
    let mut frame = general_purpose::STANDARD.encode(cipher.encrypt(&json));
    frame.push(END_OF_FRAME as char);
    Ok(frame)
}

/// Decode one wire frame (with or without its trailing sentinel).
///
/// Returns `Ok(None)` for the keep-alive bodies the firmware emits: a
/// frame whose plaintext is empty or `{}` after zero-stripping carries
/// nothing and is dropped.
pub fn decode_frame(cipher: &SessionCipher, frame: &str) -> Result<Option<Envelope>, ProtoError> {
    let body = frame.strip_suffix(END_OF_FRAME as char).unwrap_or(frame);
    let ciphertext = general_purpose::STANDARD.decode(body)?;
    let plain = cipher.decrypt(&ciphertext)?;
    if plain.is_empty() || plain == b"{}" {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&plain)?))
}

/// Reassembles sentinel-delimited frames out of WebSocket text fragments.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: String,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one text fragment; returns every frame it completed, each
    /// still carrying its sentinel.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.buf.push_str(fragment);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.find(END_OF_FRAME as char) {
            frames.push(self.buf.drain(..=pos).collect());
        }
        frames
    }
}
