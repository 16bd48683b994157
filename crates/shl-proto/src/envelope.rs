// ── Frame envelope ──

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::MessageType;

/// `mc` value carried by handshake frames, before the counter starts.
pub const HANDSHAKE_MC: i64 = -1;

/// The JSON object inside every frame, in both directions.
///
/// `mc` is the sender's per-connection monotonic counter; acknowledgement
/// frames carry `ref` (the `mc` being acked) instead and never bump the
/// counter. Fields the firmware adds beyond these are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub type_int: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mc: Option<i64>,

    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub ack_ref: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Envelope {
    /// A counter-stamped request frame.
    pub fn numbered(ty: MessageType, mc: i64, payload: Value) -> Self {
        Self {
            type_int: ty.code(),
            mc: Some(mc),
            ack_ref: None,
            payload: Some(payload),
        }
    }

    /// A handshake frame (`mc = -1`).
    pub fn handshake(ty: MessageType, payload: Value) -> Self {
        Self::numbered(ty, HANDSHAKE_MC, payload)
    }

    /// An acknowledgement of the inbound frame numbered `of`.
    pub fn ack(of: i64) -> Self {
        Self {
            type_int: MessageType::Ack.code(),
            mc: None,
            ack_ref: Some(of),
            payload: None,
        }
    }

    /// The catalogue entry for `type_int`, if the code is known.
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_code(self.type_int)
    }

    /// Whether this frame is of the given type.
    pub fn is(&self, ty: MessageType) -> bool {
        self.type_int == ty.code()
    }

    /// The payload object, or `Null` when the frame carries none.
    pub fn payload(&self) -> &Value {
        self.payload.as_ref().unwrap_or(&Value::Null)
    }
}
