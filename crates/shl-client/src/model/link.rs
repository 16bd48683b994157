use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::trace;

use shl_proto::MessageType;

use crate::connection::SecureConnection;
use crate::error::Error;

/// Non-owning path from an entity back to the live connection.
///
/// The bridge owns its entities; entities must never own the bridge or
/// the socket. They hold this cloneable link instead, and the
/// supervisor points it at the current connection on every
/// (re)connect. Commands issued while the slot is empty are dropped.
#[derive(Clone, Default)]
pub(crate) struct CommandLink {
    slot: Arc<Mutex<Option<Arc<SecureConnection>>>>,
}

impl CommandLink {
    pub(crate) async fn install(&self, conn: Arc<SecureConnection>) {
        *self.slot.lock().await = Some(conn);
    }

    pub(crate) async fn clear(&self) {
        *self.slot.lock().await = None;
    }

    pub(crate) async fn current(&self) -> Option<Arc<SecureConnection>> {
        self.slot.lock().await.clone()
    }

    /// Send a command frame through the current connection, or drop it
    /// silently when none exists.
    pub(crate) async fn send(&self, ty: MessageType, payload: Value) -> Result<(), Error> {
        match self.current().await {
            Some(conn) => conn.send_message(ty, payload).await,
            None => {
                trace!(r#type = %ty, "no connection, command dropped");
                Ok(())
            }
        }
    }
}
