//! The bridge supervisor: lifecycle, reconnect loop, and dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shl_proto::{Envelope, MessageType};

use crate::config::BridgeConfig;
use crate::error::Error;
use crate::handshake;
use crate::model::link::CommandLink;
use crate::model::{Component, Device, Room};
use crate::store::Catalogue;

/// Lifecycle of a bridge client, observable via [`Bridge::state`].
///
/// `Ready` is entered once the first full inventory has been processed
/// and, once reached, survives reconnects -- the catalogue is retained
/// and refreshed in place. Only [`Bridge::close`] leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    Initializing,
    Ready,
    Closing,
}

/// Client for one SHL bridge.
///
/// Owns the entity catalogue and the connection lifecycle. Cheap to
/// clone; all methods are safe to call from any task while
/// [`run`](Self::run) is executing.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    catalogue: Catalogue,
    link: CommandLink,
    state: watch::Sender<BridgeState>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        let link = CommandLink::default();
        let (state, _) = watch::channel(BridgeState::Uninitialized);
        Self {
            inner: Arc::new(BridgeInner {
                config,
                catalogue: Catalogue::new(link.clone()),
                link,
                state,
                cancel: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to lifecycle state changes.
    pub fn state(&self) -> watch::Receiver<BridgeState> {
        self.inner.state.subscribe()
    }

    /// Connect and keep the session alive until [`close`](Self::close).
    ///
    /// Reconnects indefinitely: every failed session is logged and
    /// retried after [`BridgeConfig::reconnect_delay`]. At most one run
    /// loop may exist per bridge -- calling this while one is active
    /// (or shutting down) fails with [`Error::InvalidRunState`].
    pub async fn run(&self) -> Result<(), Error> {
        let mut previous = BridgeState::Uninitialized;
        let started = self.inner.state.send_if_modified(|state| {
            previous = *state;
            if *state == BridgeState::Uninitialized {
                *state = BridgeState::Initializing;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(Error::InvalidRunState { state: previous });
        }

        let cancel = CancellationToken::new();
        *self.inner.cancel.lock().await = Some(cancel.clone());

        info!(host = %self.inner.config.host, "run loop starting");
        while !cancel.is_cancelled() && *self.inner.state.borrow() != BridgeState::Closing {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Ok(()),
                result = self.session(&cancel) => result,
            };
            match outcome {
                Ok(()) => debug!("session ended, reconnecting"),
                Err(e) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    warn!(error = %e, "session failed, reconnecting");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.inner.config.reconnect_delay) => {}
                    }
                }
            }
        }

        self.inner.link.clear().await;
        *self.inner.cancel.lock().await = None;
        self.inner.state.send_replace(BridgeState::Uninitialized);
        debug!("run loop exited");
        Ok(())
    }

    /// One connection lifetime: handshake, install, dispatch and pump.
    async fn session(&self, cancel: &CancellationToken) -> Result<(), Error> {
        let conn = Arc::new(handshake::establish(&self.inner.config).await?);
        debug!(device_id = conn.device_id(), "session established");
        let mut frames = conn.subscribe();
        self.inner.link.install(Arc::clone(&conn)).await;

        // Pump and dispatcher share this task; the pump owns the
        // socket, the dispatcher drains the broadcast queue. The pump
        // side always finishes first -- the frame sender lives inside
        // the connection it borrows.
        let result = tokio::select! {
            result = conn.pump(cancel) => result,
            _ = self.dispatch_loop(&mut frames) => Ok(()),
        };

        self.inner.link.clear().await;
        result
    }

    async fn dispatch_loop(&self, frames: &mut broadcast::Receiver<Arc<Envelope>>) {
        loop {
            match frames.recv().await {
                Ok(envelope) => self.dispatch(&envelope),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "dispatcher lagged, frames dropped")
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    /// Route one inbound envelope into the catalogue. Per-payload
    /// problems are logged and swallowed; nothing here may kill the
    /// pump.
    fn dispatch(&self, envelope: &Envelope) {
        let payload = envelope.payload();
        match envelope.message_type() {
            Some(MessageType::SetDeviceState) => {
                self.inner.catalogue.apply_device_state(payload);
            }
            Some(MessageType::SetStateInfo) => match payload["item"].as_array() {
                Some(items) => {
                    for item in items {
                        self.inner.catalogue.apply_state_info_item(item);
                    }
                }
                None => debug!("state info frame without item array"),
            },
            Some(MessageType::SetAllData) => {
                self.inner.catalogue.apply_all_data(payload);
                if !payload["lastItem"].is_null() {
                    let became_ready = self.inner.state.send_if_modified(|state| {
                        if *state == BridgeState::Initializing {
                            *state = BridgeState::Ready;
                            true
                        } else {
                            false
                        }
                    });
                    if became_ready {
                        info!("catalogue complete, bridge ready");
                    }
                }
            }
            _ => debug!(type_int = envelope.type_int, "unhandled message type"),
        }
    }

    /// Resolve once the first full inventory has been processed.
    pub async fn wait_for_initialization(&self) {
        let mut state = self.inner.state.subscribe();
        while *state.borrow_and_update() != BridgeState::Ready {
            if state.changed().await.is_err() {
                return;
            }
        }
    }

    // ── Catalogue access ─────────────────────────────────────────────

    /// All known devices, keyed by device id. Waits for initialization.
    pub async fn devices(&self) -> HashMap<i64, Device> {
        self.wait_for_initialization().await;
        self.inner.catalogue.devices()
    }

    /// All known rooms, keyed by room id. Waits for initialization.
    pub async fn rooms(&self) -> HashMap<i64, Arc<Room>> {
        self.wait_for_initialization().await;
        self.inner.catalogue.rooms()
    }

    /// All known components, keyed by component id. Waits for
    /// initialization.
    pub async fn components(&self) -> HashMap<i64, Arc<Component>> {
        self.wait_for_initialization().await;
        self.inner.catalogue.components()
    }

    /// Look up one device without waiting.
    pub fn device(&self, id: i64) -> Option<Device> {
        self.inner.catalogue.device(id)
    }

    /// Look up one room without waiting.
    pub fn room(&self, id: i64) -> Option<Arc<Room>> {
        self.inner.catalogue.room(id)
    }

    /// Look up one component without waiting.
    pub fn component(&self, id: i64) -> Option<Arc<Component>> {
        self.inner.catalogue.component(id)
    }

    /// Shut down: cancel the run loop and close the socket gracefully.
    ///
    /// Entity publishers are left open -- subscribers keep the last
    /// value. A closed bridge returns to `Uninitialized` once the run
    /// loop unwinds and may be run again.
    pub async fn close(&self) {
        if *self.inner.state.borrow() == BridgeState::Uninitialized {
            return;
        }
        self.inner.state.send_replace(BridgeState::Closing);
        if let Some(cancel) = self.inner.cancel.lock().await.take() {
            cancel.cancel();
        }
        if let Some(conn) = self.inner.link.current().await {
            conn.close().await;
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("host", &self.inner.config.host)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}
