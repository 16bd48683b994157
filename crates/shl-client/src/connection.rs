//! The framed, encrypted transport over one WebSocket connection.
//!
//! A [`SecureConnection`] owns the socket halves, the session cipher,
//! and the outbound message counter. The counter and the write half
//! live behind a single mutex: incrementing `mc` and sending the frame
//! it stamps must be atomic, or concurrent command callers could put
//! frames on the wire out of counter order.

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use shl_proto::{codec, Envelope, FrameAssembler, MessageType, SessionCipher};

use crate::error::Error;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const FRAME_CHANNEL_CAPACITY: usize = 256;

/// An established, encrypted session with the bridge.
#[derive(Debug)]
pub(crate) struct SecureConnection {
    device_id: String,
    cipher: SessionCipher,
    writer: Mutex<FrameWriter>,
    reader: Mutex<Option<SplitStream<WsStream>>>,
    frame_tx: broadcast::Sender<Arc<Envelope>>,
}

#[derive(Debug)]
struct FrameWriter {
    sink: SplitSink<WsStream, Message>,
    mc: i64,
}

impl SecureConnection {
    pub(crate) fn new(stream: WsStream, cipher: SessionCipher, device_id: String) -> Self {
        let (sink, reader) = stream.split();
        let (frame_tx, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        Self {
            device_id,
            cipher,
            writer: Mutex::new(FrameWriter { sink, mc: 0 }),
            reader: Mutex::new(Some(reader)),
            frame_tx,
        }
    }

    /// The bridge-assigned device id from the handshake greeting.
    pub(crate) fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Subscribe to inbound envelopes that carry a payload.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Arc<Envelope>> {
        self.frame_tx.subscribe()
    }

    /// Send a counter-stamped request frame.
    pub(crate) async fn send_message(&self, ty: MessageType, payload: Value) -> Result<(), Error> {
        let mut writer = self.writer.lock().await;
        writer.mc += 1;
        let envelope = Envelope::numbered(ty, writer.mc, payload);
        let frame = codec::encode_frame(&self.cipher, &envelope)?;
        trace!(r#type = %ty, mc = writer.mc, "sending frame");
        writer.sink.send(Message::Text(frame)).await?;
        Ok(())
    }

    /// Send a frame without touching the counter (acknowledgements).
    pub(crate) async fn send_raw(&self, envelope: &Envelope) -> Result<(), Error> {
        let frame = codec::encode_frame(&self.cipher, envelope)?;
        self.writer.lock().await.sink.send(Message::Text(frame)).await?;
        Ok(())
    }

    /// Best-effort graceful close.
    pub(crate) async fn close(&self) {
        let close = Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        }));
        let _ = self.writer.lock().await.sink.send(close).await;
    }

    /// Drive the receive loop until the socket closes, fails, or the
    /// token fires.
    ///
    /// On entry the session is primed: the bridge is asked for its
    /// session state and full catalogue, then for the login-gated push
    /// stream. These are the first numbered frames of the connection.
    pub(crate) async fn pump(&self, cancel: &CancellationToken) -> Result<(), Error> {
        for ty in [
            MessageType::QuerySessionState,
            MessageType::QueryCatalogue,
            MessageType::LoginRequest,
        ] {
            self.send_message(ty, serde_json::json!({})).await?;
        }

        let Some(mut reader) = self.reader.lock().await.take() else {
            debug!("receive half already consumed, pump is a no-op");
            return Ok(());
        };

        let mut assembler = FrameAssembler::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.close().await;
                    return Ok(());
                }
                message = reader.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            for frame in assembler.push(&text) {
                                self.handle_frame(&frame).await?;
                            }
                        }
                        Some(Ok(Message::Ping(_))) => {
                            // tungstenite answers pongs on its own
                            trace!("ping");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            match frame {
                                Some(f) => debug!(code = %f.code, reason = %f.reason, "close frame from bridge"),
                                None => debug!("close frame from bridge"),
                            }
                            self.close().await;
                            return Ok(());
                        }
                        Some(Ok(_)) => {} // Binary, Pong, Frame
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            debug!("socket stream ended");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    async fn handle_frame(&self, frame: &str) -> Result<(), Error> {
        let Some(envelope) = codec::decode_frame(&self.cipher, frame)? else {
            return Ok(());
        };

        // Ack before anything else: the bridge holds back its push
        // stream until numbered frames are confirmed.
        if let Some(mc) = envelope.mc {
            self.send_raw(&Envelope::ack(mc)).await?;
        }

        if envelope.payload.is_some() {
            // A send error only means nobody is subscribed right now.
            let _ = self.frame_tx.send(Arc::new(envelope));
        } else {
            trace!(type_int = envelope.type_int, "frame without payload, not dispatched");
        }
        Ok(())
    }
}
