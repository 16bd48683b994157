// Scripted mock bridge: accepts WebSocket clients and walks the wire
// protocol from the server side, decrypting client frames so tests can
// assert on exact envelopes.

use std::collections::VecDeque;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use futures_util::{SinkExt, StreamExt};
use rsa::pkcs8::EncodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use shl_client::BridgeConfig;
use shl_proto::{codec, Envelope, FrameAssembler, SessionCipher};

pub const DEVICE_ID: &str = "dev-1";
pub const AUTH_KEY: &str = "key";
pub const CONNECTION_ID: i64 = 42;

pub struct MockBridge {
    listener: TcpListener,
    key: RsaPrivateKey,
}

impl MockBridge {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        // 1024-bit keeps key generation fast; the 99-byte secret fits.
        let key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 1024).unwrap();
        Self { listener, key }
    }

    /// A client config pointing at this mock, with a short reconnect
    /// delay so failure tests stay quick.
    pub fn config(&self) -> BridgeConfig {
        let addr = self.listener.local_addr().unwrap();
        let mut config = BridgeConfig::new(addr.ip().to_string(), AUTH_KEY);
        config.port = addr.port();
        config.reconnect_delay = Duration::from_millis(100);
        config
    }

    pub async fn accept(&self) -> Session {
        let (stream, _) = self.listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        Session {
            ws,
            cipher: None,
            assembler: FrameAssembler::new(),
            pending: VecDeque::new(),
            key: self.key.clone(),
        }
    }
}

pub struct Session {
    ws: WebSocketStream<TcpStream>,
    cipher: Option<SessionCipher>,
    assembler: FrameAssembler,
    pending: VecDeque<Envelope>,
    key: RsaPrivateKey,
}

impl Session {
    /// Send a frame, encrypted once the session cipher is agreed.
    pub async fn send(&mut self, frame: Value) {
        let envelope: Envelope = serde_json::from_value(frame).unwrap();
        let text = match &self.cipher {
            Some(cipher) => codec::encode_frame(cipher, &envelope).unwrap(),
            None => serde_json::to_string(&envelope).unwrap(),
        };
        self.ws.send(Message::Text(text)).await.unwrap();
    }

    /// Receive the next client envelope, decrypting if needed.
    pub async fn recv(&mut self) -> Envelope {
        loop {
            if let Some(envelope) = self.pending.pop_front() {
                return envelope;
            }
            let message = self
                .ws
                .next()
                .await
                .expect("client closed the connection")
                .unwrap();
            let Message::Text(text) = message else { continue };
            match &self.cipher {
                None => return serde_json::from_str(&text).unwrap(),
                Some(cipher) => {
                    for frame in self.assembler.push(&text) {
                        if let Some(envelope) = codec::decode_frame(cipher, &frame).unwrap() {
                            self.pending.push_back(envelope);
                        }
                    }
                }
            }
        }
    }

    /// Serve the whole handshake, returning every client frame received
    /// along the way (hello, key request, key delivery, login, token
    /// validations, renewal) for frame-order assertions.
    pub async fn serve_handshake(&mut self) -> Vec<Envelope> {
        let mut seen = Vec::new();

        // S0: greet with ids.
        self.send(json!({
            "type_int": 10,
            "payload": {"device_id": DEVICE_ID, "connection_id": CONNECTION_ID},
        }))
        .await;

        // S1: hello, acknowledged with an arbitrary frame.
        seen.push(self.recv().await);
        self.send(json!({"type_int": 1})).await;

        // S2: key request answered with our public key.
        seen.push(self.recv().await);
        let pem = self
            .key
            .to_public_key()
            .to_public_key_pem(Default::default())
            .unwrap();
        self.send(json!({"type_int": 15, "payload": {"public_key": pem}})).await;

        // S3: unwrap the client's key material, switch to encrypted.
        let key_frame = self.recv().await;
        let wrapped = general_purpose::STANDARD
            .decode(key_frame.payload()["secret"].as_str().unwrap())
            .unwrap();
        let secret =
            String::from_utf8(self.key.decrypt(Pkcs1v15Encrypt, &wrapped).unwrap()).unwrap();
        let (key_hex, iv_hex) = secret.split_once(":::").unwrap();
        self.cipher = Some(SessionCipher::from_parts(
            hex::decode(key_hex).unwrap().try_into().unwrap(),
            hex::decode(iv_hex).unwrap().try_into().unwrap(),
        ));
        seen.push(key_frame);
        self.send(json!({"type_int": 17})).await;

        // S4: login.
        seen.push(self.recv().await);
        self.send(json!({"type_int": 32, "payload": {"token": "T1"}})).await;

        // S5: first token validation.
        seen.push(self.recv().await);
        self.send(json!({"type_int": 35, "payload": {"ok": true}})).await;

        // S6: renewal.
        seen.push(self.recv().await);
        self.send(json!({"type_int": 38, "payload": {"token": "T2"}})).await;

        // S7: second validation.
        seen.push(self.recv().await);
        self.send(json!({"type_int": 35, "payload": {"ok": true}})).await;

        seen
    }

    /// Consume the three priming frames the pump sends after the
    /// handshake (session state, catalogue, login request).
    pub async fn drain_priming(&mut self) -> Vec<Envelope> {
        let mut frames = Vec::new();
        for _ in 0..3 {
            frames.push(self.recv().await);
        }
        frames
    }

    /// Shorthand: handshake plus priming.
    pub async fn serve_to_ready(&mut self) {
        self.serve_handshake().await;
        self.drain_priming().await;
    }
}

/// The standard test inventory: one dimmable light, one shade, one
/// comfort-mode room.
pub fn inventory(last_item: bool) -> Value {
    let mut payload = json!({
        "devices": [
            {"deviceId": 7, "name": "Kitchen", "devType": 100, "dimmable": true,
             "switch": true, "dimmvalue": 50, "compId": 0},
            {"deviceId": 8, "name": "Bedroom shade", "devType": 102},
        ],
        "comps": [],
        "rooms": [
            {"roomId": 3, "name": "Living room", "temp": 21.4, "setpoint": 22.0,
             "currentMode": 3, "state": 0, "modes": [{"mode": 3, "value": 22.0}]},
        ],
        "roomHeating": [],
    });
    if last_item {
        payload["lastItem"] = json!(true);
    }
    payload
}
