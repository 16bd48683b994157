//! Session establishment.
//!
//! The bridge speaks first, then the client walks a fixed sequence:
//! introduce itself, request the RSA public key, deliver freshly
//! generated AES key material under that key, log in with a salted
//! hash, and rotate the session token. Every await point is a
//! [`HandshakePhase`]; a frame of the wrong type at any of them is a
//! protocol error, and the two refusal frames (NACK, declined hello)
//! carry the bridge's own message.
//!
//! Frames up to the key delivery are plaintext JSON; everything after
//! it is encrypted with the just-agreed session cipher. None of them
//! touch the message counter -- the first numbered frame belongs to
//! the pump.

use futures_util::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use shl_proto::{codec, crypto, Envelope, MessageType, SessionCipher};

use crate::config::BridgeConfig;
use crate::connection::{SecureConnection, WsStream};
use crate::error::Error;

// Fixed identifiers the firmware expects from an app client.
const CLIENT_TYPE: &str = "shl-app";
const CLIENT_ID: &str = "c956e43f999f8004";
const CLIENT_VERSION: &str = "3.0.0";

const LOGIN_USERNAME: &str = "default";

/// The await point at which a handshake frame arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Waiting for the bridge's first frame (device and connection ids).
    Greeting,
    /// Waiting for the RSA public key.
    KeyExchange,
    /// Waiting for the first encrypted frame.
    SecureReady,
    /// Waiting for the login verdict.
    Login,
    /// Waiting for the renewed token.
    TokenRenewal,
}

impl std::fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Greeting => "greeting",
            Self::KeyExchange => "key exchange",
            Self::SecureReady => "secure ready",
            Self::Login => "login",
            Self::TokenRenewal => "token renewal",
        };
        f.write_str(name)
    }
}

/// Run the whole handshake against a fresh socket, yielding a ready
/// [`SecureConnection`].
pub(crate) async fn establish(config: &BridgeConfig) -> Result<SecureConnection, Error> {
    let url = config.url()?;
    debug!(url = %url, "connecting");
    let (mut ws, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::Connect(e.to_string()))?;

    // S0 -- the bridge greets with our device id and a connection id.
    let greeting = read_plain(&mut ws).await?;
    if greeting.is(MessageType::Nack) {
        return Err(rejected(&greeting, "info"));
    }
    let device_id = greeting.payload()["device_id"]
        .as_str()
        .map(str::to_owned)
        .ok_or(Error::HandshakeProtocol {
            phase: HandshakePhase::Greeting,
            got: greeting.type_int,
        })?;
    let connection_id = greeting.payload()["connection_id"].as_i64().unwrap_or_default();

    // S1 -- introduce ourselves; the bridge either declines or moves on.
    let hello = Envelope::handshake(
        MessageType::ConnectionHello,
        json!({
            "client_type": CLIENT_TYPE,
            "client_id": CLIENT_ID,
            "client_version": CLIENT_VERSION,
            "connection_id": connection_id,
        }),
    );
    send_plain(&mut ws, &hello).await?;
    let reply = read_plain(&mut ws).await?;
    if reply.is(MessageType::ConnectionDeclined) {
        return Err(rejected(&reply, "error_message"));
    }

    // S2 -- ask for the RSA public key. Only the key matters, not the
    // frame type it rides in on.
    send_plain(&mut ws, &Envelope::handshake(MessageType::SecureInit, json!({}))).await?;
    let key_frame = read_plain(&mut ws).await?;
    let pem = key_frame.payload()["public_key"]
        .as_str()
        .ok_or(Error::HandshakeProtocol {
            phase: HandshakePhase::KeyExchange,
            got: key_frame.type_int,
        })?
        .to_owned();

    // S3 -- deliver fresh key material; everything after this frame is
    // encrypted in both directions.
    let cipher = SessionCipher::generate();
    let secret = cipher.wrap_for(&pem)?;
    send_plain(
        &mut ws,
        &Envelope::handshake(MessageType::SecureKey, json!({ "secret": secret })),
    )
    .await?;
    let ready = read_secure(&mut ws, &cipher).await?;
    if !ready.is(MessageType::SecureReady) {
        return Err(Error::HandshakeProtocol {
            phase: HandshakePhase::SecureReady,
            got: ready.type_int,
        });
    }

    // S4 -- salted login. A wrong auth key answers with anything but an
    // accept frame.
    let salt = crypto::generate_salt();
    let password = crypto::password_hash(&device_id, config.auth_key.expose_secret(), &salt);
    let login = Envelope::handshake(
        MessageType::LoginSubmit,
        json!({ "username": LOGIN_USERNAME, "password": password, "salt": salt }),
    );
    send_secure(&mut ws, &cipher, &login).await?;
    let accept = read_secure(&mut ws, &cipher).await?;
    if !accept.is(MessageType::LoginAccept) {
        return Err(Error::HandshakeProtocol {
            phase: HandshakePhase::Login,
            got: accept.type_int,
        });
    }
    let token = accept.payload()["token"].as_str().unwrap_or_default().to_owned();

    // S5 -- confirm the token; the bridge's answer is not inspected.
    send_token(&mut ws, &cipher, MessageType::TokenValidate, &token).await?;
    let _ = read_secure(&mut ws, &cipher).await?;

    // S6 -- rotate it.
    send_token(&mut ws, &cipher, MessageType::TokenRenew, &token).await?;
    let renewed = read_secure(&mut ws, &cipher).await?;
    if !renewed.is(MessageType::TokenRenewed) {
        return Err(Error::HandshakeProtocol {
            phase: HandshakePhase::TokenRenewal,
            got: renewed.type_int,
        });
    }
    let token = renewed.payload()["token"].as_str().unwrap_or_default().to_owned();

    // S7 -- confirm the rotation.
    send_token(&mut ws, &cipher, MessageType::TokenValidate, &token).await?;
    let _ = read_secure(&mut ws, &cipher).await?;

    Ok(SecureConnection::new(ws, cipher, device_id))
}

// ── Frame helpers ────────────────────────────────────────────────────

fn rejected(envelope: &Envelope, key: &str) -> Error {
    let message = envelope.payload()[key]
        .as_str()
        .unwrap_or("bridge gave no reason")
        .to_owned();
    Error::HandshakeRejected { message }
}

async fn next_text(ws: &mut WsStream) -> Result<String, Error> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text),
            Some(Ok(Message::Close(_))) | None => return Err(Error::ConnectionClosed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

async fn read_plain(ws: &mut WsStream) -> Result<Envelope, Error> {
    let text = next_text(ws).await?;
    let envelope = serde_json::from_str(&text).map_err(shl_proto::ProtoError::from)?;
    Ok(envelope)
}

async fn read_secure(ws: &mut WsStream, cipher: &SessionCipher) -> Result<Envelope, Error> {
    loop {
        let text = next_text(ws).await?;
        if let Some(envelope) = codec::decode_frame(cipher, &text)? {
            return Ok(envelope);
        }
    }
}

async fn send_plain(ws: &mut WsStream, envelope: &Envelope) -> Result<(), Error> {
    let text = serde_json::to_string(envelope).map_err(shl_proto::ProtoError::from)?;
    ws.send(Message::Text(text)).await?;
    Ok(())
}

async fn send_secure(
    ws: &mut WsStream,
    cipher: &SessionCipher,
    envelope: &Envelope,
) -> Result<(), Error> {
    ws.send(Message::Text(codec::encode_frame(cipher, envelope)?)).await?;
    Ok(())
}

async fn send_token(
    ws: &mut WsStream,
    cipher: &SessionCipher,
    ty: MessageType,
    token: &str,
) -> Result<(), Error> {
    send_secure(ws, cipher, &Envelope::handshake(ty, json!({ "token": token }))).await
}
