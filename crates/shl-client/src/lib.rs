//! Async client for SHL smart-home bridges.
//!
//! An SHL bridge exposes lights, shades, heaters, wall sensors, device
//! groups ("components") and heated rooms over an encrypted
//! JSON-over-WebSocket protocol. This crate drives the full session:
//! key exchange, salted login, token rotation, the framed transport
//! with its acknowledgement discipline, and a reactive catalogue of
//! everything the bridge knows about.
//!
//! The [`Bridge`] is the entry point. Its run loop reconnects forever;
//! entities survive reconnects, so a subscription taken once keeps
//! delivering state across session drops.
//!
//! # Quick start
//!
//! ```no_run
//! use shl_client::{Bridge, BridgeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bridge = Bridge::new(BridgeConfig::new("192.168.1.50", "my-auth-key"));
//!
//!     let runner = {
//!         let bridge = bridge.clone();
//!         tokio::spawn(async move { bridge.run().await })
//!     };
//!
//!     // Blocks until the bridge has delivered its full catalogue.
//!     for (id, device) in bridge.devices().await {
//!         println!("{id}: {}", device.name());
//!         if let Some(light) = device.as_light() {
//!             let mut states = light.subscribe();
//!             light.dim(50).await?;
//!             if let Some(state) = states.changed().await {
//!                 println!("now at {}", state.dimm_value);
//!             }
//!         }
//!     }
//!
//!     bridge.close().await;
//!     runner.await??;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Handshake**: capability exchange, RSA-wrapped AES key delivery,
//!   salted login, token renewal — a strict phase sequence.
//! - **Connection**: the framed transport; numbers outbound requests,
//!   acknowledges inbound ones, reassembles and decrypts frames.
//! - **Model**: per-entity observed state and command methods.
//! - **Bridge**: the supervisor; owns the catalogue, dispatches inbound
//!   payloads, reconnects on failure.
//!
//! Logging goes through [`tracing`]; install a subscriber to see it.

mod bridge;
mod config;
mod connection;
mod error;
mod handshake;
mod model;
mod store;
mod stream;

pub use bridge::{Bridge, BridgeState};
pub use config::BridgeConfig;
pub use error::Error;
pub use handshake::HandshakePhase;
pub use model::{
    Component, Device, DeviceInfo, GenericDevice, Heater, HeatingMode, Light, LightState,
    RcTouchSensor, RcTouchState, RctState, Room, RoomState, Shade,
};
pub use stream::{StateStream, StateWatchStream};

// The wire layer is a separate crate; re-export the pieces callers may
// want when poking at raw frames.
pub use shl_proto::{Envelope, MessageType};
