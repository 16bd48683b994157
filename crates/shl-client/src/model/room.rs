// ── Room (heated zone) domain types ──

use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::debug;

use shl_proto::MessageType;

use super::link::CommandLink;
use crate::error::Error;
use crate::stream::StateStream;

/// Heating mode of a room. Each mode has its own admissible setpoint
/// range and its own remembered target temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeatingMode {
    Cool,
    Eco,
    Comfort,
}

impl HeatingMode {
    pub(crate) fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Cool),
            2 => Some(Self::Eco),
            3 => Some(Self::Comfort),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Cool => 1,
            Self::Eco => 2,
            Self::Comfort => 3,
        }
    }

    /// Admissible setpoint range for this mode, in °C.
    pub fn setpoint_range(self) -> (f64, f64) {
        match self {
            Self::Cool => (5.0, 20.0),
            Self::Eco => (10.0, 30.0),
            Self::Comfort => (18.0, 40.0),
        }
    }

    pub(crate) fn clamp_setpoint(self, setpoint: f64) -> f64 {
        let (lo, hi) = self.setpoint_range();
        setpoint.clamp(lo, hi)
    }
}

/// Whether the room's heating is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RctState {
    Idle,
    Active,
}

impl RctState {
    pub(crate) fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Idle),
            2 => Some(Self::Active),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Idle => 0,
            Self::Active => 2,
        }
    }
}

/// Observed heating state of a room.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomState {
    pub setpoint: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    /// Current heating power output.
    pub power: f64,
    pub mode: HeatingMode,
    pub rct_state: RctState,
}

/// Fallback target when switching to a mode the bridge has never
/// reported a setpoint for.
const DEFAULT_SETPOINT: f64 = 20.0;

/// A heated zone with a mode, a setpoint, and per-mode setpoint memory.
pub struct Room {
    room_id: i64,
    name: String,
    link: CommandLink,
    state: watch::Sender<Option<RoomState>>,
    // Remembered target per mode, fed by the bridge's `modes` array and
    // by our own commands. Survives state replacement and reconnects.
    mode_setpoints: DashMap<HeatingMode, f64>,
}

impl Room {
    pub(crate) fn new(room_id: i64, name: String, link: CommandLink) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            room_id,
            name,
            link,
            state,
            mode_setpoints: DashMap::new(),
        }
    }

    pub fn room_id(&self) -> i64 {
        self.room_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last observed state, if the bridge has reported one.
    pub fn state(&self) -> Option<RoomState> {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> StateStream<RoomState> {
        StateStream::new(self.state.subscribe())
    }

    /// The remembered target temperature for a mode.
    pub fn setpoint_for(&self, mode: HeatingMode) -> Option<f64> {
        self.mode_setpoints.get(&mode).map(|v| *v)
    }

    /// Project an inbound heating payload.
    ///
    /// The observed state is replaced wholesale -- the bridge resends
    /// the full picture -- but the per-mode setpoint memory only ever
    /// accumulates.
    pub(crate) fn apply_state(&self, payload: &Value) {
        if let Some(modes) = payload["modes"].as_array() {
            for entry in modes {
                let mode = entry["mode"].as_i64().and_then(HeatingMode::from_code);
                if let (Some(mode), Some(value)) = (mode, entry["value"].as_f64()) {
                    self.mode_setpoints.insert(mode, value);
                }
            }
        }

        let mode = payload["currentMode"]
            .as_i64()
            .or_else(|| payload["mode"].as_i64())
            .and_then(HeatingMode::from_code)
            .unwrap_or(HeatingMode::Eco);
        let rct_state = payload["state"]
            .as_i64()
            .and_then(RctState::from_code)
            .unwrap_or(RctState::Idle);

        self.state.send_replace(Some(RoomState {
            setpoint: payload["setpoint"].as_f64(),
            temperature: payload["temp"].as_f64(),
            humidity: payload["humidity"].as_f64(),
            power: payload["power"].as_f64().unwrap_or(0.0),
            mode,
            rct_state,
        }));
    }

    /// Set the target temperature for the active mode.
    ///
    /// The value is clamped to the mode's admissible range and
    /// remembered for that mode. Dropped with a log until the bridge
    /// has reported a state to act on.
    pub async fn set_target_temperature(&self, setpoint: f64) -> Result<(), Error> {
        let Some(current) = self.state() else {
            debug!(room_id = self.room_id, "no observed state, setpoint command dropped");
            return Ok(());
        };
        let setpoint = current.mode.clamp_setpoint(setpoint);
        self.mode_setpoints.insert(current.mode, setpoint);
        self.send_heating(current.mode, current.rct_state, setpoint).await
    }

    /// Switch the heating mode, restoring that mode's remembered
    /// setpoint. Dropped with a log until a state has been observed.
    pub async fn set_mode(&self, mode: HeatingMode) -> Result<(), Error> {
        let Some(current) = self.state() else {
            debug!(room_id = self.room_id, "no observed state, mode command dropped");
            return Ok(());
        };
        let setpoint = self.setpoint_for(mode).unwrap_or(DEFAULT_SETPOINT);
        self.send_heating(mode, current.rct_state, setpoint).await
    }

    async fn send_heating(
        &self,
        mode: HeatingMode,
        rct_state: RctState,
        setpoint: f64,
    ) -> Result<(), Error> {
        self.link
            .send(
                MessageType::SetHeatingState,
                json!({
                    "roomId": self.room_id,
                    "mode": mode.code(),
                    "state": rct_state.code(),
                    "setpoint": setpoint,
                    "confirmed": false,
                }),
            )
            .await
    }
}
