// ── Device domain types ──

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::warn;

use shl_proto::MessageType;

use super::link::CommandLink;
use crate::error::Error;
use crate::stream::StateStream;

/// Device-type codes the bridge firmware assigns.
mod dev_type {
    pub const LIGHT: i32 = 100;
    pub const DIMMABLE_LIGHT: i32 = 101;
    pub const SHADE: i32 = 102;
    pub const HEATER: i32 = 440;
    pub const RC_TOUCH: i32 = 450;
}

/// Identity fields shared by every device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Unique within one bridge.
    pub device_id: i64,
    pub name: String,
    /// Raw type code; decides which variant the device becomes.
    pub dev_type: i32,
    /// The component (device group) this device belongs to, if any.
    pub comp_id: Option<i64>,
}

impl DeviceInfo {
    fn from_catalogue(entry: &Value) -> Option<Self> {
        Some(Self {
            device_id: entry["deviceId"].as_i64()?,
            name: entry["name"].as_str().unwrap_or_default().to_owned(),
            dev_type: entry["devType"].as_i64().unwrap_or_default() as i32,
            comp_id: entry["compId"].as_i64(),
        })
    }
}

/// A device in the bridge's catalogue, classified by its type code.
///
/// Cheap to clone; all variants share their inner entity.
#[derive(Clone)]
pub enum Device {
    Light(Arc<Light>),
    Shade(Arc<Shade>),
    Heater(Arc<Heater>),
    RcTouch(Arc<RcTouchSensor>),
    Generic(Arc<GenericDevice>),
}

impl Device {
    /// Classify and construct a device from its inventory entry.
    pub(crate) fn from_catalogue(entry: &Value, link: CommandLink) -> Option<Self> {
        let info = DeviceInfo::from_catalogue(entry)?;
        Some(match info.dev_type {
            dev_type::LIGHT | dev_type::DIMMABLE_LIGHT => {
                let dimmable = entry["dimmable"].as_bool().unwrap_or(false);
                Self::Light(Arc::new(Light::new(info, dimmable, link)))
            }
            dev_type::SHADE => Self::Shade(Arc::new(Shade::new(info, link))),
            dev_type::HEATER => Self::Heater(Arc::new(Heater::new(info))),
            dev_type::RC_TOUCH => Self::RcTouch(Arc::new(RcTouchSensor::new(info))),
            _ => Self::Generic(Arc::new(GenericDevice::new(info))),
        })
    }

    fn info(&self) -> &DeviceInfo {
        match self {
            Self::Light(d) => &d.info,
            Self::Shade(d) => &d.info,
            Self::Heater(d) => &d.info,
            Self::RcTouch(d) => &d.info,
            Self::Generic(d) => &d.info,
        }
    }

    pub fn device_id(&self) -> i64 {
        self.info().device_id
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn dev_type(&self) -> i32 {
        self.info().dev_type
    }

    pub fn comp_id(&self) -> Option<i64> {
        self.info().comp_id
    }

    pub fn as_light(&self) -> Option<Arc<Light>> {
        match self {
            Self::Light(d) => Some(Arc::clone(d)),
            _ => None,
        }
    }

    pub fn as_shade(&self) -> Option<Arc<Shade>> {
        match self {
            Self::Shade(d) => Some(Arc::clone(d)),
            _ => None,
        }
    }

    pub fn as_heater(&self) -> Option<Arc<Heater>> {
        match self {
            Self::Heater(d) => Some(Arc::clone(d)),
            _ => None,
        }
    }

    pub fn as_rc_touch(&self) -> Option<Arc<RcTouchSensor>> {
        match self {
            Self::RcTouch(d) => Some(Arc::clone(d)),
            _ => None,
        }
    }

    /// Project an inbound state payload onto the device.
    pub(crate) fn apply_state(&self, payload: &Value) {
        match self {
            Self::Light(d) => d.apply_state(payload),
            Self::Shade(d) => d.apply_state(payload),
            Self::Heater(d) => d.apply_state(payload),
            Self::RcTouch(d) => d.apply_state(payload),
            Self::Generic(d) => d.apply_state(payload),
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Light(_) => "Light",
            Self::Shade(_) => "Shade",
            Self::Heater(_) => "Heater",
            Self::RcTouch(_) => "RcTouch",
            Self::Generic(_) => "Generic",
        };
        f.debug_struct("Device")
            .field("kind", &kind)
            .field("device_id", &self.device_id())
            .field("name", &self.name())
            .finish()
    }
}

// ── Light ────────────────────────────────────────────────────────────

/// Observed on/off state and brightness of a light.
///
/// `dimm_value` defaults to 99 whenever the bridge has not reported a
/// brightness: the protocol's "assume full brightness" convention,
/// which consumers should treat as max rather than a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightState {
    pub switch: bool,
    /// Brightness, 0–99.
    pub dimm_value: u8,
}

const DIMM_MAX: u8 = 99;

/// A switchable, optionally dimmable light.
pub struct Light {
    info: DeviceInfo,
    dimmable: bool,
    link: CommandLink,
    state: watch::Sender<Option<LightState>>,
}

impl Light {
    fn new(info: DeviceInfo, dimmable: bool, link: CommandLink) -> Self {
        let (state, _) = watch::channel(None);
        Self { info, dimmable, link, state }
    }

    pub fn device_id(&self) -> i64 {
        self.info.device_id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn dimmable(&self) -> bool {
        self.dimmable
    }

    /// Last observed state, if the bridge has reported one.
    pub fn state(&self) -> Option<LightState> {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> StateStream<LightState> {
        StateStream::new(self.state.subscribe())
    }

    /// Switch the light on or off.
    pub async fn switch(&self, on: bool) -> Result<(), Error> {
        self.link
            .send(
                MessageType::ActionSwitchDevice,
                json!({ "deviceId": self.info.device_id, "switch": on }),
            )
            .await
    }

    /// Set the brightness. Values outside 0–99 are clamped.
    pub async fn dim(&self, value: i32) -> Result<(), Error> {
        let value = value.clamp(0, DIMM_MAX as i32);
        self.link
            .send(
                MessageType::ActionSlideDevice,
                json!({ "deviceId": self.info.device_id, "dimmvalue": value }),
            )
            .await
    }

    pub(crate) fn apply_state(&self, payload: &Value) {
        let switch = payload["switch"].as_bool().unwrap_or(false);
        let dimm_value = if !self.dimmable {
            DIMM_MAX
        } else if switch {
            payload["dimmvalue"]
                .as_i64()
                .map(|v| v.clamp(0, DIMM_MAX as i64) as u8)
                .unwrap_or(DIMM_MAX)
        } else {
            // Off frames omit the brightness; keep what we knew so the
            // light comes back at the same level.
            self.state.borrow().map(|s| s.dimm_value).unwrap_or(DIMM_MAX)
        };
        self.state.send_replace(Some(LightState { switch, dimm_value }));
    }
}

// ── Shade ────────────────────────────────────────────────────────────

/// Motor commands a shade understands.
mod shading_state {
    pub const DOWN: i64 = 1;
    pub const STOP: i64 = 2;
    pub const UP: i64 = 3;
}

/// A motorised shade. Command-only: the bridge reports no structured
/// state for shades, so the raw payload is published as-is.
pub struct Shade {
    info: DeviceInfo,
    link: CommandLink,
    state: watch::Sender<Option<Value>>,
}

impl Shade {
    fn new(info: DeviceInfo, link: CommandLink) -> Self {
        let (state, _) = watch::channel(None);
        Self { info, link, state }
    }

    pub fn device_id(&self) -> i64 {
        self.info.device_id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Last raw payload the bridge sent for this shade.
    pub fn state(&self) -> Option<Value> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> StateStream<Value> {
        StateStream::new(self.state.subscribe())
    }

    pub async fn move_down(&self) -> Result<(), Error> {
        self.drive(shading_state::DOWN).await
    }

    pub async fn move_up(&self) -> Result<(), Error> {
        self.drive(shading_state::UP).await
    }

    pub async fn stop(&self) -> Result<(), Error> {
        self.drive(shading_state::STOP).await
    }

    async fn drive(&self, state: i64) -> Result<(), Error> {
        self.link
            .send(
                MessageType::SetDeviceShadingState,
                json!({ "deviceId": self.info.device_id, "state": state }),
            )
            .await
    }

    pub(crate) fn apply_state(&self, payload: &Value) {
        self.state.send_replace(Some(payload.clone()));
    }
}

// ── Heater ───────────────────────────────────────────────────────────

/// A heating actuator. Commanded through its [`Room`](super::Room), so
/// it only mirrors the raw payload.
pub struct Heater {
    info: DeviceInfo,
    state: watch::Sender<Option<Value>>,
}

impl Heater {
    fn new(info: DeviceInfo) -> Self {
        let (state, _) = watch::channel(None);
        Self { info, state }
    }

    pub fn device_id(&self) -> i64 {
        self.info.device_id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn state(&self) -> Option<Value> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> StateStream<Value> {
        StateStream::new(self.state.subscribe())
    }

    pub(crate) fn apply_state(&self, payload: &Value) {
        self.state.send_replace(Some(payload.clone()));
    }
}

// ── RcTouch ──────────────────────────────────────────────────────────

/// Observed readings of a wall-mounted temperature/humidity sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RcTouchState {
    pub temperature: f64,
    pub humidity: f64,
}

// Info-entry tags carrying the two readings.
const INFO_TEMPERATURE: &str = "1222";
const INFO_HUMIDITY: &str = "1223";

/// A wall-mounted temperature/humidity sensor.
pub struct RcTouchSensor {
    info: DeviceInfo,
    state: watch::Sender<Option<RcTouchState>>,
}

impl RcTouchSensor {
    fn new(info: DeviceInfo) -> Self {
        let (state, _) = watch::channel(None);
        Self { info, state }
    }

    pub fn device_id(&self) -> i64 {
        self.info.device_id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn state(&self) -> Option<RcTouchState> {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> StateStream<RcTouchState> {
        StateStream::new(self.state.subscribe())
    }

    pub(crate) fn apply_state(&self, payload: &Value) {
        let mut temperature = 0.0;
        let mut humidity = 0.0;

        match payload["info"].as_array() {
            Some(entries) => {
                for entry in entries {
                    // Readings arrive as numeric strings.
                    let value = entry["value"]
                        .as_str()
                        .and_then(|v| v.parse().ok())
                        .or_else(|| entry["value"].as_f64());
                    match entry["text"].as_str() {
                        Some(INFO_TEMPERATURE) => temperature = value.unwrap_or(0.0),
                        Some(INFO_HUMIDITY) => humidity = value.unwrap_or(0.0),
                        _ => {}
                    }
                }
            }
            None => warn!(device_id = self.info.device_id, "sensor payload without info array"),
        }

        self.state.send_replace(Some(RcTouchState { temperature, humidity }));
    }
}

// ── Generic ──────────────────────────────────────────────────────────

/// A device with a type code the client has no model for. Its raw
/// payloads are still published so callers can interpret them.
pub struct GenericDevice {
    info: DeviceInfo,
    state: watch::Sender<Option<Value>>,
}

impl GenericDevice {
    fn new(info: DeviceInfo) -> Self {
        let (state, _) = watch::channel(None);
        Self { info, state }
    }

    pub fn device_id(&self) -> i64 {
        self.info.device_id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn dev_type(&self) -> i32 {
        self.info.dev_type
    }

    pub fn state(&self) -> Option<Value> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> StateStream<Value> {
        StateStream::new(self.state.subscribe())
    }

    pub(crate) fn apply_state(&self, payload: &Value) {
        self.state.send_replace(Some(payload.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(dimmable: bool) -> Light {
        Light::new(
            DeviceInfo {
                device_id: 7,
                name: "Kitchen".into(),
                dev_type: if dimmable { 101 } else { 100 },
                comp_id: None,
            },
            dimmable,
            CommandLink::default(),
        )
    }

    #[test]
    fn dimmable_light_reads_brightness_when_on() {
        let light = light(true);
        light.apply_state(&json!({"switch": true, "dimmvalue": 50}));
        assert_eq!(light.state(), Some(LightState { switch: true, dimm_value: 50 }));
    }

    #[test]
    fn brightness_defaults_to_max_when_missing() {
        let light = light(true);
        light.apply_state(&json!({"switch": true}));
        assert_eq!(light.state(), Some(LightState { switch: true, dimm_value: 99 }));
    }

    #[test]
    fn off_frame_preserves_last_brightness() {
        let light = light(true);
        light.apply_state(&json!({"switch": true, "dimmvalue": 40}));
        light.apply_state(&json!({"switch": false}));
        assert_eq!(light.state(), Some(LightState { switch: false, dimm_value: 40 }));
    }

    #[test]
    fn off_frame_without_history_assumes_max() {
        let light = light(true);
        light.apply_state(&json!({"switch": false}));
        assert_eq!(light.state(), Some(LightState { switch: false, dimm_value: 99 }));
    }

    #[test]
    fn non_dimmable_light_pins_brightness() {
        let light = light(false);
        light.apply_state(&json!({"switch": true, "dimmvalue": 12}));
        assert_eq!(light.state(), Some(LightState { switch: true, dimm_value: 99 }));
    }

    #[test]
    fn out_of_range_reported_brightness_is_clamped() {
        let light = light(true);
        light.apply_state(&json!({"switch": true, "dimmvalue": 250}));
        assert_eq!(light.state().unwrap().dimm_value, 99);
    }

    #[test]
    fn rc_touch_reads_tagged_info_entries() {
        let sensor = RcTouchSensor::new(DeviceInfo {
            device_id: 9,
            name: "Hall".into(),
            dev_type: 450,
            comp_id: None,
        });
        sensor.apply_state(&json!({
            "info": [
                {"text": "1222", "value": "21.4"},
                {"text": "1223", "value": "48.0"},
                {"text": "9999", "value": "1.0"},
            ]
        }));
        assert_eq!(
            sensor.state(),
            Some(RcTouchState { temperature: 21.4, humidity: 48.0 })
        );
    }

    #[test]
    fn rc_touch_defaults_missing_readings_to_zero() {
        let sensor = RcTouchSensor::new(DeviceInfo {
            device_id: 9,
            name: "Hall".into(),
            dev_type: 450,
            comp_id: None,
        });
        sensor.apply_state(&json!({"info": [{"text": "1222", "value": "19.5"}]}));
        assert_eq!(
            sensor.state(),
            Some(RcTouchState { temperature: 19.5, humidity: 0.0 })
        );
    }

    #[test]
    fn factory_classifies_by_dev_type() {
        let link = CommandLink::default();
        let entries = [
            (json!({"deviceId": 1, "name": "a", "devType": 100}), "Light"),
            (json!({"deviceId": 2, "name": "b", "devType": 101}), "Light"),
            (json!({"deviceId": 3, "name": "c", "devType": 102}), "Shade"),
            (json!({"deviceId": 4, "name": "d", "devType": 440}), "Heater"),
            (json!({"deviceId": 5, "name": "e", "devType": 450}), "RcTouch"),
            (json!({"deviceId": 6, "name": "f", "devType": 7}), "Generic"),
        ];
        for (entry, expected) in entries {
            let device = Device::from_catalogue(&entry, link.clone()).unwrap();
            let kind = match device {
                Device::Light(_) => "Light",
                Device::Shade(_) => "Shade",
                Device::Heater(_) => "Heater",
                Device::RcTouch(_) => "RcTouch",
                Device::Generic(_) => "Generic",
            };
            assert_eq!(kind, expected);
        }
    }

    #[test]
    fn factory_rejects_entries_without_id() {
        assert!(Device::from_catalogue(&json!({"name": "x"}), CommandLink::default()).is_none());
    }
}
