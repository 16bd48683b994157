// ── Domain model ──
//
// One type per entity kind the bridge manages. Entities are created by
// the catalogue when the bridge first mentions an id and live for the
// rest of the `Bridge`'s life; their observed state flows through
// replay-latest `watch` channels, and their command methods go back out
// through a non-owning link to the current connection.

mod component;
mod device;
pub(crate) mod link;
mod room;

pub use component::Component;
pub use device::{
    Device, DeviceInfo, GenericDevice, Heater, Light, LightState, RcTouchSensor, RcTouchState,
    Shade,
};
pub use room::{HeatingMode, RctState, Room, RoomState};
