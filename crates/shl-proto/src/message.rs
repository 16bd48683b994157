// ── Protocol message catalogue ──
//
// Every frame carries a numeric `type_int`; this is the full set of
// codes the bridge firmware is known to emit or accept. Only a subset
// drives client behavior — the rest are named so logs stay readable.
// Codes outside the catalogue are tolerated on receive and logged as
// unhandled, never treated as fatal.

/// Declares the catalogue once, keeping the code ↔ variant mapping in a
/// single place for both directions.
macro_rules! message_types {
    ($($(#[$meta:meta])* $name:ident = $code:literal,)+) => {
        /// Symbolic name for a numeric protocol message type.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        #[non_exhaustive]
        pub enum MessageType {
            $($(#[$meta])* $name = $code,)+
        }

        impl MessageType {
            /// Look up the symbolic name for a wire code.
            ///
            /// Returns `None` for codes the catalogue does not know;
            /// callers must treat those as unhandled, not as errors.
            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $($code => Some(Self::$name),)+
                    _ => None,
                }
            }
        }
    };
}

message_types! {
    // ── Core ────────────────────────────────────────────────────────
    /// Acknowledges a numbered frame; carries `ref` instead of `mc`.
    Ack = 1,
    /// Asks the bridge to start pushing login-gated data.
    LoginRequest = 2,
    /// Negative acknowledgement; `info` carries the reason.
    Nack = 3,
    Ping = 4,
    Pong = 5,

    // ── Connection & key exchange ───────────────────────────────────
    /// First frame on a fresh socket; carries `device_id` and
    /// `connection_id`.
    ConnectionStart = 10,
    /// Client introduction (`client_type`, `client_id`, version).
    ConnectionHello = 11,
    /// Bridge refused the introduction; `payload.error_message` says why.
    ConnectionDeclined = 12,
    ConnectionClosed = 13,
    /// Client requests the bridge's RSA public key.
    SecureInit = 14,
    /// Bridge answer to [`SecureInit`]: `payload.public_key` (PEM).
    SecurePublicKey = 15,
    /// Client delivers the RSA-wrapped AES key + IV in `payload.secret`.
    SecureKey = 16,
    /// First encrypted frame from the bridge; the session is live.
    SecureReady = 17,
    SecureDeclined = 18,
    ConnectionHeartbeat = 19,

    // ── Pairing ─────────────────────────────────────────────────────
    PairingStart = 20,
    PairingCode = 21,
    PairingComplete = 22,
    PairingDeclined = 23,
    UnpairClient = 24,

    // ── Login & token ───────────────────────────────────────────────
    /// `{username, password, salt}` with the salted double-SHA256 hash.
    LoginSubmit = 30,
    LoginDeclined = 31,
    /// Carries the freshly minted session token in `payload.token`.
    LoginAccept = 32,
    TokenValidate = 33,
    TokenInvalid = 34,
    TokenAccepted = 35,
    TokenRevoke = 36,
    TokenRenew = 37,
    /// Answer to [`TokenRenew`] with the replacement token.
    TokenRenewed = 38,
    Logout = 39,

    // ── User administration ─────────────────────────────────────────
    QueryUsers = 40,
    SetUserList = 41,
    AddUser = 42,
    RemoveUser = 43,
    UpdateUser = 44,
    ChangePassword = 45,
    SetUserRights = 46,

    // ── Device administration ───────────────────────────────────────
    AddDevice = 50,
    RemoveDevice = 51,
    RenameDevice = 52,
    UpdateDevice = 53,
    TeachDevice = 54,
    UnteachDevice = 55,
    MoveDevice = 56,

    // ── Device actions ──────────────────────────────────────────────
    /// `{deviceId, switch}` — on/off.
    ActionSwitchDevice = 60,
    /// `{deviceId, dimmvalue}` — brightness 0–99.
    ActionSlideDevice = 61,
    ActionStopDevice = 62,
    ActionSceneExecute = 63,
    ActionGroupSwitch = 64,

    // ── Component administration ────────────────────────────────────
    AddComponent = 70,
    RemoveComponent = 71,
    RenameComponent = 72,
    UpdateComponent = 73,
    AssignDeviceToComponent = 74,

    // ── Room administration ─────────────────────────────────────────
    AddRoom = 80,
    RemoveRoom = 81,
    RenameRoom = 82,
    UpdateRoom = 83,
    AssignDeviceToRoom = 84,

    // ── Scenes ──────────────────────────────────────────────────────
    AddScene = 90,
    RemoveScene = 91,
    RenameScene = 92,
    UpdateScene = 93,
    QueryScenes = 94,
    SetSceneList = 95,

    // ── Timers ──────────────────────────────────────────────────────
    AddTimer = 100,
    RemoveTimer = 101,
    UpdateTimer = 102,
    QueryTimers = 103,
    SetTimerList = 104,
    TimerFired = 105,

    // ── Shading & heating commands ──────────────────────────────────
    /// `{deviceId, state}` — 1 down, 2 stop, 3 up.
    SetDeviceShadingState = 110,
    SetShadingRuntime = 111,
    CalibrateShading = 112,
    /// `{roomId, mode, state, setpoint, confirmed}`.
    SetHeatingState = 113,
    SetHeatingSchedule = 114,
    SetVacationMode = 115,

    // ── State pushes from the bridge ────────────────────────────────
    /// Incremental state for one device: `{deviceId, …}`.
    SetDeviceState = 170,
    /// Batch of per-entity updates: `{item: [{deviceId|roomId|compId, …}]}`.
    SetStateInfo = 171,
    /// Bulk inventory: `{devices, comps, rooms, roomHeating, lastItem?}`.
    SetAllData = 172,
    SetDeviceList = 173,
    SetComponentList = 174,
    SetRoomList = 175,
    SetSceneState = 176,
    SetTimerState = 177,
    SetHeatingValues = 178,
    SetSensorValues = 179,
    SetSystemState = 180,
    SetFirmwareStatus = 181,

    // ── Backup & system ─────────────────────────────────────────────
    QueryBackup = 200,
    BackupData = 201,
    RestoreBackup = 202,
    FactoryReset = 203,
    RebootBridge = 204,
    QueryFirmware = 205,
    FirmwareUpdateStart = 206,
    FirmwareUpdateProgress = 207,
    QuerySystemInfo = 208,
    SetSystemInfo = 209,
    QueryNetworkConfig = 210,
    SetNetworkConfig = 211,
    QueryTime = 212,
    SetTime = 213,

    // ── Session queries ─────────────────────────────────────────────
    QuerySessionState = 240,
    SetSessionState = 241,
    QueryCatalogue = 242,
    SetCatalogue = 243,
    QueryDeviceState = 244,
    QueryRoomState = 245,
    QueryComponentState = 246,
    QueryHeatingState = 247,
    QuerySensorValues = 248,
}

impl MessageType {
    /// The numeric wire code.
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}
