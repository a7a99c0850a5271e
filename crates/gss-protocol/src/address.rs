use serde::{Deserialize, Serialize};

/// Default well-known service name.
pub const DEFAULT_SERVICE_NAME: &str = "com.hack_computer.GameStateService";
/// Default object path of the state object.
pub const DEFAULT_OBJECT_PATH: &str = "/com/hack_computer/GameStateService";
/// Default interface name carrying `Get`, `Set` and `Changed`.
pub const DEFAULT_INTERFACE: &str = "com.hack_computer.GameStateService";

/// Bus addressing of the state object.
///
/// The exact strings are a deployment choice; calls must carry the same
/// object path and interface the service was configured with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusAddress {
    pub service: String,
    pub object_path: String,
    pub interface: String,
}

impl Default for BusAddress {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE_NAME.into(),
            object_path: DEFAULT_OBJECT_PATH.into(),
            interface: DEFAULT_INTERFACE.into(),
        }
    }
}
