pub mod device;
pub mod event;

pub use device::{DeviceStatus, ParseDeviceStatusError};
pub use event::{DeviceEvent, StatusChange, TelemetryUpdate};
