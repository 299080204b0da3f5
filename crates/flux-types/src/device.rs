use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 设备状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Online,
    /// 新设备在首次上报前视为离线
    #[default]
    Offline,
    Warning,
    Error,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "ONLINE",
            DeviceStatus::Offline => "OFFLINE",
            DeviceStatus::Warning => "WARNING",
            DeviceStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown device status: {0}")]
pub struct ParseDeviceStatusError(pub String);

impl FromStr for DeviceStatus {
    type Err = ParseDeviceStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ONLINE" => Ok(DeviceStatus::Online),
            "OFFLINE" => Ok(DeviceStatus::Offline),
            "WARNING" => Ok(DeviceStatus::Warning),
            "ERROR" => Ok(DeviceStatus::Error),
            _ => Err(ParseDeviceStatusError(s.to_string())),
        }
    }
}
