//! Firmware versions and the per-connection capability snapshot

use crate::types::{HuamiError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Dot separated numeric firmware/hardware version, e.g. `0.0.8.74` or `V1.0.7.23`
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    fields: Vec<u32>,
}

impl Version {
    pub fn parse(version: &str) -> Result<Self> {
        let trimmed = version.trim();
        let stripped = trimmed
            .strip_prefix('V')
            .or_else(|| trimmed.strip_prefix('v'))
            .unwrap_or(trimmed);
        if stripped.is_empty() {
            return Err(HuamiError::InvalidArgument(format!(
                "empty version string '{}'",
                version
            )));
        }

        let fields = stripped
            .split('.')
            .map(|field| {
                field.parse::<u32>().map_err(|_| {
                    HuamiError::InvalidArgument(format!("invalid version '{}'", version))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: trimmed.to_string(),
            fields,
        })
    }

    fn field(&self, index: usize) -> u32 {
        self.fields.get(index).copied().unwrap_or(0)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.fields.len().max(other.fields.len());
        (0..len)
            .map(|i| self.field(i).cmp(&other.field(i)))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Supported device families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFamily {
    MiBand2,
    AmazfitBip,
    AmazfitCor,
    MiBand3,
}

impl DeviceFamily {
    /// Oldest firmware that accepts text on the New Alert characteristic
    pub fn min_text_notification_version(&self) -> &'static str {
        match self {
            DeviceFamily::AmazfitBip => "0.0.8.74",
            DeviceFamily::MiBand2 => "1.0.1.28",
            DeviceFamily::AmazfitCor => "1.0.0.0",
            DeviceFamily::MiBand3 => "0.0.0.0",
        }
    }

    pub fn alarm_slot_count(&self) -> u8 {
        match self {
            DeviceFamily::MiBand2 => 5,
            _ => 10,
        }
    }

    /// Firmware below which the per-family language command must be used instead of the
    /// locale template
    fn legacy_language_below(&self) -> Option<&'static str> {
        match self {
            DeviceFamily::AmazfitBip => Some("0.1.0.77"),
            DeviceFamily::AmazfitCor => Some("1.0.7.23"),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceFamily::MiBand2 => write!(f, "Mi Band 2"),
            DeviceFamily::AmazfitBip => write!(f, "Amazfit Bip"),
            DeviceFamily::AmazfitCor => write!(f, "Amazfit Cor"),
            DeviceFamily::MiBand3 => write!(f, "Mi Band 3"),
        }
    }
}

const WEATHER_CONDITION_STRING_VERSION: &str = "0.0.8.74";

/// Immutable snapshot of what the connected firmware can do
///
/// Built once per connection; a reconnect builds a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCapability {
    pub family: DeviceFamily,
    pub firmware_version: Version,
    pub hardware_version: String,
    pub supports_text_notifications: bool,
    pub supports_weather_condition_string: bool,
    pub supports_weather: bool,
    pub supports_music_info: bool,
    pub uses_legacy_language_command: bool,
    pub alarm_slot_count: u8,
}

impl DeviceCapability {
    pub fn new(family: DeviceFamily, firmware: &str, hardware: &str) -> Result<Self> {
        let firmware_version = Version::parse(firmware)?;
        let at_least = |min: &str| -> Result<bool> { Ok(firmware_version >= Version::parse(min)?) };

        let supports_text_notifications = at_least(family.min_text_notification_version())?;
        let supports_weather = family != DeviceFamily::MiBand2;
        let supports_weather_condition_string =
            supports_weather && at_least(WEATHER_CONDITION_STRING_VERSION)?;
        let uses_legacy_language_command = match family.legacy_language_below() {
            Some(min) => !at_least(min)?,
            None => false,
        };

        Ok(Self {
            family,
            hardware_version: hardware.to_string(),
            supports_text_notifications,
            supports_weather_condition_string,
            supports_weather,
            supports_music_info: family != DeviceFamily::MiBand2,
            uses_legacy_language_command,
            alarm_slot_count: family.alarm_slot_count(),
            firmware_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_version_ordering() {
        assert!(v("0.0.8.50") < v("0.0.8.74"));
        assert!(v("0.1.0.77") > v("0.0.9.99"));
        assert!(v("1.0.10.0") > v("1.0.9.0"));
        assert_eq!(v("1.0"), v("1.0.0.0"));
        assert_eq!(v("V1.0.7.23"), v("1.0.7.23"));
    }

    #[test]
    fn test_version_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1.x.3").is_err());
    }

    #[test]
    fn test_bip_text_notification_threshold() {
        let old = DeviceCapability::new(DeviceFamily::AmazfitBip, "0.0.8.50", "V0.25.3.5").unwrap();
        assert!(!old.supports_text_notifications);
        assert!(!old.supports_weather_condition_string);

        let new = DeviceCapability::new(DeviceFamily::AmazfitBip, "0.0.8.74", "V0.25.3.5").unwrap();
        assert!(new.supports_text_notifications);
        assert!(new.supports_weather_condition_string);
    }

    #[test]
    fn test_family_derived_fields() {
        let band = DeviceCapability::new(DeviceFamily::MiBand2, "1.0.1.28", "V0.1.3.2").unwrap();
        assert_eq!(band.alarm_slot_count, 5);
        assert!(!band.supports_weather);
        assert!(!band.supports_music_info);

        let cor = DeviceCapability::new(DeviceFamily::AmazfitCor, "1.0.7.22", "").unwrap();
        assert!(cor.uses_legacy_language_command);
        assert_eq!(cor.alarm_slot_count, 10);

        let bip = DeviceCapability::new(DeviceFamily::AmazfitBip, "0.1.0.77", "").unwrap();
        assert!(!bip.uses_legacy_language_command);
    }
}
