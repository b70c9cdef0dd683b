//! Battery info decoding

use crate::types::{BatteryState, HuamiError, Result};
use chrono::{NaiveDate, NaiveDateTime};

/// Decoded battery characteristic value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatteryInfo {
    pub level: u8,
    pub state: BatteryState,
    pub charge_cycles: Option<u16>,
    pub last_charge: Option<NaiveDateTime>,
}

const CYCLES_OFFSET: usize = 7;
const LAST_CHARGE_OFFSET: usize = 10;
const LAST_CHARGE_LEN: usize = 7;

pub fn decode_battery_info(value: &[u8]) -> Result<BatteryInfo> {
    if value.len() < 3 {
        return Err(HuamiError::DecodeMalformed(format!(
            "battery info has {} bytes",
            value.len()
        )));
    }

    let charge_cycles = value
        .get(CYCLES_OFFSET..CYCLES_OFFSET + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]));
    let last_charge = value
        .get(LAST_CHARGE_OFFSET..LAST_CHARGE_OFFSET + LAST_CHARGE_LEN)
        .and_then(decode_calendar);

    Ok(BatteryInfo {
        level: value[1].min(100),
        state: BatteryState::from_u8(value[2]),
        charge_cycles,
        last_charge,
    })
}

// year u16 LE, month, day, hour, minute, second
fn decode_calendar(b: &[u8]) -> Option<NaiveDateTime> {
    let year = u16::from_le_bytes([b[0], b[1]]) as i32;
    NaiveDate::from_ymd_opt(year, b[2] as u32, b[3] as u32)?.and_hms_opt(
        b[4] as u32,
        b[5] as u32,
        b[6] as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_battery_reply() {
        let value = [
            0x0f, 87, 1, 0, 0, 0, 0, 0x2a, 0x01, 0, 0xe2, 0x07, 3, 21, 18, 40, 5, 0x08,
        ];
        let info = decode_battery_info(&value).unwrap();
        assert_eq!(info.level, 87);
        assert_eq!(info.state, BatteryState::Charging);
        assert_eq!(info.charge_cycles, Some(298));
        assert_eq!(
            info.last_charge,
            NaiveDate::from_ymd_opt(2018, 3, 21).unwrap().and_hms_opt(18, 40, 5)
        );
    }

    #[test]
    fn test_short_reply() {
        let info = decode_battery_info(&[0x0f, 120, 0]).unwrap();
        assert_eq!(info.level, 100);
        assert_eq!(info.state, BatteryState::Normal);
        assert_eq!(info.charge_cycles, None);
        assert_eq!(info.last_charge, None);

        assert!(matches!(
            decode_battery_info(&[0x0f, 50]),
            Err(HuamiError::DecodeMalformed(_))
        ));
    }
}
