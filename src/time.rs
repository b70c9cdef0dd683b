//! Current time encoding
//!
//! The band ignores DST flags, so the DST shift is folded into the time zone byte, which counts
//! quarter hours east of UTC.

use crate::types::{HuamiError, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, TimeZone, Timelike};

/// Granularity requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePrecision {
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
}

const MINUTES_LEN: usize = 6;
const SECONDS_LEN: usize = 9;
const TAIL_LEN: usize = 2;
const QUARTER_HOUR_SECS: i32 = 15 * 60;

/// Encode `datetime` in its own time zone
pub fn encode_time<Tz: TimeZone>(datetime: &DateTime<Tz>, precision: TimePrecision) -> Result<Vec<u8>> {
    let year = datetime.year() as u16;
    let mut bytes = Vec::with_capacity(SECONDS_LEN + TAIL_LEN);
    bytes.extend_from_slice(&year.to_le_bytes());
    bytes.push(datetime.month() as u8);
    bytes.push(datetime.day() as u8);
    bytes.push(datetime.hour() as u8);
    bytes.push(datetime.minute() as u8);

    match precision {
        TimePrecision::Minutes => {}
        TimePrecision::Seconds => {
            bytes.push(datetime.second() as u8);
            bytes.push(datetime.weekday().number_from_monday() as u8);
            bytes.push(0); // fractions256
        }
        other => {
            return Err(HuamiError::InvalidArgument(format!(
                "unsupported time precision {:?}, only minutes and seconds",
                other
            )))
        }
    }

    // adjust reason, time zone
    bytes.push(0);
    bytes.push(time_zone_byte(datetime.offset().fix()));
    Ok(bytes)
}

/// Quarter hours east of UTC, DST included
pub fn time_zone_byte(offset: FixedOffset) -> u8 {
    (offset.local_minus_utc() / QUARTER_HOUR_SECS) as i8 as u8
}

/// Decode an 8 byte (minutes) or 11 byte (seconds) time value
pub fn decode_time(bytes: &[u8]) -> Result<DateTime<FixedOffset>> {
    let (second, tail) = match bytes.len() {
        len if len == MINUTES_LEN + TAIL_LEN => (0, &bytes[MINUTES_LEN..]),
        len if len == SECONDS_LEN + TAIL_LEN => (bytes[6] as u32, &bytes[SECONDS_LEN..]),
        len => {
            return Err(HuamiError::DecodeMalformed(format!(
                "time value has {} bytes",
                len
            )))
        }
    };

    let year = u16::from_le_bytes([bytes[0], bytes[1]]) as i32;
    let offset = FixedOffset::east_opt(tail[1] as i8 as i32 * QUARTER_HOUR_SECS)
        .ok_or_else(|| HuamiError::DecodeMalformed("time zone out of range".to_string()))?;

    NaiveDate::from_ymd_opt(year, bytes[2] as u32, bytes[3] as u32)
        .and_then(|date| date.and_hms_opt(bytes[4] as u32, bytes[5] as u32, second))
        .and_then(|naive| naive.and_local_timezone(offset).single())
        .ok_or_else(|| {
            HuamiError::DecodeMalformed(format!("invalid calendar fields in {:?}", bytes))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn berlin_summer() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2018, 7, 14, 9, 5, 33)
            .unwrap()
    }

    #[test]
    fn test_encode_seconds() {
        let bytes = encode_time(&berlin_summer(), TimePrecision::Seconds).unwrap();
        // 2018 = 0x07E2, Saturday = 6, +2h = 8 quarter hours
        assert_eq!(bytes, vec![0xE2, 0x07, 7, 14, 9, 5, 33, 6, 0, 0, 8]);
    }

    #[test]
    fn test_encode_minutes() {
        let bytes = encode_time(&berlin_summer(), TimePrecision::Minutes).unwrap();
        assert_eq!(bytes, vec![0xE2, 0x07, 7, 14, 9, 5, 0, 8]);
    }

    #[test]
    fn test_negative_zone() {
        let offset = FixedOffset::west_opt(3 * 3600 + 30 * 60).unwrap();
        assert_eq!(time_zone_byte(offset), (-14i8) as u8);
    }

    #[test]
    fn test_unsupported_precision() {
        assert!(matches!(
            encode_time(&berlin_summer(), TimePrecision::Milliseconds),
            Err(HuamiError::InvalidArgument(_))
        ));
        assert!(encode_time(&berlin_summer(), TimePrecision::Hours).is_err());
    }

    #[test]
    fn test_round_trip_to_the_second() {
        let sent = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2019, 12, 31, 23, 59, 58)
            .unwrap();
        let decoded = decode_time(&encode_time(&sent, TimePrecision::Seconds).unwrap()).unwrap();
        assert_eq!(decoded, sent);
        assert_eq!(decoded.offset(), sent.offset());

        let minutes = decode_time(&encode_time(&sent, TimePrecision::Minutes).unwrap()).unwrap();
        assert_eq!(minutes.timestamp(), sent.timestamp() - 58);
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        assert!(decode_time(&[0xE2, 0x07, 7]).is_err());
        assert!(decode_time(&[0xE2, 0x07, 13, 1, 0, 0, 0, 0]).is_err());
    }
}
