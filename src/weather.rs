//! Weather records
//!
//! Weather reaches the band as four records (current conditions, air quality, forecast and
//! location), each sent as its own chunked message. Input temperatures are Kelvin and
//! conditions are OpenWeatherMap condition codes.

use crate::config::DistanceUnit;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

const RECORD_FORECAST: u8 = 1;
const RECORD_CURRENT: u8 = 2;
const RECORD_AIR_QUALITY: u8 = 4;
const RECORD_LOCATION: u8 = 8;

const AIR_QUALITY_UNAVAILABLE: &str = "(n/a)";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct WeatherSpec {
    /// Unix seconds the data was fetched
    pub timestamp: u32,
    pub location: String,
    /// Kelvin
    pub current_temp: i32,
    pub current_condition_code: i32,
    pub current_condition: String,
    pub today_max_temp: i32,
    pub today_min_temp: i32,
    #[serde(default)]
    pub forecasts: Vec<WeatherForecast>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct WeatherForecast {
    pub condition_code: i32,
    pub max_temp: i32,
    pub min_temp: i32,
}

/// Per-send encoding context
#[derive(Debug, Clone, Copy)]
pub struct WeatherOptions {
    pub unit: DistanceUnit,
    pub supports_condition_string: bool,
    /// Local offset at the weather timestamp
    pub utc_offset: FixedOffset,
}

// Huami condition bytes
pub const CLEAR_SKY: u8 = 0;
pub const SCATTERED_CLOUDS: u8 = 1;
pub const CLOUDY: u8 = 2;
pub const SHOWERS: u8 = 3;
pub const THUNDERSTORM: u8 = 4;
pub const HAIL: u8 = 5;
pub const SLEET: u8 = 6;
pub const LIGHT_RAIN: u8 = 7;
pub const MODERATE_RAIN: u8 = 8;
pub const HEAVY_RAIN: u8 = 9;
pub const RAINSTORM: u8 = 10;
pub const VIOLENT_RAINSTORM: u8 = 11;
pub const SNOW_SHOWERS: u8 = 13;
pub const LIGHT_SNOW: u8 = 14;
pub const MODERATE_SNOW: u8 = 15;
pub const HEAVY_SNOW: u8 = 16;
pub const SNOWSTORM: u8 = 17;
pub const FOG: u8 = 18;
pub const FREEZING_RAIN: u8 = 19;
pub const SANDSTORM: u8 = 20;
pub const HAZE: u8 = 21;

/// Map OpenWeatherMap condition code to Huami condition byte
pub fn map_to_huami_condition(owm_code: i32) -> u8 {
    match owm_code {
        // Thunderstorm
        200..=232 => THUNDERSTORM,
        // Drizzle
        300..=321 => LIGHT_RAIN,
        // Rain
        500 => LIGHT_RAIN,
        501 => MODERATE_RAIN,
        502 => HEAVY_RAIN,
        503 => RAINSTORM,
        504 => VIOLENT_RAINSTORM,
        511 => FREEZING_RAIN,
        520..=531 => SHOWERS,
        // Snow
        600 => LIGHT_SNOW,
        601 => MODERATE_SNOW,
        602 => HEAVY_SNOW,
        611..=616 => SLEET,
        620..=622 => SNOW_SHOWERS,
        // Atmosphere
        701 | 741 => FOG,
        711 | 721 => HAZE,
        731 | 751 | 761 | 762 => SANDSTORM,
        771 | 781 => THUNDERSTORM,
        // Clear
        800 => CLEAR_SKY,
        // Clouds
        801 | 802 => SCATTERED_CLOUDS,
        803 | 804 => CLOUDY,
        // Extreme
        900..=902 => VIOLENT_RAINSTORM,
        903 | 904 => CLEAR_SKY,
        905 => CLOUDY,
        906 => HAIL,
        _ => CLOUDY,
    }
}

/// English description of an OpenWeatherMap condition code
pub fn condition_description(owm_code: i32) -> &'static str {
    match owm_code {
        200 => "thunderstorm with light rain",
        201 => "thunderstorm with rain",
        202 => "thunderstorm with heavy rain",
        210 => "light thunderstorm",
        211 => "thunderstorm",
        212 => "heavy thunderstorm",
        221 => "ragged thunderstorm",
        230 => "thunderstorm with light drizzle",
        231 => "thunderstorm with drizzle",
        232 => "thunderstorm with heavy drizzle",
        300 => "light intensity drizzle",
        301 => "drizzle",
        302 => "heavy intensity drizzle",
        310 => "light intensity drizzle rain",
        311 => "drizzle rain",
        312 => "heavy intensity drizzle rain",
        313 => "shower rain and drizzle",
        314 => "heavy shower rain and drizzle",
        321 => "shower drizzle",
        500 => "light rain",
        501 => "moderate rain",
        502 => "heavy intensity rain",
        503 => "very heavy rain",
        504 => "extreme rain",
        511 => "freezing rain",
        520 => "light intensity shower rain",
        521 => "shower rain",
        522 => "heavy intensity shower rain",
        531 => "ragged shower rain",
        600 => "light snow",
        601 => "snow",
        602 => "heavy snow",
        611 => "sleet",
        612 => "shower sleet",
        615 => "light rain and snow",
        616 => "rain and snow",
        620 => "light shower snow",
        621 => "shower snow",
        622 => "heavy shower snow",
        701 => "mist",
        711 => "smoke",
        721 => "haze",
        731 => "sand, dust whirls",
        741 => "fog",
        751 => "sand",
        761 => "dust",
        762 => "volcanic ash",
        771 => "squalls",
        781 => "tornado",
        800 => "clear sky",
        801 => "few clouds",
        802 => "scattered clouds",
        803 => "broken clouds",
        804 => "overcast clouds",
        900 => "tornado",
        901 => "tropical storm",
        902 => "hurricane",
        903 => "cold",
        904 => "hot",
        905 => "windy",
        906 => "hail",
        _ => "",
    }
}

/// Convert Kelvin to whole degrees Celsius
pub fn kelvin_to_celsius(kelvin: i32) -> i32 {
    kelvin - 273
}

pub fn celsius_to_fahrenheit(celsius: i32) -> i32 {
    (celsius as f64 * 9.0 / 5.0 + 32.0) as i32
}

/// Temperature byte for the band in the configured unit
pub fn temperature_byte(kelvin: i32, unit: DistanceUnit) -> u8 {
    let celsius = kelvin_to_celsius(kelvin);
    let value = match unit {
        DistanceUnit::Metric => celsius,
        DistanceUnit::Imperial => celsius_to_fahrenheit(celsius),
    };
    value as i8 as u8
}

fn header(record: u8, spec: &WeatherSpec, options: &WeatherOptions) -> Vec<u8> {
    let tz_hours = options.utc_offset.local_minus_utc() / 3600;
    let mut buf = vec![record];
    buf.extend_from_slice(&spec.timestamp.to_le_bytes());
    buf.push((tz_hours * 4) as i8 as u8);
    buf
}

fn push_string(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(value.as_bytes());
    buf.push(0);
}

pub fn encode_current(spec: &WeatherSpec, options: &WeatherOptions) -> Vec<u8> {
    let mut buf = header(RECORD_CURRENT, spec, options);
    buf.push(map_to_huami_condition(spec.current_condition_code));
    buf.push(temperature_byte(spec.current_temp, options.unit));
    if options.supports_condition_string {
        push_string(&mut buf, &spec.current_condition);
    }
    buf
}

/// Air quality is not tracked, the band gets a zero index
pub fn encode_air_quality(spec: &WeatherSpec, options: &WeatherOptions) -> Vec<u8> {
    let mut buf = header(RECORD_AIR_QUALITY, spec, options);
    buf.extend_from_slice(&0u16.to_le_bytes());
    if options.supports_condition_string {
        push_string(&mut buf, AIR_QUALITY_UNAVAILABLE);
    }
    buf
}

/// Today followed by every forecast day
pub fn encode_forecast(spec: &WeatherSpec, options: &WeatherOptions) -> Vec<u8> {
    let mut buf = header(RECORD_FORECAST, spec, options);
    buf.push((1 + spec.forecasts.len()) as u8);

    let today = map_to_huami_condition(spec.current_condition_code);
    buf.extend_from_slice(&[today, today]);
    buf.push(temperature_byte(spec.today_max_temp, options.unit));
    buf.push(temperature_byte(spec.today_min_temp, options.unit));
    if options.supports_condition_string {
        push_string(&mut buf, &spec.current_condition);
    }

    for forecast in &spec.forecasts {
        let condition = map_to_huami_condition(forecast.condition_code);
        buf.extend_from_slice(&[condition, condition]);
        buf.push(temperature_byte(forecast.max_temp, options.unit));
        buf.push(temperature_byte(forecast.min_temp, options.unit));
        if options.supports_condition_string {
            push_string(&mut buf, condition_description(forecast.condition_code));
        }
    }
    buf
}

/// `None` when the firmware takes no strings, the record would be empty
pub fn encode_location(spec: &WeatherSpec, options: &WeatherOptions) -> Option<Vec<u8>> {
    if !options.supports_condition_string {
        return None;
    }
    let mut buf = vec![RECORD_LOCATION];
    push_string(&mut buf, &spec.location);
    Some(buf)
}

/// All records in send order, paired with a short description for logging
pub fn encode_weather(spec: &WeatherSpec, options: &WeatherOptions) -> Vec<(&'static str, Vec<u8>)> {
    let mut records = vec![
        ("current weather", encode_current(spec, options)),
        ("air quality index", encode_air_quality(spec, options)),
        ("weather forecast", encode_forecast(spec, options)),
    ];
    if let Some(location) = encode_location(spec, options) {
        records.push(("forecast location", location));
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(strings: bool) -> WeatherOptions {
        WeatherOptions {
            unit: DistanceUnit::Metric,
            supports_condition_string: strings,
            utc_offset: FixedOffset::east_opt(3600).unwrap(),
        }
    }

    fn spec() -> WeatherSpec {
        WeatherSpec {
            timestamp: 0x5b00_0000,
            location: "Berlin".to_string(),
            current_temp: 300,
            current_condition_code: 800,
            current_condition: "clear sky".to_string(),
            today_max_temp: 303,
            today_min_temp: 288,
            forecasts: vec![WeatherForecast {
                condition_code: 500,
                max_temp: 295,
                min_temp: 280,
            }],
        }
    }

    #[test]
    fn test_huami_condition_mapping() {
        assert_eq!(map_to_huami_condition(800), CLEAR_SKY);
        assert_eq!(map_to_huami_condition(801), SCATTERED_CLOUDS);
        assert_eq!(map_to_huami_condition(211), THUNDERSTORM);
        assert_eq!(map_to_huami_condition(500), LIGHT_RAIN);
        assert_eq!(map_to_huami_condition(741), FOG);
        assert_eq!(map_to_huami_condition(12345), CLOUDY);
    }

    #[test]
    fn test_temperature_conversion() {
        assert_eq!(temperature_byte(300, DistanceUnit::Metric), 27);
        assert_eq!(temperature_byte(300, DistanceUnit::Imperial), 80);
        assert_eq!(temperature_byte(263, DistanceUnit::Metric), (-10i8) as u8);
    }

    #[test]
    fn test_current_without_condition_string() {
        let record = encode_current(&spec(), &options(false));
        assert_eq!(record.len(), 8);
        assert_eq!(record[0], 2);
        assert_eq!(&record[1..5], &0x5b00_0000u32.to_le_bytes());
        assert_eq!(record[5], 4);
        assert_eq!(record[6], CLEAR_SKY);
        assert_eq!(record[7], 27);
    }

    #[test]
    fn test_current_with_condition_string() {
        let record = encode_current(&spec(), &options(true));
        assert_eq!(record[7], 27);
        assert_eq!(&record[8..], b"clear sky\0");
    }

    #[test]
    fn test_air_quality() {
        assert_eq!(encode_air_quality(&spec(), &options(false)).len(), 8);
        assert!(encode_air_quality(&spec(), &options(true)).ends_with(b"(n/a)\0"));
    }

    #[test]
    fn test_forecast_stride() {
        let plain = encode_forecast(&spec(), &options(false));
        assert_eq!(plain.len(), 7 + 4 * 2);
        assert_eq!(plain[6], 2);
        assert_eq!(&plain[7..11], &[CLEAR_SKY, CLEAR_SKY, 30, 15]);
        assert_eq!(&plain[11..15], &[LIGHT_RAIN, LIGHT_RAIN, 22, 7]);

        let text = encode_forecast(&spec(), &options(true));
        let expected_len = 7 + 4 * 2 + "clear sky".len() + 1 + "light rain".len() + 1;
        assert_eq!(text.len(), expected_len);
        assert!(text.ends_with(b"light rain\0"));
    }

    #[test]
    fn test_location_needs_strings() {
        assert_eq!(encode_location(&spec(), &options(true)), Some(b"\x08Berlin\0".to_vec()));
        assert_eq!(encode_location(&spec(), &options(false)), None);
        assert_eq!(encode_weather(&spec(), &options(false)).len(), 3);
        assert_eq!(encode_weather(&spec(), &options(true)).len(), 4);
    }
}
