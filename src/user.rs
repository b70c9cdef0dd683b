//! User profile command
//!
//! The band only keeps birth year, sex, height and weight. Birth month/day are fixed
//! placeholders and the user id is derived from the alias.

use crate::service::COMMAND_SET_USERINFO;
use crate::types::{HuamiError, Result};
use serde::{Deserialize, Serialize};

const BIRTH_MONTH: u8 = 7;
const BIRTH_DAY: u8 = 1;
const WEIGHT_SCALE: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

impl Gender {
    pub fn to_u8(&self) -> u8 {
        match self {
            Gender::Male => 0,
            Gender::Female => 1,
            Gender::Other => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub alias: Option<String>,
    pub birth_year: u16,
    pub gender: Gender,
    pub height_cm: u16,
    pub weight_kg: u16,
}

/// 32 bit hash over the UTF-16 code units of `alias`, same values as JVM `String.hashCode`
pub fn alias_hash(alias: &str) -> i32 {
    alias
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Encode the 16 byte user info command
pub fn encode_user_info(profile: &UserProfile) -> Result<Vec<u8>> {
    let alias = match profile.alias.as_deref() {
        Some(alias) if !alias.is_empty() => alias,
        _ => {
            return Err(HuamiError::PreconditionNotMet(
                "user alias is not set".to_string(),
            ))
        }
    };
    if profile.weight_kg == 0 || profile.height_cm == 0 || profile.birth_year == 0 {
        return Err(HuamiError::PreconditionNotMet(
            "user weight, height and birth year must be set".to_string(),
        ));
    }

    let weight = u16::try_from(u32::from(profile.weight_kg) * WEIGHT_SCALE).map_err(|_| {
        HuamiError::InvalidArgument(format!(
            "user weight {} kg does not fit the device encoding",
            profile.weight_kg
        ))
    })?;
    let user_id = alias_hash(alias);

    let mut bytes = Vec::with_capacity(16);
    bytes.extend_from_slice(&[COMMAND_SET_USERINFO, 0, 0]);
    bytes.extend_from_slice(&profile.birth_year.to_le_bytes());
    bytes.push(BIRTH_MONTH);
    bytes.push(BIRTH_DAY);
    bytes.push(profile.gender.to_u8());
    bytes.extend_from_slice(&profile.height_cm.to_le_bytes());
    bytes.extend_from_slice(&weight.to_le_bytes());
    bytes.extend_from_slice(&user_id.to_le_bytes());
    Ok(bytes)
}
