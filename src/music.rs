//! Music playback state for the band's music control screen

use serde::{Deserialize, Serialize};

const FLAG_BASE: u8 = 0x01;
const FLAG_TRACK: u8 = 0x02;
const FLAG_ALBUM: u8 = 0x04;
const FLAG_ARTIST: u8 = 0x08;

/// Sent while track or state are unknown so the music controls stay usable
pub const DUMMY_PLAYBACK_INFO: [u8; 8] = [1, 0, 1, 0, 0, 0, 1, 0];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicSpec {
    pub track: Option<String>,
    pub album: Option<String>,
    pub artist: Option<String>,
    pub duration_secs: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Playing,
    Paused,
    Stopped,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicStateSpec {
    pub state: PlayState,
    pub position_secs: u32,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Encode the playback payload, or the dummy when either half is unknown
pub fn encode_music_state(music: Option<&MusicSpec>, state: Option<&MusicStateSpec>) -> Vec<u8> {
    let (music, state) = match (music, state) {
        (Some(music), Some(state)) => (music, state),
        _ => return DUMMY_PLAYBACK_INFO.to_vec(),
    };

    let fields = [
        (FLAG_TRACK, non_empty(&music.track)),
        (FLAG_ALBUM, non_empty(&music.album)),
        (FLAG_ARTIST, non_empty(&music.artist)),
    ];

    let flags = fields
        .iter()
        .filter(|(_, value)| value.is_some())
        .fold(FLAG_BASE, |flags, (bit, _)| flags | bit);
    let play_state = match state.state {
        PlayState::Playing => 1,
        _ => 0,
    };

    let mut buf = vec![flags, play_state];
    buf.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);
    // show track
    buf.extend_from_slice(&[0x01, 0x00]);
    for value in fields.iter().filter_map(|(_, value)| *value) {
        buf.extend_from_slice(value.as_bytes());
        buf.push(0);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing() -> MusicStateSpec {
        MusicStateSpec {
            state: PlayState::Playing,
            position_secs: 12,
        }
    }

    #[test]
    fn test_dummy_when_unknown() {
        let music = MusicSpec::default();
        assert_eq!(encode_music_state(None, Some(&playing())), DUMMY_PLAYBACK_INFO);
        assert_eq!(encode_music_state(Some(&music), None), DUMMY_PLAYBACK_INFO);
    }

    #[test]
    fn test_flags_follow_present_fields() {
        let music = MusicSpec {
            track: Some("Song".to_string()),
            album: Some(String::new()),
            artist: Some("Band".to_string()),
            duration_secs: None,
        };
        let payload = encode_music_state(Some(&music), Some(&playing()));
        assert_eq!(payload[0], 0x01 | 0x02 | 0x08);
        assert_eq!(payload[1], 1);
        assert_eq!(&payload[2..8], &[1, 0, 0, 0, 1, 0]);
        assert_eq!(&payload[8..], b"Song\0Band\0");
    }

    #[test]
    fn test_paused_without_strings() {
        let paused = MusicStateSpec {
            state: PlayState::Paused,
            position_secs: 0,
        };
        let payload = encode_music_state(Some(&MusicSpec::default()), Some(&paused));
        assert_eq!(payload, vec![0x01, 0, 1, 0, 0, 0, 1, 0]);
    }
}
