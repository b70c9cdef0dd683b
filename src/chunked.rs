//! Chunked transfer framing
//!
//! Payloads larger than one characteristic write (weather records, music state, ...) are
//! split into frames of the form `[0, flags, sequence, payload...]`.
//!
//! Flags byte:
//! - bit 7: last frame of the message
//! - bit 6: set on the first frame when the message spans more than one frame, and on every
//!   frame after the first
//! - bits 0-5: payload type tag

use crate::transport::{CharacteristicHandle, Transaction};
use crate::types::{HuamiError, Result};
use log::debug;

/// Default maximum payload bytes per frame
pub const MAX_CHUNK_LENGTH: usize = 17;

/// Type tag for weather records
pub const TYPE_WEATHER: u8 = 1;
/// Type tag for music state
pub const TYPE_MUSIC: u8 = 3;

const FLAG_LAST: u8 = 0x80;
const FLAG_MULTI: u8 = 0x40;
const TYPE_MASK: u8 = 0x3f;
const HEADER_LEN: usize = 3;

/// Header fields of a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Set on every frame of a message that spans more than one frame
    pub is_multi_frame: bool,
    pub is_last: bool,
    pub sequence: u8,
    pub type_tag: u8,
}

impl ChunkHeader {
    /// Parse the 3 header bytes of a frame
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < HEADER_LEN {
            return Err(HuamiError::DecodeMalformed(format!(
                "chunk frame too short: {} bytes",
                frame.len()
            )));
        }
        if frame[0] != 0 {
            return Err(HuamiError::DecodeMalformed(format!(
                "chunk frame reserved byte is 0x{:02X}",
                frame[0]
            )));
        }
        Ok(Self {
            is_multi_frame: frame[1] & FLAG_MULTI != 0,
            is_last: frame[1] & FLAG_LAST != 0,
            sequence: frame[2],
            type_tag: frame[1] & TYPE_MASK,
        })
    }
}

/// Split `payload` into frames of at most `max_chunk` payload bytes
///
/// An empty payload still produces exactly one (last) frame.
pub fn fragment(payload: &[u8], type_tag: u8, max_chunk: usize) -> Result<Vec<Vec<u8>>> {
    if type_tag > TYPE_MASK {
        return Err(HuamiError::InvalidArgument(format!(
            "chunk type tag {} does not fit in 6 bits",
            type_tag
        )));
    }
    if max_chunk == 0 {
        return Err(HuamiError::InvalidArgument(
            "chunk size must be at least 1".to_string(),
        ));
    }

    let total = payload.len().div_ceil(max_chunk).max(1);
    let mut frames = Vec::with_capacity(total);

    for index in 0..total {
        let start = index * max_chunk;
        let end = (start + max_chunk).min(payload.len());
        let is_last = index + 1 == total;

        let mut flags = type_tag;
        if is_last {
            flags |= FLAG_LAST;
        }
        if index > 0 || total > 1 {
            flags |= FLAG_MULTI;
        }

        let mut frame = Vec::with_capacity(HEADER_LEN + end - start);
        frame.push(0);
        frame.push(flags);
        frame.push((index % 256) as u8);
        frame.extend_from_slice(&payload[start..end]);
        frames.push(frame);
    }

    debug!(
        "Fragmented {} bytes (type {}) into {} frames",
        payload.len(),
        type_tag,
        frames.len()
    );
    Ok(frames)
}

/// Rebuild the payload from frames in the order they were written
pub fn reassemble(frames: &[Vec<u8>]) -> Result<Vec<u8>> {
    if frames.is_empty() {
        return Err(HuamiError::DecodeMalformed("no chunk frames".to_string()));
    }

    let mut payload = Vec::new();
    let mut type_tag = None;

    for (index, frame) in frames.iter().enumerate() {
        let header = ChunkHeader::parse(frame)?;
        let expected_seq = (index % 256) as u8;
        if header.sequence != expected_seq {
            return Err(HuamiError::DecodeMalformed(format!(
                "out of sequence chunk: expected {}, got {}",
                expected_seq, header.sequence
            )));
        }
        if *type_tag.get_or_insert(header.type_tag) != header.type_tag {
            return Err(HuamiError::DecodeMalformed(
                "chunk type changed mid-message".to_string(),
            ));
        }
        if header.is_multi_frame != (frames.len() > 1) {
            return Err(HuamiError::DecodeMalformed(format!(
                "multi-frame flag mismatch at frame {}",
                index
            )));
        }
        let should_be_last = index + 1 == frames.len();
        if header.is_last != should_be_last {
            return Err(HuamiError::DecodeMalformed(format!(
                "last-frame flag mismatch at frame {}",
                index
            )));
        }
        payload.extend_from_slice(&frame[HEADER_LEN..]);
    }

    Ok(payload)
}

/// Append every frame of `payload` to the transaction as separate writes, in order
pub fn write_chunked(
    transaction: &mut Transaction,
    characteristic: &CharacteristicHandle,
    type_tag: u8,
    payload: &[u8],
) -> Result<()> {
    for frame in fragment(payload, type_tag, MAX_CHUNK_LENGTH)? {
        transaction.write(characteristic, &frame);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportOp;

    #[test]
    fn test_empty_payload_single_frame() {
        let frames = fragment(&[], TYPE_WEATHER, MAX_CHUNK_LENGTH).unwrap();
        assert_eq!(frames, vec![vec![0, 0x80 | TYPE_WEATHER, 0]]);
    }

    #[test]
    fn test_single_frame_flags() {
        let frames = fragment(&[1, 2, 3], TYPE_MUSIC, MAX_CHUNK_LENGTH).unwrap();
        assert_eq!(frames, vec![vec![0, 0x83, 0, 1, 2, 3]]);
    }

    #[test]
    fn test_multi_frame_flags() {
        let payload: Vec<u8> = (0..40).collect();
        let frames = fragment(&payload, TYPE_WEATHER, MAX_CHUNK_LENGTH).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0][1], 0x40 | TYPE_WEATHER);
        assert_eq!(frames[1][1], 0x40 | TYPE_WEATHER);
        assert_eq!(frames[2][1], 0xC0 | TYPE_WEATHER);
        assert_eq!(frames[0].len(), 3 + 17);
        assert_eq!(frames[2].len(), 3 + 6);
        assert_eq!(
            frames.iter().map(|f| f[2]).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_empty_frame() {
        let payload = vec![7u8; 34];
        let frames = fragment(&payload, TYPE_WEATHER, 17).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1][1] & 0x80, 0x80);
    }

    #[test]
    fn test_reassemble_recovers_payload() {
        for size in [0usize, 1, 16, 17, 18, 100, 300] {
            for chunk in [1usize, 5, 17] {
                let payload: Vec<u8> = (0..size).map(|i| (i * 7) as u8).collect();
                let frames = fragment(&payload, 5, chunk).unwrap();
                assert_eq!(reassemble(&frames).unwrap(), payload);

                let (last, rest) = frames.split_last().unwrap();
                assert_eq!(last[1] & 0x80, 0x80);
                assert!(rest.iter().all(|f| f[1] & 0x80 == 0));
            }
        }
    }

    #[test]
    fn test_sequence_wraps() {
        let payload = vec![0u8; 300];
        let frames = fragment(&payload, 0, 1).unwrap();
        assert_eq!(frames[255][2], 255);
        assert_eq!(frames[256][2], 0);
        assert_eq!(reassemble(&frames).unwrap(), payload);
    }

    #[test]
    fn test_header_after_sequence_wrap() {
        let frames = fragment(&[0u8; 300], TYPE_WEATHER, 1).unwrap();
        let header = ChunkHeader::parse(&frames[256]).unwrap();
        assert_eq!(header.sequence, 0);
        assert!(header.is_multi_frame);
        assert!(!header.is_last);

        let single = ChunkHeader::parse(&fragment(&[1], TYPE_MUSIC, 17).unwrap()[0]).unwrap();
        assert!(!single.is_multi_frame);
        assert!(single.is_last);
    }

    #[test]
    fn test_reassemble_rejects_missing_multi_flag() {
        let payload: Vec<u8> = (0..40).collect();
        let mut frames = fragment(&payload, 1, 17).unwrap();
        frames[1][1] &= !0x40;
        assert!(matches!(
            reassemble(&frames),
            Err(HuamiError::DecodeMalformed(_))
        ));
    }

    #[test]
    fn test_reassemble_rejects_reordering() {
        let payload: Vec<u8> = (0..40).collect();
        let mut frames = fragment(&payload, 1, 17).unwrap();
        frames.swap(0, 1);
        assert!(reassemble(&frames).is_err());
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(fragment(&[1], 64, 17).is_err());
        assert!(fragment(&[1], 1, 0).is_err());
    }

    #[test]
    fn test_write_chunked_separate_writes() {
        let handle = CharacteristicHandle::new("chunked".to_string());
        let mut tx = Transaction::new("chunked");
        write_chunked(&mut tx, &handle, TYPE_WEATHER, &[9u8; 20]).unwrap();

        assert_eq!(tx.ops().len(), 2);
        assert!(tx
            .ops()
            .iter()
            .all(|op| matches!(op, TransportOp::Write { .. })));
    }
}
