//! Wire frames for the radar channels
//!
//! Every channel message is one binary frame holding a multipart payload:
//! a part count (u8) followed by each part as a u32 little-endian length and
//! its bytes. The push and echo channels carry single-part frames, status
//! carries one 8-byte little-endian count, and feedback carries exactly three
//! parts: fingerprint, echo total, error text (empty when there is none).

use radar_core::TxFingerprint;
use thiserror::Error;

/// Size of the echo-total / node-count field
pub const COUNT_LEN: usize = 8;

/// A frame that does not decode. Malformed frames are logged and dropped by
/// the listeners; they never terminate a loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("frame truncated")]
    Truncated,

    #[error("expected {expected} parts, got {actual}")]
    PartCount { expected: usize, actual: usize },

    #[error("fingerprint part must be 32 bytes, got {0}")]
    BadFingerprint(usize),

    #[error("count part must be 8 bytes, got {0}")]
    BadCount(usize),

    #[error("error part is not valid UTF-8")]
    BadErrorText,

    #[error("trailing bytes after last part")]
    TrailingBytes,
}

/// Feedback report from the broadcast infrastructure for one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRecord {
    pub fingerprint: TxFingerprint,
    /// Echo total as observed by the fan-out layer itself
    pub echo_total: u64,
    pub error: Option<String>,
}

/// Encode parts into one frame
pub fn encode_parts(parts: &[&[u8]]) -> Vec<u8> {
    let body: usize = parts.iter().map(|p| 4 + p.len()).sum();
    let mut frame = Vec::with_capacity(1 + body);
    frame.push(parts.len() as u8);
    for part in parts {
        frame.extend_from_slice(&(part.len() as u32).to_le_bytes());
        frame.extend_from_slice(part);
    }
    frame
}

/// Split a frame back into its parts
pub fn decode_parts(frame: &[u8]) -> Result<Vec<Vec<u8>>, WireError> {
    let (&count, mut rest) = frame.split_first().ok_or(WireError::Truncated)?;
    let mut parts = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if rest.len() < 4 {
            return Err(WireError::Truncated);
        }
        let (len_bytes, tail) = rest.split_at(4);
        let len = u32::from_le_bytes(len_bytes.try_into().expect("4-byte slice")) as usize;
        if tail.len() < len {
            return Err(WireError::Truncated);
        }
        let (part, tail) = tail.split_at(len);
        parts.push(part.to_vec());
        rest = tail;
    }
    if !rest.is_empty() {
        return Err(WireError::TrailingBytes);
    }
    Ok(parts)
}

/// Push frame: the raw transaction bytes
pub fn encode_push(raw_tx: &[u8]) -> Vec<u8> {
    encode_parts(&[raw_tx])
}

/// Echo frame: the fingerprint of a transaction a monitoring peer saw
pub fn encode_echo(fingerprint: &TxFingerprint) -> Vec<u8> {
    encode_parts(&[fingerprint.as_bytes()])
}

/// Status frame: connected node count
pub fn encode_status(count: u64) -> Vec<u8> {
    encode_parts(&[&count.to_le_bytes()])
}

/// Feedback frame: fingerprint, echo total, error text (empty = no error)
pub fn encode_feedback(
    fingerprint: &TxFingerprint,
    echo_total: u64,
    error: Option<&str>,
) -> Vec<u8> {
    let count = echo_total.to_le_bytes();
    encode_parts(&[
        fingerprint.as_bytes(),
        &count,
        error.unwrap_or("").as_bytes(),
    ])
}

/// Parse an echo frame
pub fn parse_echo(frame: &[u8]) -> Result<TxFingerprint, WireError> {
    let parts = decode_parts(frame)?;
    if parts.len() != 1 {
        return Err(WireError::PartCount {
            expected: 1,
            actual: parts.len(),
        });
    }
    TxFingerprint::from_bytes(&parts[0]).ok_or(WireError::BadFingerprint(parts[0].len()))
}

/// Parse a status frame
pub fn parse_status(frame: &[u8]) -> Result<u64, WireError> {
    let parts = decode_parts(frame)?;
    if parts.len() != 1 {
        return Err(WireError::PartCount {
            expected: 1,
            actual: parts.len(),
        });
    }
    let count: [u8; COUNT_LEN] = parts[0]
        .as_slice()
        .try_into()
        .map_err(|_| WireError::BadCount(parts[0].len()))?;
    Ok(u64::from_le_bytes(count))
}

/// Parse a feedback frame
pub fn parse_feedback(frame: &[u8]) -> Result<FeedbackRecord, WireError> {
    let parts = decode_parts(frame)?;
    if parts.len() != 3 {
        return Err(WireError::PartCount {
            expected: 3,
            actual: parts.len(),
        });
    }
    let fingerprint =
        TxFingerprint::from_bytes(&parts[0]).ok_or(WireError::BadFingerprint(parts[0].len()))?;
    let count: [u8; COUNT_LEN] = parts[1]
        .as_slice()
        .try_into()
        .map_err(|_| WireError::BadCount(parts[1].len()))?;
    let error = std::str::from_utf8(&parts[2]).map_err(|_| WireError::BadErrorText)?;
    Ok(FeedbackRecord {
        fingerprint,
        echo_total: u64::from_le_bytes(count),
        error: (!error.is_empty()).then(|| error.to_string()),
    })
}
