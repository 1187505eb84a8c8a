//! Wire format for frame serialization.
//!
//! Frame format: `[length:4][checksum:4][payload:N]`
//!
//! - **length**: Total frame size including header (little-endian u32)
//! - **checksum**: CRC32C of the payload for integrity verification
//! - **payload**: Application data (codec-encoded message bytes)
//!
//! This framing belongs to the bundled TCP socket implementation; the
//! connection layer itself only ever sees whole payloads.

/// Header size: 4 (length) + 4 (checksum) = 8 bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Maximum payload size (1MB).
///
/// Frames larger than this are rejected to prevent memory exhaustion from a
/// corrupted or hostile length field.
pub const MAX_FRAME_PAYLOAD: usize = 1024 * 1024;

/// Wire format error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FrameError {
    /// Checksum verification failed - data was corrupted.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Expected checksum from header.
        expected: u32,
        /// Computed checksum from data.
        actual: u32,
    },

    /// Payload exceeds maximum allowed size.
    #[error("frame too large: {size} bytes (max {MAX_FRAME_PAYLOAD})")]
    FrameTooLarge {
        /// Actual payload size in bytes.
        size: usize,
    },

    /// Length field has an invalid value.
    #[error("invalid frame length: {length}")]
    InvalidLength {
        /// The invalid length value from the header.
        length: u32,
    },
}

/// Serialize a payload into a frame.
///
/// # Errors
///
/// Returns `FrameTooLarge` if the payload exceeds [`MAX_FRAME_PAYLOAD`].
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(FrameError::FrameTooLarge {
            size: payload.len(),
        });
    }

    let total_length = FRAME_HEADER_SIZE + payload.len();
    let mut data = Vec::with_capacity(total_length);
    data.extend_from_slice(&(total_length as u32).to_le_bytes());
    data.extend_from_slice(&crc32c::crc32c(payload).to_le_bytes());
    data.extend_from_slice(payload);
    Ok(data)
}

/// Try to decode one frame from a buffer that may contain partial data.
///
/// # Returns
///
/// - `Ok(Some((payload, consumed)))` if a complete frame was parsed
/// - `Ok(None)` if more data is needed (not an error condition)
/// - `Err` if the data is malformed
pub fn try_decode_frame(data: &[u8]) -> Result<Option<(Vec<u8>, usize)>, FrameError> {
    if data.len() < FRAME_HEADER_SIZE {
        return Ok(None); // Need more data for header
    }

    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let checksum = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

    if (length as usize) < FRAME_HEADER_SIZE {
        return Err(FrameError::InvalidLength { length });
    }
    let expected_len = length as usize;
    if expected_len - FRAME_HEADER_SIZE > MAX_FRAME_PAYLOAD {
        return Err(FrameError::FrameTooLarge {
            size: expected_len - FRAME_HEADER_SIZE,
        });
    }
    if data.len() < expected_len {
        return Ok(None); // Need more data for payload
    }

    let payload = &data[FRAME_HEADER_SIZE..expected_len];

    let computed = crc32c::crc32c(payload);
    if computed != checksum {
        return Err(FrameError::ChecksumMismatch {
            expected: checksum,
            actual: computed,
        });
    }

    Ok(Some((payload.to_vec(), expected_len)))
}
