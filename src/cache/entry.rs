//! Entry Record Layout
//!
//! Entries are serialized into the shard arena as one contiguous block:
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────┬───────────┬─────────────┐
//! │ timestamp u64│ fingerprint  │ key_len  │ key bytes │ value bytes │
//! │ (ms, LE)     │ u64 (LE)     │ u16 (LE) │           │             │
//! └──────────────┴──────────────┴──────────┴───────────┴─────────────┘
//! ```
//!
//! The arena adds its own length prefix around this record, so the value
//! length is implied by the block length.

const TIMESTAMP_SIZE: usize = 8;
const FINGERPRINT_SIZE: usize = 8;
const KEY_LEN_SIZE: usize = 2;

/// Fixed header size preceding key and value bytes
pub const ENTRY_HEADER_SIZE: usize = TIMESTAMP_SIZE + FINGERPRINT_SIZE + KEY_LEN_SIZE;

/// Longest key the header can describe
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Serialized size of an entry
#[inline]
pub fn encoded_len(key_len: usize, value_len: usize) -> usize {
    ENTRY_HEADER_SIZE + key_len + value_len
}

/// Serialize an entry into `buf`, replacing its previous contents.
///
/// Keys longer than [`MAX_KEY_LEN`] must be rejected by the caller.
pub fn encode_into(buf: &mut Vec<u8>, timestamp: u64, fingerprint: u64, key: &[u8], value: &[u8]) {
    debug_assert!(key.len() <= MAX_KEY_LEN);
    buf.clear();
    buf.reserve(encoded_len(key.len(), value.len()));
    buf.extend_from_slice(&timestamp.to_le_bytes());
    buf.extend_from_slice(&fingerprint.to_le_bytes());
    buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
}

/// Serialize an entry over an existing block of exactly the encoded length
pub fn overwrite(dst: &mut [u8], timestamp: u64, fingerprint: u64, key: &[u8], value: &[u8]) {
    debug_assert_eq!(dst.len(), encoded_len(key.len(), value.len()));
    let key_start = ENTRY_HEADER_SIZE;
    let value_start = key_start + key.len();
    dst[..TIMESTAMP_SIZE].copy_from_slice(&timestamp.to_le_bytes());
    dst[TIMESTAMP_SIZE..TIMESTAMP_SIZE + FINGERPRINT_SIZE].copy_from_slice(&fingerprint.to_le_bytes());
    dst[TIMESTAMP_SIZE + FINGERPRINT_SIZE..key_start].copy_from_slice(&(key.len() as u16).to_le_bytes());
    dst[key_start..value_start].copy_from_slice(key);
    dst[value_start..].copy_from_slice(value);
}

/// Borrowed view over a serialized entry
#[derive(Debug, Clone, Copy)]
pub struct EntryView<'a> {
    bytes: &'a [u8],
    key_len: usize,
}

impl<'a> EntryView<'a> {
    /// Parse a block. Returns `None` when the header or key length does
    /// not fit in the block.
    pub fn parse(bytes: &'a [u8]) -> Option<Self> {
        if bytes.len() < ENTRY_HEADER_SIZE {
            return None;
        }
        let key_len = read_u16(bytes, TIMESTAMP_SIZE + FINGERPRINT_SIZE) as usize;
        if ENTRY_HEADER_SIZE + key_len > bytes.len() {
            return None;
        }
        Some(Self { bytes, key_len })
    }

    /// Insertion time in milliseconds since the Unix epoch
    #[inline]
    pub fn timestamp(&self) -> u64 {
        read_u64(self.bytes, 0)
    }

    /// Stored key fingerprint
    #[inline]
    pub fn fingerprint(&self) -> u64 {
        read_u64(self.bytes, TIMESTAMP_SIZE)
    }

    /// Stored key bytes (empty when keys are not stored)
    #[inline]
    pub fn key(&self) -> &'a [u8] {
        &self.bytes[ENTRY_HEADER_SIZE..ENTRY_HEADER_SIZE + self.key_len]
    }

    /// Value bytes
    #[inline]
    pub fn value(&self) -> &'a [u8] {
        &self.bytes[ENTRY_HEADER_SIZE + self.key_len..]
    }

    /// Age relative to `now`, saturating at zero for entries stamped in the future
    #[inline]
    pub fn age_millis(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp())
    }
}

#[inline]
fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

#[inline]
fn read_u16(bytes: &[u8], at: usize) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(&bytes[at..at + 2]);
    u16::from_le_bytes(raw)
}

// =============================================================================
// Tests
// =============================================================================
