#![forbid(unsafe_code)]

//! Additive checksum guard for session-persisted payloads.
//!
//! Session storage outlives the values written into it only within one
//! platform session, but nothing stops another process (or a buggy write)
//! from clobbering an entry. Every session payload is therefore stored as
//! `checksum ++ json`, and restoration refuses payloads whose recomputed
//! checksum disagrees with the stored prefix.
//!
//! The checksum is deterministic and non-cryptographic: 16 accumulators
//! summing character code points round-robin, each rendered through a
//! fixed 62-symbol alphabet. It detects corruption, not adversaries.

/// Render alphabet for accumulator residues: `a..z`, `A..Z`, `0..9`.
///
/// 62 symbols, not a power of two. Residues are reduced modulo the
/// alphabet's actual length.
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of accumulator slots, and therefore the checksum width in
/// characters.
pub const CHECKSUM_WIDTH: usize = 16;

/// Compute the fixed-width checksum of `payload`.
///
/// Character `i` contributes its Unicode code point value to accumulator
/// `i % 16`. The output is always exactly [`CHECKSUM_WIDTH`] ASCII
/// characters, for any input including the empty string.
#[must_use]
pub fn checksum(payload: &str) -> String {
    let mut slots = [0u64; CHECKSUM_WIDTH];
    for (index, ch) in payload.chars().enumerate() {
        slots[index % CHECKSUM_WIDTH] += u64::from(u32::from(ch));
    }
    slots
        .iter()
        .map(|slot| ALPHABET[(slot % ALPHABET.len() as u64) as usize] as char)
        .collect()
}

/// Prefix `payload` with its checksum, producing the stored form.
#[must_use]
pub fn seal(payload: &str) -> String {
    let mut sealed = checksum(payload);
    sealed.push_str(payload);
    sealed
}

/// Split a stored value into checksum prefix and payload, verifying the
/// prefix against a fresh checksum of the payload.
///
/// Returns the payload slice on success. Inputs shorter than the checksum
/// width are corrupt by definition.
pub fn open(sealed: &str) -> Result<&str, CorruptPayload> {
    if sealed.len() < CHECKSUM_WIDTH || !sealed.is_char_boundary(CHECKSUM_WIDTH) {
        return Err(CorruptPayload {
            expected: None,
            found: sealed.to_owned(),
        });
    }
    let (prefix, payload) = sealed.split_at(CHECKSUM_WIDTH);
    let expected = checksum(payload);
    if prefix != expected {
        return Err(CorruptPayload {
            expected: Some(expected),
            found: prefix.to_owned(),
        });
    }
    Ok(payload)
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A stored session value failed checksum verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptPayload {
    /// Checksum recomputed from the payload, if the input was long enough
    /// to contain one.
    pub expected: Option<String>,
    /// The prefix (or the whole undersized input) actually found.
    pub found: String,
}

impl std::fmt::Display for CorruptPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.expected {
            Some(expected) => write!(
                f,
                "checksum mismatch: expected {expected:?}, found {:?}",
                self.found
            ),
            None => write!(f, "stored value too short to carry a checksum"),
        }
    }
}

impl std::error::Error for CorruptPayload {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
