//! # Timestamp Identifiers (record keys)
//!
//! A TID packs a microsecond timestamp and 10 random bits into a `u64`:
//!
//! ```text
//! [ 54 bits: microseconds since Unix epoch ][ 10 bits: random ]
//! ```
//!
//! rendered as the 8-byte big-endian value in lowercase RFC 4648 base-32,
//! padding stripped: always 13 characters from `[a-z2-7]`.
//!
//! ## Ordering
//!
//! Within one process, generated timestamps are strictly increasing: if the
//! clock has not advanced since the previous TID, the timestamp is bumped by
//! one microsecond. Two TIDs from the same process therefore never collide,
//! and `Tid`'s `Ord` is chronological.
//!
//! Raw string comparison is NOT a reliable substitute. The RFC 4648 alphabet
//! puts `2`-`7` after `z` in value order but before `a` in ASCII, so two
//! rkeys whose first differing character straddles that boundary compare the
//! wrong way round. Sort `Tid`s, not strings.

use crate::cid::is_base32_lower;
use crate::primitives::{
    TID_LENGTH, TID_PADDING, TID_RANDOM_BITS, TID_RANDOM_MASK, TID_TIMESTAMP_MASK,
};
use crate::NbhdError;
use data_encoding::{BASE32, BASE32_NOPAD, Encoding, SpecificationError};
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Standard base-32 that ignores the one trailing bit left over when 13
/// characters (65 bits) carry a 64-bit value.
static DECODER: LazyLock<Result<Encoding, SpecificationError>> = LazyLock::new(|| {
    let mut spec = BASE32.specification();
    spec.check_trailing_bits = false;
    spec.encoding()
});

/// Last timestamp handed out by [`Tid::now`].
static LAST_TIMESTAMP_US: AtomicU64 = AtomicU64::new(0);

/// A timestamp identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(u64);

impl Tid {
    /// Generate a TID for the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let timestamp = next_timestamp_us(wall_clock_us());
        let random = rand::thread_rng().gen_range(0..=TID_RANDOM_MASK as u16);
        Self::from_parts(timestamp, random)
    }

    /// Pack a timestamp and random component.
    ///
    /// The timestamp is truncated to 54 bits and the random part to 10.
    #[must_use]
    pub const fn from_parts(timestamp_us: u64, random_bits: u16) -> Self {
        Self(
            ((timestamp_us & TID_TIMESTAMP_MASK) << TID_RANDOM_BITS)
                | (random_bits as u64 & TID_RANDOM_MASK),
        )
    }

    /// Wrap an already packed value.
    #[must_use]
    pub const fn from_u64(packed: u64) -> Self {
        Self(packed)
    }

    /// The packed 64-bit value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Microseconds since the Unix epoch.
    #[must_use]
    pub const fn timestamp_us(self) -> u64 {
        self.0 >> TID_RANDOM_BITS
    }

    /// The random component, in `[0, 1024)`.
    #[must_use]
    pub const fn random_bits(self) -> u16 {
        (self.0 & TID_RANDOM_MASK) as u16
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = BASE32_NOPAD.encode(&self.0.to_be_bytes());
        f.write_str(&encoded.to_ascii_lowercase())
    }
}

impl FromStr for Tid {
    type Err = NbhdError;

    fn from_str(rkey: &str) -> Result<Self, Self::Err> {
        if rkey.is_empty() {
            return Err(NbhdError::MalformedIdentifier(
                "rkey must be a non-empty string".to_string(),
            ));
        }
        if !validate_rkey(rkey) {
            return Err(NbhdError::MalformedIdentifier(format!(
                "invalid TID format: {rkey}"
            )));
        }

        let mut padded = rkey.to_ascii_uppercase();
        padded.push_str(TID_PADDING);

        let decoder = DECODER.as_ref().map_err(|e| {
            NbhdError::MalformedIdentifier(format!("base-32 decoder unavailable: {e}"))
        })?;
        let bytes = decoder.decode(padded.as_bytes()).map_err(|e| {
            NbhdError::MalformedIdentifier(format!("failed to decode base32 TID {rkey}: {e}"))
        })?;
        let bytes: [u8; 8] = bytes.try_into().map_err(|b: Vec<u8>| {
            NbhdError::MalformedIdentifier(format!(
                "TID {rkey} decodes to {} bytes, expected 8",
                b.len()
            ))
        })?;

        Ok(Self(u64::from_be_bytes(bytes)))
    }
}

// =============================================================================
// FUNCTIONS
// =============================================================================

/// Generate a record key for the current time.
#[must_use]
pub fn generate_rkey() -> String {
    Tid::now().to_string()
}

/// Extract the microsecond timestamp from a record key.
///
/// # Errors
///
/// Returns `NbhdError::MalformedIdentifier` on wrong length, wrong charset,
/// or undecodable base-32.
pub fn extract_tid_timestamp(rkey: &str) -> Result<u64, NbhdError> {
    Ok(rkey.parse::<Tid>()?.timestamp_us())
}

/// Extract `(timestamp_us, random_bits)` from a record key.
pub fn extract_tid_components(rkey: &str) -> Result<(u64, u16), NbhdError> {
    let tid = rkey.parse::<Tid>()?;
    Ok((tid.timestamp_us(), tid.random_bits()))
}

/// Format check only: exactly 13 characters from `[a-z2-7]`.
#[must_use]
pub fn validate_rkey(rkey: &str) -> bool {
    rkey.len() == TID_LENGTH && rkey.bytes().all(is_base32_lower)
}

fn wall_clock_us() -> u64 {
    chrono::Utc::now().timestamp_micros().max(0) as u64
}

/// Return `now`, or one past the last issued timestamp if the clock has not
/// moved past it.
fn next_timestamp_us(now: u64) -> u64 {
    let mut last = LAST_TIMESTAMP_US.load(Ordering::Relaxed);
    loop {
        let next = now.max(last.saturating_add(1));
        match LAST_TIMESTAMP_US.compare_exchange_weak(
            last,
            next,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
