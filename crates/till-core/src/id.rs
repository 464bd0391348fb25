//! Record id generation.
//!
//! `<base-36 unix millis><8 random base-36 chars>`, e.g. `mkx3q1z0a7k2p9rd`.
//! Roughly time-ordered and practically unique. Two ids generated in the
//! same millisecond can still collide, so callers that need a hard
//! guarantee must rely on the table's primary key constraint.

use chrono::Utc;
use rand::Rng;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random suffix.
pub const SUFFIX_LEN: usize = 8;

/// Generates an id for a record created without one.
pub fn generate_id() -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    let mut id = to_base36(millis);

    let mut rng = rand::rng();
    id.extend((0..SUFFIX_LEN).map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())])));
    id
}

/// Lower-case base-36 rendering of `value`.
pub fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}
