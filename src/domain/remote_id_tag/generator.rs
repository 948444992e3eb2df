//! Random tag generation
//!
//! Uses a general-purpose RNG (`rand::thread_rng`), not a cryptographic
//! source.

use rand::Rng;

use super::RemoteIdTag;

/// Length of every generated tag.
pub const GENERATED_TAG_LENGTH: usize = 20;

/// Alphabet generated tags are drawn from.
pub const TAG_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a fresh 20-character tag over `A-Z0-9`.
pub fn generate() -> RemoteIdTag {
    generate_with(&mut rand::thread_rng())
}

/// Generate a tag from the given random source.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> RemoteIdTag {
    let value: String = (0..GENERATED_TAG_LENGTH)
        .map(|_| TAG_ALPHABET[rng.gen_range(0..TAG_ALPHABET.len())] as char)
        .collect();
    RemoteIdTag::new_unchecked(value)
}
