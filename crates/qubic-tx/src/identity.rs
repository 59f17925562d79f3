//! Account identities and seed material.
//!
//! An identity is a 32-byte public key rendered as 60 letters: four little-endian `u64`
//! fragments written as 14 base-26 digits each (least significant digit first), followed by a
//! 4-letter checksum taken from the low 18 bits of a 3-byte KangarooTwelve digest of the key.

use std::{fmt, str::FromStr};

use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::{
    digest::{DIGEST_LEN, k12},
    error::ErrorKind,
};

/// Public key size in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;
/// Identity text length in characters.
pub const IDENTITY_LEN: usize = 60;
/// Seed text length in characters.
pub const SEED_LEN: usize = 55;

/// Base-26 digits per 8-byte key fragment.
const FRAGMENT_DIGITS: usize = 14;
/// Letters carrying the key fragments, checksum excluded.
const BODY_LEN: usize = FRAGMENT_DIGITS * (PUBLIC_KEY_LEN / 8);
/// Checksum letters appended after the body.
const CHECKSUM_DIGITS: usize = 4;
/// Mask applied to the 3-byte checksum digest.
const CHECKSUM_MASK: u32 = 0x3_FFFF;
/// Alphabet radix.
const RADIX: u64 = 26;

/// Identity parsing failures.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum IdentityError {
    /// Text is not exactly [`IDENTITY_LEN`] bytes.
    #[error("identity must be {IDENTITY_LEN} characters, got {actual}")]
    InvalidLength {
        /// Observed length in bytes.
        actual: usize,
    },
    /// A character outside `A`..`Z` was found.
    #[error("identity contains invalid character {character:?} at position {position}")]
    InvalidCharacter {
        /// Zero-based byte position.
        position: usize,
        /// Offending character.
        character: char,
    },
    /// A fragment decodes to a value wider than 64 bits.
    #[error("identity fragment {fragment} overflows 64 bits")]
    FragmentOverflow {
        /// Zero-based fragment index.
        fragment: usize,
    },
    /// Checksum letters do not match the decoded key.
    #[error("identity checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch {
        /// Checksum computed from the decoded key.
        expected: String,
        /// Checksum present in the text.
        found: String,
    },
}

impl IdentityError {
    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Ledger account address backed by a 32-byte public key.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct Identity {
    /// Raw public key bytes.
    key: [u8; PUBLIC_KEY_LEN],
}

impl Identity {
    /// Wraps raw public key bytes.
    #[must_use]
    pub const fn from_bytes(key: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self { key }
    }

    /// Returns the address of the contract deployed at `contract_index`.
    #[must_use]
    pub fn contract(contract_index: u32) -> Self {
        let mut key = [0_u8; PUBLIC_KEY_LEN];
        if let Some(head) = key.get_mut(..4) {
            head.copy_from_slice(&contract_index.to_le_bytes());
        }
        Self { key }
    }

    /// Returns the raw public key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.key
    }

    /// Renders the identity with lowercase letters, as used for hash display.
    #[must_use]
    pub fn to_lowercase_string(&self) -> String {
        encode(&self.key, b'a')
    }

    /// Renders a 32-byte digest the way the network displays transaction ids.
    #[must_use]
    pub fn digest_display(digest: &[u8; DIGEST_LEN]) -> String {
        encode(digest, b'a')
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bytes = text.as_bytes();
        if bytes.len() != IDENTITY_LEN {
            return Err(IdentityError::InvalidLength {
                actual: bytes.len(),
            });
        }
        let (body, checksum) = bytes.split_at(BODY_LEN);

        let mut key = [0_u8; PUBLIC_KEY_LEN];
        for (fragment, (letters, out)) in body
            .chunks_exact(FRAGMENT_DIGITS)
            .zip(key.chunks_exact_mut(8))
            .enumerate()
        {
            let mut value = 0_u64;
            for (offset, letter) in letters.iter().enumerate().rev() {
                let position = fragment
                    .saturating_mul(FRAGMENT_DIGITS)
                    .saturating_add(offset);
                let digit = letter_value(*letter, position)?;
                value = value
                    .checked_mul(RADIX)
                    .and_then(|value| value.checked_add(digit))
                    .ok_or(IdentityError::FragmentOverflow { fragment })?;
            }
            out.copy_from_slice(&value.to_le_bytes());
        }

        let expected = checksum_letters(&key, b'A');
        if checksum != expected.as_slice() {
            return Err(IdentityError::ChecksumMismatch {
                expected: String::from_utf8_lossy(&expected).into_owned(),
                found: String::from_utf8_lossy(checksum).into_owned(),
            });
        }
        Ok(Self { key })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(&self.key, b'A'))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Identity").field(&self.to_string()).finish()
    }
}

/// Maps an uppercase letter to its base-26 digit.
fn letter_value(letter: u8, position: usize) -> Result<u64, IdentityError> {
    if letter.is_ascii_uppercase() {
        Ok(u64::from(letter.saturating_sub(b'A')))
    } else {
        Err(IdentityError::InvalidCharacter {
            position,
            character: char::from(letter),
        })
    }
}

/// Encodes key bytes into identity letters starting at `base`.
fn encode(key: &[u8; PUBLIC_KEY_LEN], base: u8) -> String {
    let mut letters = Vec::with_capacity(IDENTITY_LEN);
    for chunk in key.chunks_exact(8) {
        let mut word = [0_u8; 8];
        word.copy_from_slice(chunk);
        let mut fragment = u64::from_le_bytes(word);
        for _ in 0..FRAGMENT_DIGITS {
            letters.push(digit_letter(fragment % RADIX, base));
            fragment /= RADIX;
        }
    }
    letters.extend_from_slice(&checksum_letters(key, base));
    String::from_utf8_lossy(&letters).into_owned()
}

/// Computes the checksum suffix for `key`.
fn checksum_letters(key: &[u8; PUBLIC_KEY_LEN], base: u8) -> [u8; CHECKSUM_DIGITS] {
    let [first, second, third] = k12::<3>(key);
    let mut checksum = u64::from(u32::from_le_bytes([first, second, third, 0]) & CHECKSUM_MASK);
    let mut letters = [0_u8; CHECKSUM_DIGITS];
    for letter in &mut letters {
        *letter = digit_letter(checksum % RADIX, base);
        checksum /= RADIX;
    }
    letters
}

/// Converts a digit below [`RADIX`] into a letter.
fn digit_letter(digit: u64, base: u8) -> u8 {
    base.saturating_add(u8::try_from(digit).unwrap_or(0))
}

/// Seed parsing failures. Never carries seed characters.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum SeedError {
    /// Seed is not exactly [`SEED_LEN`] bytes.
    #[error("seed must be {SEED_LEN} characters, got {actual}")]
    InvalidLength {
        /// Observed length in bytes.
        actual: usize,
    },
    /// Seed contains a character outside `a`..`z`.
    #[error("seed contains a character outside a-z at position {position}")]
    InvalidCharacter {
        /// Zero-based byte position.
        position: usize,
    },
}

impl SeedError {
    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Secret 55-letter seed. Wiped on drop and redacted from `Debug`.
pub struct Seed {
    /// Seed letters mapped to `0..26`.
    letters: [u8; SEED_LEN],
}

impl Seed {
    /// Derives the 32-byte subseed.
    #[must_use]
    pub fn subseed(&self) -> Zeroizing<[u8; DIGEST_LEN]> {
        Zeroizing::new(k12::<DIGEST_LEN>(&self.letters))
    }

    /// Derives the 32-byte private key from the subseed.
    #[must_use]
    pub fn private_key(&self) -> Zeroizing<[u8; DIGEST_LEN]> {
        let subseed = self.subseed();
        Zeroizing::new(k12::<DIGEST_LEN>(subseed.as_slice()))
    }
}

impl FromStr for Seed {
    type Err = SeedError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bytes = text.as_bytes();
        if bytes.len() != SEED_LEN {
            return Err(SeedError::InvalidLength {
                actual: bytes.len(),
            });
        }
        let mut letters = [0_u8; SEED_LEN];
        for (position, (out, letter)) in letters.iter_mut().zip(bytes).enumerate() {
            if !letter.is_ascii_lowercase() {
                letters.zeroize();
                return Err(SeedError::InvalidCharacter { position });
            }
            *out = letter.saturating_sub(b'a');
        }
        Ok(Self { letters })
    }
}

impl Drop for Seed {
    fn drop(&mut self) {
        self.letters.zeroize();
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT_12: &str = "MAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWLWD";
    const SEED: &str = "xpsxzzfqvaohzzwlbofvqkqeemzhnrscpeeokoumekfodtgzmwghtqm";

    #[test]
    fn parses_contract_address() {
        let identity = CONTRACT_12.parse::<Identity>();
        assert!(identity.is_ok());
        if let Ok(identity) = identity {
            assert_eq!(identity, Identity::contract(12));
            assert_eq!(identity.as_bytes()[0], 12);
            assert!(identity.as_bytes()[1..].iter().all(|byte| *byte == 0));
        }
    }

    #[test]
    fn display_renders_canonical_text() {
        assert_eq!(Identity::contract(12).to_string(), CONTRACT_12);
    }

    #[test]
    fn text_round_trips_for_arbitrary_keys() {
        let mut key = [0_u8; PUBLIC_KEY_LEN];
        for (index, byte) in key.iter_mut().enumerate() {
            *byte = (index as u8).wrapping_mul(37).wrapping_add(11);
        }
        let identity = Identity::from_bytes(key);
        let parsed = identity.to_string().parse::<Identity>();
        assert_eq!(parsed, Ok(identity));
    }

    #[test]
    fn rejects_bad_checksum() {
        let tampered = format!("{}WLWE", &CONTRACT_12[..56]);
        let error = tampered.parse::<Identity>().expect_err("checksum must fail");
        assert!(matches!(error, IdentityError::ChecksumMismatch { .. }));
        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[test]
    fn rejects_wrong_length_and_lowercase() {
        assert_eq!(
            "ABC".parse::<Identity>(),
            Err(IdentityError::InvalidLength { actual: 3 })
        );
        let lowercase = CONTRACT_12.to_lowercase();
        assert!(matches!(
            lowercase.parse::<Identity>(),
            Err(IdentityError::InvalidCharacter { position: 0, .. })
        ));
    }

    #[test]
    fn rejects_overflowing_fragment() {
        let text = format!("{}{}", "Z".repeat(56), "AAAA");
        assert_eq!(
            text.parse::<Identity>(),
            Err(IdentityError::FragmentOverflow { fragment: 0 })
        );
    }

    #[test]
    fn lowercase_rendering_matches_uppercase() {
        let identity = Identity::contract(7);
        assert_eq!(identity.to_lowercase_string().to_uppercase(), identity.to_string());
    }

    #[test]
    fn seed_validation_and_redaction() {
        let seed = SEED.parse::<Seed>().expect("valid seed");
        assert_eq!(format!("{seed:?}"), "Seed(<redacted>)");
        assert_ne!(*seed.private_key(), *seed.subseed());

        assert_eq!(
            "abc".parse::<Seed>().map(|_| ()),
            Err(SeedError::InvalidLength { actual: 3 })
        );
        let uppercase = SEED.to_uppercase();
        assert_eq!(
            uppercase.parse::<Seed>().map(|_| ()),
            Err(SeedError::InvalidCharacter { position: 0 })
        );
    }

    #[test]
    fn seed_derivation_is_deterministic() {
        let first = SEED.parse::<Seed>().expect("valid seed");
        let second = SEED.parse::<Seed>().expect("valid seed");
        assert_eq!(*first.private_key(), *second.private_key());
    }
}
