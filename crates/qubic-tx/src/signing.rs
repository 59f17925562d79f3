//! Signing boundary used by the builder and submission APIs.

use thiserror::Error;
use zeroize::Zeroizing;

use crate::{
    digest::DIGEST_LEN,
    error::ErrorKind,
    fourq,
    identity::{Identity, Seed},
};

/// Signature size in bytes.
pub const SIGNATURE_LEN: usize = fourq::SIGNATURE_LEN;

/// Signing-layer errors.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum SigningError {
    /// Signer key does not belong to the transaction source.
    #[error("signer key {actual} does not match source identity {expected}")]
    KeyMismatch {
        /// Source identity named in the envelope.
        expected: Identity,
        /// Identity derived from the signer key.
        actual: Identity,
    },
    /// Signature primitive failed.
    #[error("failed to sign digest: {message}")]
    Sign {
        /// Human-readable description.
        message: String,
    },
    /// Signature did not verify against the given key.
    #[error("signature verification failed: {message}")]
    Verify {
        /// Human-readable description.
        message: String,
    },
}

impl SigningError {
    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Signing
    }
}

/// Produces signatures over 32-byte transaction digests.
pub trait TransactionSigner: Send + Sync {
    /// Identity whose key produces the signatures.
    fn identity(&self) -> Identity;

    /// Signs one transaction digest.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::Sign`] when the signature primitive fails.
    fn sign_digest(&self, digest: &[u8; DIGEST_LEN]) -> Result<[u8; SIGNATURE_LEN], SigningError>;
}

/// SchnorrQ signer whose key is derived from a seed.
///
/// Holds the subseed, which both the private key and the signing nonce derive from; the seed
/// letters are not retained.
pub struct SeedSigner {
    /// Seed-derived secret, zeroized on drop.
    subseed: Zeroizing<[u8; DIGEST_LEN]>,
    /// Encoded FourQ public key.
    public_key: [u8; 32],
}

impl SeedSigner {
    /// Derives a signer from seed material.
    #[must_use]
    pub fn from_seed(seed: &Seed) -> Self {
        Self {
            subseed: seed.subseed(),
            public_key: fourq::public_key(&seed.private_key()),
        }
    }

    /// Verifies `signature` over `digest` against `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::Verify`] when the identity is not a valid curve point or the
    /// signature does not match.
    pub fn verify_digest(
        identity: &Identity,
        digest: &[u8; DIGEST_LEN],
        signature: &[u8; SIGNATURE_LEN],
    ) -> Result<(), SigningError> {
        if fourq::verify(identity.as_bytes(), digest, signature) {
            Ok(())
        } else {
            Err(SigningError::Verify {
                message: format!("signature does not match {identity}"),
            })
        }
    }
}

impl TransactionSigner for SeedSigner {
    fn identity(&self) -> Identity {
        Identity::from_bytes(self.public_key)
    }

    fn sign_digest(&self, digest: &[u8; DIGEST_LEN]) -> Result<[u8; SIGNATURE_LEN], SigningError> {
        Ok(fourq::sign(&self.subseed, &self.public_key, digest))
    }
}

impl std::fmt::Debug for SeedSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedSigner")
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(fill: char) -> Seed {
        fill.to_string()
            .repeat(crate::identity::SEED_LEN)
            .parse()
            .expect("valid seed")
    }

    #[test]
    fn signatures_verify_against_derived_identity() {
        let signer = SeedSigner::from_seed(&seed('q'));
        let digest = [7_u8; DIGEST_LEN];
        let signature = signer.sign_digest(&digest).expect("sign");

        assert!(SeedSigner::verify_digest(&signer.identity(), &digest, &signature).is_ok());
        let other = [8_u8; DIGEST_LEN];
        assert!(SeedSigner::verify_digest(&signer.identity(), &other, &signature).is_err());
    }

    #[test]
    fn known_seeds_derive_network_identities() {
        let wallet: Seed = "xpsxzzfqvaohzzwlbofvqkqeemzhnrscpeeokoumekfodtgzmwghtqm"
            .parse()
            .expect("valid seed");
        assert_eq!(
            SeedSigner::from_seed(&wallet).identity().to_string(),
            "EQMBBVYGZOFUIHEXFOXKTFTANEKBXLBXHAYDFFMREEMRQEVADYMMEWACTODD"
        );
        assert_eq!(
            SeedSigner::from_seed(&seed('a')).identity().to_string(),
            "BZBQFLLBNCXEMGLOBHUVFTLUPLVCPQUASSILFABOFFBCADQSSUPNWLZBQEXK"
        );
    }

    #[test]
    fn signing_is_deterministic_and_bound_to_the_key() {
        let signer = SeedSigner::from_seed(&seed('m'));
        let digest = [3_u8; DIGEST_LEN];
        let first = signer.sign_digest(&digest).expect("sign");
        let second = signer.sign_digest(&digest).expect("sign");
        assert_eq!(first, second);

        let stranger = SeedSigner::from_seed(&seed('n'));
        assert!(SeedSigner::verify_digest(&stranger.identity(), &digest, &first).is_err());

        let mut tampered = first;
        tampered[0] ^= 0x01;
        assert!(SeedSigner::verify_digest(&signer.identity(), &digest, &tampered).is_err());
    }

    #[test]
    fn distinct_seeds_yield_distinct_identities() {
        let first = SeedSigner::from_seed(&seed('a'));
        let second = SeedSigner::from_seed(&seed('b'));
        assert_ne!(first.identity(), second.identity());
    }

    #[test]
    fn debug_output_omits_key_material() {
        let signer = SeedSigner::from_seed(&seed('z'));
        let rendered = format!("{signer:?}");
        assert!(rendered.starts_with("SeedSigner"));
        assert!(rendered.contains(&signer.identity().to_string()));
    }
}
