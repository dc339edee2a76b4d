/// Password Hashing and Verification
///
/// bcrypt with a per-hash random salt. Digests are self-describing, so the
/// salt and work factor travel with them.

use bcrypt::{hash, verify};

use crate::error::AppError;

/// Plaintext behind the decoy digest used for unknown accounts.
const DECOY_PASSWORD: &str = "decoy-password-for-timing-equalization";

/// Hashes and verifies passwords.
///
/// Holds nothing but the work factor and a decoy digest, so it can be cloned
/// into every worker and used concurrently.
#[derive(Clone)]
pub struct CredentialHasher {
    cost: u32,
    decoy_hash: String,
}

impl CredentialHasher {
    /// # Errors
    /// `Hashing` if bcrypt rejects the cost
    pub fn new(cost: u32) -> Result<Self, AppError> {
        let decoy_hash = hash(DECOY_PASSWORD, cost)?;
        Ok(Self { cost, decoy_hash })
    }

    /// Hash a password with a fresh salt.
    ///
    /// # Errors
    /// `Hashing` if the bcrypt primitive fails
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        Ok(hash(password, self.cost)?)
    }

    /// Verify a password against its digest.
    ///
    /// A mismatch is `Ok(false)`; only a malformed digest is an error.
    pub fn verify(&self, password: &str, digest: &str) -> Result<bool, AppError> {
        Ok(verify(password, digest)?)
    }

    /// Spend the same work as a real `verify` without a real account.
    pub fn dummy_verify(&self, password: &str) {
        let _ = verify(password, &self.decoy_hash);
    }
}
