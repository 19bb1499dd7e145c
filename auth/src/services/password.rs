use anyhow::{anyhow, Result};

/// Wraps the bcrypt primitive behind the narrow interface the user handlers
/// need. One instance lives on the `AuthModule`.
#[derive(Clone)]
pub struct CredentialHasher {
    cost: u32,
}

impl CredentialHasher {
    pub fn new() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Lower costs are only appropriate in tests.
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.cost).map_err(|e| anyhow!("failed to hash password: {}", e))
    }

    /// Verification failure and a malformed hash both read as a mismatch;
    /// the caller only ever learns yes or no.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let hasher = CredentialHasher::with_cost(4);
        let hash = hasher.hash("hunter22").unwrap();

        assert!(hasher.verify("hunter22", &hash));
        assert!(!hasher.verify("hunter2", &hash));
    }

    #[test]
    fn malformed_hash_reads_as_mismatch() {
        let hasher = CredentialHasher::with_cost(4);
        assert!(!hasher.verify("hunter22", "not-a-bcrypt-hash"));
    }
}
