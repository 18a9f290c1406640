use ladder_app::ports::password::{PasswordHashError, PasswordHasher};

pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptPasswordHasher {
    fn hash_password(&self, password: &str) -> Result<String, PasswordHashError> {
        bcrypt::hash(password, self.cost).map_err(|e| PasswordHashError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verifies() {
        let hasher = BcryptPasswordHasher::new(4);
        let hash = hasher.hash_password("Secret123").unwrap();
        assert_ne!(hash, "Secret123");
        assert!(bcrypt::verify("Secret123", &hash).unwrap());
    }
}
