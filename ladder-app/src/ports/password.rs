/// Hashing lives outside the core; registration only needs a hash string.
pub trait PasswordHasher {
    fn hash_password(&self, password: &str) -> Result<String, PasswordHashError>;
}

#[derive(Debug)]
pub struct PasswordHashError(pub String);

impl std::fmt::Display for PasswordHashError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Password hashing failed: {}", self.0)
    }
}
