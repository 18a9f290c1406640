use validator::Validate;

use crate::domain::stats::{MAX_RATING, MIN_RATING};

/// Limits and the reserved-name list used by [`PlayerValidator`].
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub username_min_length: usize,
    pub username_max_length: usize,
    pub reserved_usernames: Vec<String>,
    pub email_max_length: usize,
    pub password_min_length: usize,
    pub password_max_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            username_min_length: 3,
            username_max_length: 50,
            reserved_usernames: ["admin", "system", "anonymous", "guest", "moderator"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            email_max_length: 100,
            password_min_length: 8,
            password_max_length: 128,
        }
    }
}

impl ValidationConfig {
    /// Defaults, with the reserved list replaced by `RESERVED_USERNAMES`
    /// (comma separated) when that variable is set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(reserved) = std::env::var("RESERVED_USERNAMES") {
            config.reserved_usernames = reserved
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRequirement {
    Length,
    Uppercase,
    Lowercase,
    Digit,
}

impl std::fmt::Display for PasswordRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordRequirement::Length => write!(f, "length"),
            PasswordRequirement::Uppercase => write!(f, "uppercase letter"),
            PasswordRequirement::Lowercase => write!(f, "lowercase letter"),
            PasswordRequirement::Digit => write!(f, "digit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid {field}: {reason}")]
    Format { field: &'static str, reason: String },
    #[error("username '{0}' is reserved")]
    ReservedName(String),
    #[error("weak password: missing {0}")]
    WeakPassword(PasswordRequirement),
    #[error("rating {0} is out of range")]
    RatingOutOfRange(i64),
}

impl ValidationError {
    fn format(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Format {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Validate)]
struct EmailValidator {
    #[validate(email)]
    email: String,
}

pub fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

pub struct PlayerValidator {
    config: ValidationConfig,
}

impl PlayerValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn validate_username(&self, username: &str) -> Result<(), ValidationError> {
        let length = username.chars().count();
        if length < self.config.username_min_length || length > self.config.username_max_length
        {
            return Err(ValidationError::format(
                "username",
                format!(
                    "length must be between {} and {}",
                    self.config.username_min_length, self.config.username_max_length
                ),
            ));
        }
        if !username.chars().all(is_username_char) {
            return Err(ValidationError::format(
                "username",
                "only letters, digits, '_' and '-' are allowed",
            ));
        }
        let lower = username.to_lowercase();
        if self
            .config
            .reserved_usernames
            .iter()
            .any(|reserved| reserved.to_lowercase() == lower)
        {
            return Err(ValidationError::ReservedName(username.to_string()));
        }
        Ok(())
    }

    pub fn validate_email(&self, email: &str) -> Result<(), ValidationError> {
        if email.chars().count() > self.config.email_max_length {
            return Err(ValidationError::format(
                "email",
                format!("must be at most {} characters", self.config.email_max_length),
            ));
        }
        let validator = EmailValidator {
            email: email.to_string(),
        };
        if validator.validate().is_err() {
            return Err(ValidationError::format("email", "malformed address"));
        }
        // the validator accepts bare hosts, a top level domain is required here
        let has_tld = email
            .rsplit_once('@')
            .and_then(|(_, domain)| domain.rsplit_once('.'))
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty());
        if !has_tld {
            return Err(ValidationError::format("email", "missing top level domain"));
        }
        Ok(())
    }

    pub fn validate_password(&self, password: &str) -> Result<(), ValidationError> {
        let length = password.chars().count();
        if length < self.config.password_min_length || length > self.config.password_max_length
        {
            return Err(ValidationError::WeakPassword(PasswordRequirement::Length));
        }
        let analyzed = passwords::analyzer::analyze(password);
        if analyzed.uppercase_letters_count() == 0 {
            return Err(ValidationError::WeakPassword(PasswordRequirement::Uppercase));
        }
        if analyzed.lowercase_letters_count() == 0 {
            return Err(ValidationError::WeakPassword(PasswordRequirement::Lowercase));
        }
        if analyzed.numbers_count() == 0 {
            return Err(ValidationError::WeakPassword(PasswordRequirement::Digit));
        }
        Ok(())
    }

    pub fn validate_rating(&self, rating: i64) -> Result<(), ValidationError> {
        if rating < MIN_RATING as i64 || rating > MAX_RATING as i64 {
            return Err(ValidationError::RatingOutOfRange(rating));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> PlayerValidator {
        PlayerValidator::new(ValidationConfig::default())
    }

    #[test]
    fn test_username_rules() {
        let v = validator();
        assert!(v.validate_username("abc").is_ok());
        assert!(v.validate_username("Player_One-2").is_ok());
        assert!(v.validate_username(&"a".repeat(50)).is_ok());

        assert!(matches!(
            v.validate_username("ab"),
            Err(ValidationError::Format { .. })
        ));
        assert!(matches!(
            v.validate_username(&"a".repeat(51)),
            Err(ValidationError::Format { .. })
        ));
        assert!(matches!(
            v.validate_username("has space"),
            Err(ValidationError::Format { .. })
        ));
        assert!(matches!(
            v.validate_username("ünïcode"),
            Err(ValidationError::Format { .. })
        ));
    }

    #[test]
    fn test_reserved_usernames_are_case_insensitive() {
        let v = validator();
        for name in ["admin", "ADMIN", "System", "anonymous", "gUeSt", "Moderator"] {
            assert_eq!(
                v.validate_username(name),
                Err(ValidationError::ReservedName(name.to_string()))
            );
        }
        assert!(v.validate_username("admin2").is_ok());
    }

    #[test]
    fn test_reserved_list_comes_from_config() {
        let v = PlayerValidator::new(ValidationConfig {
            reserved_usernames: vec!["root".to_string()],
            ..ValidationConfig::default()
        });
        assert!(v.validate_username("admin").is_ok());
        assert!(matches!(
            v.validate_username("Root"),
            Err(ValidationError::ReservedName(_))
        ));
    }

    #[test]
    fn test_email_rules() {
        let v = validator();
        assert!(v.validate_email("someone@example.com").is_ok());
        assert!(v.validate_email("first.last@mail.example.org").is_ok());

        assert!(v.validate_email("no-at-sign.com").is_err());
        assert!(v.validate_email("someone@localhost").is_err());
        assert!(v.validate_email("@example.com").is_err());
        let long = format!("{}@example.com", "a".repeat(100));
        assert!(v.validate_email(&long).is_err());
    }

    #[test]
    fn test_password_rules() {
        let v = validator();
        assert!(v.validate_password("Passw0rd").is_ok());
        assert_eq!(
            v.validate_password("Pa0"),
            Err(ValidationError::WeakPassword(PasswordRequirement::Length))
        );
        assert_eq!(
            v.validate_password(&format!("Aa1{}", "x".repeat(126))),
            Err(ValidationError::WeakPassword(PasswordRequirement::Length))
        );
        assert_eq!(
            v.validate_password("password1"),
            Err(ValidationError::WeakPassword(PasswordRequirement::Uppercase))
        );
        assert_eq!(
            v.validate_password("PASSWORD1"),
            Err(ValidationError::WeakPassword(PasswordRequirement::Lowercase))
        );
        assert_eq!(
            v.validate_password("Passwords"),
            Err(ValidationError::WeakPassword(PasswordRequirement::Digit))
        );
    }

    #[test]
    fn test_rating_bounds() {
        let v = validator();
        assert!(v.validate_rating(0).is_ok());
        assert!(v.validate_rating(5000).is_ok());
        assert_eq!(
            v.validate_rating(-1),
            Err(ValidationError::RatingOutOfRange(-1))
        );
        assert_eq!(
            v.validate_rating(5001),
            Err(ValidationError::RatingOutOfRange(5001))
        );
    }
}
