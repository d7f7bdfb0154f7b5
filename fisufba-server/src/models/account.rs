//! Account field validation
//!
//! Rules follow the account forms: e-mail shape, digits-only phone,
//! bounded display name, bcrypt-compatible password length.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

use super::ValidationError;

const MAX_DISPLAY_NAME_LEN: usize = 255;
const MAX_EMAIL_LEN: usize = 255;
const MAX_PHONE_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 8;
/// bcrypt ignores everything past 72 bytes
const MAX_PASSWORD_LEN: usize = 72;
const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@]+@[^@$]+$").expect("invalid email regex"));

/// Validated display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "display_name" });
        }
        if s.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(ValidationError::TooLong {
                field: "display_name",
                max: MAX_DISPLAY_NAME_LEN,
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated e-mail address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email(String);

impl Email {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "email" });
        }
        if s.len() > MAX_EMAIL_LEN {
            return Err(ValidationError::TooLong {
                field: "email",
                max: MAX_EMAIL_LEN,
            });
        }
        if !EMAIL_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                reason: "must look like name@domain",
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated phone number (digits only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phone(String);

impl Phone {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::with_field(s, "phone")
    }

    /// Same rules, reported under a different field name.
    pub fn with_field(s: &str, field: &'static str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field });
        }
        if s.len() > MAX_PHONE_LEN {
            return Err(ValidationError::TooLong {
                field,
                max: MAX_PHONE_LEN,
            });
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field,
                reason: "must contain only digits",
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Plain-text password, validated but not yet hashed
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "password" });
        }
        if s.len() < MIN_PASSWORD_LEN {
            return Err(ValidationError::TooShort {
                field: "password",
                min: MIN_PASSWORD_LEN,
            });
        }
        if s.len() > MAX_PASSWORD_LEN {
            return Err(ValidationError::TooLong {
                field: "password",
                max: MAX_PASSWORD_LEN,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Hash with bcrypt. CPU-bound; call from a blocking task.
    pub fn hash(&self) -> Result<PasswordHash, bcrypt::BcryptError> {
        bcrypt::hash(&self.0, BCRYPT_COST).map(PasswordHash)
    }
}

// Keep the secret out of logs.
impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(..)")
    }
}

static PLACEHOLDER_HASH: Lazy<PasswordHash> = Lazy::new(|| {
    let secret: String = rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    bcrypt::hash(secret, BCRYPT_COST)
        .map(PasswordHash)
        .expect("bcrypt cost out of range")
});

/// bcrypt hash as stored in `auth_user.password`
#[derive(Debug, Clone)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub(crate) fn from_db(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hash of a random secret at production cost. Verifying against it
    /// costs as much as a real check and never succeeds.
    pub fn placeholder() -> Self {
        PLACEHOLDER_HASH.clone()
    }

    /// Check a candidate password. Malformed hashes never verify.
    pub fn verify(&self, candidate: &str) -> bool {
        bcrypt::verify(candidate, self.0.trim_end()).unwrap_or(false)
    }
}

/// Digits-only prefix used by patient search (cpf, phone)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPrefix(String);

impl SearchPrefix {
    pub fn new(s: &str, field: &'static str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field });
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field,
                reason: "search prefix must contain only digits",
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_trimmed_and_bounded() {
        assert_eq!(DisplayName::new("  Ana  ").unwrap().as_str(), "Ana");
        assert!(matches!(
            DisplayName::new("   ").unwrap_err(),
            ValidationError::Empty { .. }
        ));
        let long = "a".repeat(256);
        assert!(matches!(
            DisplayName::new(&long).unwrap_err(),
            ValidationError::TooLong { max: 255, .. }
        ));
    }

    #[test]
    fn email_shape() {
        assert!(Email::new("ana@ufba.br").is_ok());
        assert!(Email::new("ana").is_err());
        assert!(Email::new("ana@@ufba.br").is_err());
        assert!(Email::new("@ufba.br").is_err());
    }

    #[test]
    fn phone_digits_only() {
        assert!(Phone::new("71999990000").is_ok());
        assert!(Phone::new("(71) 9999-0000").is_err());
    }

    #[test]
    fn password_bounds() {
        assert!(matches!(
            Password::new("short").unwrap_err(),
            ValidationError::TooShort { min: 8, .. }
        ));
        assert!(Password::new(&"x".repeat(73)).is_err());
        assert!(Password::new("correct horse").is_ok());
    }

    #[test]
    fn password_debug_is_redacted() {
        let p = Password::new("correct horse").unwrap();
        assert_eq!(format!("{:?}", p), "Password(..)");
    }

    #[test]
    fn hash_then_verify() {
        // Low cost keeps the test fast; production uses DEFAULT_COST.
        let hash = PasswordHash(bcrypt::hash("correct horse", 4).unwrap());
        assert!(hash.verify("correct horse"));
        assert!(!hash.verify("wrong horse"));
    }

    #[test]
    fn placeholder_has_production_cost_and_never_verifies() {
        let hash = PasswordHash::placeholder();
        assert!(hash.as_str().starts_with(&format!("$2b${:02}$", BCRYPT_COST)));
        assert!(!hash.verify(""));
        assert!(!hash.verify("correct horse"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let hash = PasswordHash::from_db("not-a-hash".into());
        assert!(!hash.verify("anything"));
    }

    #[test]
    fn search_prefix_digits() {
        assert!(SearchPrefix::new("529", "cpf").is_ok());
        assert!(SearchPrefix::new("52a", "cpf").is_err());
    }
}
