//! CPF (Brazilian taxpayer number) validation
//!
//! Stored unmasked (11 digits); rendered masked as `xxx.xxx.xxx-xx`.

use std::fmt;

use super::ValidationError;

const CPF_LEN: usize = 11;
const MASKED_CPF_LEN: usize = 14;

/// Validated, unmasked CPF
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cpf(String);

impl Cpf {
    /// Parse a CPF, accepting either the bare 11 digits or the masked form.
    ///
    /// Both check digits are verified.
    ///
    /// # Example
    /// ```
    /// use fisufba_server::models::Cpf;
    ///
    /// assert!(Cpf::new("529.982.247-25").is_ok());
    /// assert!(Cpf::new("52998224725").is_ok());
    /// assert!(Cpf::new("52998224724").is_err()); // bad check digit
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "cpf" });
        }

        let digits = if s.len() == MASKED_CPF_LEN {
            unmask(s).ok_or(ValidationError::InvalidFormat {
                field: "cpf",
                reason: "masked cpf must look like xxx.xxx.xxx-xx",
            })?
        } else {
            s.to_owned()
        };

        if digits.len() != CPF_LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field: "cpf",
                reason: "must contain exactly 11 digits",
            });
        }

        if !check_digits_match(digits.as_bytes()) {
            return Err(ValidationError::InvalidFormat {
                field: "cpf",
                reason: "check digits do not match",
            });
        }

        Ok(Self(digits))
    }

    /// Rebuild from a value already stored in the database.
    pub(crate) fn from_db(s: String) -> Self {
        Self(s.trim_end().to_owned())
    }

    /// The 11 bare digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Masked form: `xxx.xxx.xxx-xx`.
    pub fn masked(&self) -> String {
        let d = &self.0;
        if d.len() != CPF_LEN || !d.is_ascii() {
            return d.clone();
        }
        format!("{}.{}.{}-{}", &d[..3], &d[3..6], &d[6..9], &d[9..])
    }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

fn unmask(s: &str) -> Option<String> {
    let b = s.as_bytes();
    if b[3] != b'.' || b[7] != b'.' || b[11] != b'-' {
        return None;
    }
    Some(s.chars().filter(|c| *c != '.' && *c != '-').collect())
}

/// Mod-11 check digit over `digits`, weights counting up from 2 at the right.
fn check_digit(digits: &[u8]) -> u8 {
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| u32::from(d - b'0') * (i as u32 + 2))
        .sum();
    let rest = 11 - (sum % 11);
    if rest <= 9 {
        rest as u8
    } else {
        0
    }
}

fn check_digits_match(digits: &[u8]) -> bool {
    let first = check_digit(&digits[..9]);
    if digits[9] - b'0' != first {
        return false;
    }
    let second = check_digit(&digits[..10]);
    digits[10] - b'0' == second
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_unmasked() {
        let cpf = Cpf::new("52998224725").unwrap();
        assert_eq!(cpf.as_str(), "52998224725");
    }

    #[test]
    fn accepts_valid_masked() {
        let cpf = Cpf::new("111.444.777-35").unwrap();
        assert_eq!(cpf.as_str(), "11144477735");
        assert_eq!(cpf.masked(), "111.444.777-35");
    }

    #[test]
    fn rejects_wrong_first_check_digit() {
        let err = Cpf::new("52998224715").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { .. }));
    }

    #[test]
    fn rejects_wrong_second_check_digit() {
        let err = Cpf::new("52998224726").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { .. }));
    }

    #[test]
    fn rejects_letters_and_lengths() {
        assert!(Cpf::new("5299822472a").is_err());
        assert!(Cpf::new("5299822472").is_err());
        assert!(Cpf::new("529982247250").is_err());
        assert!(Cpf::new("529-982.247.25").is_err());
    }

    #[test]
    fn rejects_empty() {
        let err = Cpf::new("  ").unwrap_err();
        assert!(matches!(err, ValidationError::Empty { .. }));
    }
}
