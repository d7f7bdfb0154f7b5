//! Repository implementations for database access
//!
//! Repositories borrow the transaction's connection; they never open their
//! own. Each method is one or two statements and returns `StorageError`.

pub mod users;
pub mod sessions;
pub mod patient_information;
pub mod sociodemographic;

pub use users::{NewUser, PatientSearch, User, UserPatch, UserRepo};
pub use sessions::{Session, SessionRepo};
pub use patient_information::{PatientInformation, PatientInformationRepo};
pub use sociodemographic::{SociodemographicEvaluation, SociodemographicRepo};

/// Escape `%`, `_` and `\` for use inside a LIKE pattern.
pub(crate) fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("ana"), "ana");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
