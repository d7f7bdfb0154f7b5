//! Sociodemographic evaluation form fields
//!
//! Choice fields are stored by their Portuguese label, the same text the
//! clients send and receive.

use super::patient::text_field;
use super::ValidationError;

/// Enum whose variants map one-to-one onto stored labels.
macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }

            pub fn parse(s: &str) -> Result<Self, ValidationError> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| ValidationError::InvalidVariant {
                        field: $field,
                        value: s.to_owned(),
                    })
            }
        }
    };
}

labelled_enum!(
    /// `civil_status`
    CivilStatus, "civil_status" {
        Single => "Solteiro(a)",
        Married => "Casado(a)",
        Divorced => "Divorciado(a)",
        Widowed => "Viúvo(a)",
    }
);

labelled_enum!(
    /// `lives_with_status`
    LivesWith, "lives_with_status" {
        Alone => "Sozinho(a)",
        Relatives => "Familiares",
        Friends => "Amigos",
        Spouse => "Cônjuge",
    }
);

labelled_enum!(
    Education, "education" {
        Illiterate => "Analfabeto(a)",
        Primary => "Primeiro Grau",
        Secondary => "Segundo Grau",
        Tertiary => "Superior/Pós-graduado(a)",
    }
);

labelled_enum!(
    OccupationalStatus, "occupational_status" {
        Student => "Estudante",
        Unemployed => "Desempregado(a)",
        Employed => "Empregado(a)",
        AwayForHealth => "Afastado(a) por problemas de saúde",
        Retired => "Aposentado(a)",
    }
);

/// Complete, validated set of form fields (create)
#[derive(Debug, Clone, PartialEq)]
pub struct SociodemographicFields {
    pub civil_status: CivilStatus,
    pub lives_with_status: LivesWith,
    pub education: Education,
    pub occupational_status: OccupationalStatus,
    pub current_job: Option<String>,
    pub last_job: Option<String>,
    pub is_sick: bool,
    pub diseases: Option<Vec<String>>,
    pub is_medicated: bool,
    pub medicines: Option<Vec<String>>,
}

/// Validated partial update.
///
/// Outer `None` leaves the column alone; for nullable columns
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SociodemographicPatch {
    pub civil_status: Option<CivilStatus>,
    pub lives_with_status: Option<LivesWith>,
    pub education: Option<Education>,
    pub occupational_status: Option<OccupationalStatus>,
    pub current_job: Option<Option<String>>,
    pub last_job: Option<Option<String>>,
    pub is_sick: Option<bool>,
    pub diseases: Option<Option<Vec<String>>>,
    pub is_medicated: Option<bool>,
    pub medicines: Option<Option<Vec<String>>>,
}

impl SociodemographicPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A list given at all must hold at least one non-empty entry; each entry
/// is trimmed.
pub fn text_list(values: &[String], field: &'static str) -> Result<Vec<String>, ValidationError> {
    if values.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    values.iter().map(|v| text_field(v, field)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_back() {
        for status in OccupationalStatus::ALL {
            assert_eq!(OccupationalStatus::parse(status.as_str()).unwrap(), *status);
        }
        assert_eq!(LivesWith::parse("Cônjuge").unwrap(), LivesWith::Spouse);
    }

    #[test]
    fn unknown_label_names_the_field() {
        let err = CivilStatus::parse("Solteiro").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidVariant { field: "civil_status", .. }
        ));
        assert!(Education::parse("superior/pós-graduado(a)").is_err());
    }

    #[test]
    fn text_list_rules() {
        let list = text_list(&[" asma ".into(), "diabetes".into()], "diseases").unwrap();
        assert_eq!(list, ["asma", "diabetes"]);

        assert!(matches!(
            text_list(&[], "diseases").unwrap_err(),
            ValidationError::Empty { field: "diseases" }
        ));
        assert!(text_list(&["  ".into()], "medicines").is_err());
    }

    #[test]
    fn clearing_a_column_is_not_empty() {
        assert!(SociodemographicPatch::default().is_empty());
        let patch = SociodemographicPatch {
            current_job: Some(None),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
