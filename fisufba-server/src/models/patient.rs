//! Patient information form fields

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Phone, ValidationError};

const MAX_TEXT_LEN: usize = 255;

/// Gender as stored in `forms_patient_information.gender`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "Masculino")]
    Masculine,
    #[serde(rename = "Feminino")]
    Feminine,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Masculine => "Masculino",
            Self::Feminine => "Feminino",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "Masculino" => Ok(Self::Masculine),
            "Feminino" => Ok(Self::Feminine),
            other => Err(ValidationError::InvalidVariant {
                field: "gender",
                value: other.to_owned(),
            }),
        }
    }
}

/// Complete, validated set of form fields (create)
#[derive(Debug, Clone, PartialEq)]
pub struct PatientInformationFields {
    pub gender: Gender,
    pub birthday: NaiveDate,
    pub acquaintance_phone: Phone,
    pub address: String,
    pub neighborhood: String,
    pub city: String,
    pub country: String,
}

/// Validated partial update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientInformationPatch {
    pub gender: Option<Gender>,
    pub birthday: Option<NaiveDate>,
    pub acquaintance_phone: Option<Phone>,
    pub address: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl PatientInformationPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Non-empty bounded free text
pub fn text_field(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_TEXT_LEN,
        });
    }
    Ok(value.to_owned())
}

/// ISO-8601 date, not in the future
pub fn birthday(value: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidFormat {
            field: "birthday",
            reason: "must be an ISO date (YYYY-MM-DD)",
        }
    })?;
    if date > today {
        return Err(ValidationError::InvalidFormat {
            field: "birthday",
            reason: "cannot be in the future",
        });
    }
    Ok(date)
}
