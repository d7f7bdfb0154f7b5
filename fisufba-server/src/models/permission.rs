//! Groups and permission codenames
//!
//! Permissions are stored by codename (`create_patient`, `read_form_data`, ...).
//! Per-group permissions are derived from the group name so handlers never
//! spell codenames by hand.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ValidationError;

/// The fixed set of account groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupName {
    Admin,
    Attendant,
    Physiotherapist,
    Patient,
}

impl GroupName {
    pub const ALL: [GroupName; 4] = [
        GroupName::Admin,
        GroupName::Attendant,
        GroupName::Physiotherapist,
        GroupName::Patient,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Attendant => "attendant",
            Self::Physiotherapist => "physiotherapist",
            Self::Patient => "patient",
        }
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidVariant {
                field: "group",
                value: s.to_owned(),
            })
    }
}

/// A permission codename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Create(GroupName),
    ChangeData(GroupName),
    ReadData(GroupName),
    CreateForm,
    ChangeFormData,
    ReadFormData,
    SearchPatient,
}

impl Permission {
    /// Codename as stored in `auth_permission.codename`.
    pub fn codename(&self) -> String {
        match self {
            Self::Create(g) => format!("create_{}", g),
            Self::ChangeData(g) => format!("change_{}_data", g),
            Self::ReadData(g) => format!("read_{}_data", g),
            Self::CreateForm => "create_form".to_owned(),
            Self::ChangeFormData => "change_form_data".to_owned(),
            Self::ReadFormData => "read_form_data".to_owned(),
            Self::SearchPatient => "search_patient".to_owned(),
        }
    }

    /// Human-readable name as stored in `auth_permission.name`.
    pub fn name(&self) -> String {
        match self {
            Self::Create(g) => format!("Create {}", g),
            Self::ChangeData(g) => format!("Change {} data", g),
            Self::ReadData(g) => format!("Read {} data", g),
            Self::CreateForm => "Create form".to_owned(),
            Self::ChangeFormData => "Change form data".to_owned(),
            Self::ReadFormData => "Read form data".to_owned(),
            Self::SearchPatient => "Search patient".to_owned(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Create(g) => format!("Allows the creation of {} {} user", article(*g), g),
            Self::ChangeData(g) => format!("Allows changes to {} user data", g),
            Self::ReadData(g) => format!("Allows read in {} user data", g),
            Self::CreateForm => "Allows the creation of a form".to_owned(),
            Self::ChangeFormData => "Allows changes to form data".to_owned(),
            Self::ReadFormData => "Allows read in form data".to_owned(),
            Self::SearchPatient => "Allows the search for patients".to_owned(),
        }
    }

    /// Every permission the schema knows about.
    pub fn all() -> Vec<Permission> {
        let mut all = Vec::new();
        for g in GroupName::ALL {
            all.push(Self::Create(g));
            all.push(Self::ChangeData(g));
            all.push(Self::ReadData(g));
        }
        all.extend([
            Self::CreateForm,
            Self::ChangeFormData,
            Self::ReadFormData,
            Self::SearchPatient,
        ]);
        all
    }
}

fn article(g: GroupName) -> &'static str {
    match g {
        GroupName::Admin | GroupName::Attendant => "an",
        GroupName::Physiotherapist | GroupName::Patient => "a",
    }
}

/// Default grants seeded at provisioning time.
pub fn default_grants() -> Vec<(GroupName, Permission)> {
    use GroupName::*;
    use Permission::*;

    let mut grants = Vec::new();
    for g in [Admin, Attendant, Physiotherapist] {
        grants.push((Admin, Create(g)));
        grants.push((Admin, ChangeData(g)));
        grants.push((Admin, ReadData(g)));
    }
    grants.extend([
        (Attendant, Create(Patient)),
        (Attendant, ChangeData(Patient)),
        (Attendant, ReadData(Patient)),
        (Attendant, SearchPatient),
        (Physiotherapist, ReadData(Patient)),
        (Physiotherapist, SearchPatient),
        (Physiotherapist, CreateForm),
        (Physiotherapist, ChangeFormData),
        (Physiotherapist, ReadFormData),
    ]);
    grants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codenames() {
        assert_eq!(Permission::Create(GroupName::Patient).codename(), "create_patient");
        assert_eq!(
            Permission::ChangeData(GroupName::Admin).codename(),
            "change_admin_data"
        );
        assert_eq!(Permission::ReadFormData.codename(), "read_form_data");
    }

    #[test]
    fn parse_group() {
        assert_eq!("patient".parse::<GroupName>().unwrap(), GroupName::Patient);
        assert!(matches!(
            "root".parse::<GroupName>().unwrap_err(),
            ValidationError::InvalidVariant { .. }
        ));
    }

    #[test]
    fn all_codenames_unique() {
        let all = Permission::all();
        let mut names: Vec<_> = all.iter().map(|p| p.codename()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), all.len());
        assert_eq!(all.len(), 16);
    }

    #[test]
    fn grants_only_reference_known_permissions() {
        let all = Permission::all();
        for (_, p) in default_grants() {
            assert!(all.contains(&p));
        }
    }

    #[test]
    fn admin_cannot_create_patients_by_default() {
        assert!(!default_grants().contains(&(GroupName::Admin, Permission::Create(GroupName::Patient))));
    }
}
