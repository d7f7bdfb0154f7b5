//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod validation;
pub mod cpf;
pub mod account;
pub mod permission;
pub mod patient;
pub mod sociodemographic;
pub mod pagination;

pub use validation::ValidationError;
pub use cpf::Cpf;
pub use account::{DisplayName, Email, Password, PasswordHash, Phone, SearchPrefix};
pub use permission::{default_grants, GroupName, Permission};
pub use patient::{Gender, PatientInformationFields, PatientInformationPatch};
pub use sociodemographic::{
    CivilStatus, Education, LivesWith, OccupationalStatus, SociodemographicFields,
    SociodemographicPatch,
};
pub use pagination::{Pagination, Paginated, PaginationParams};
