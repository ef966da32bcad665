//! Licence lookup feature
//!
//! Read-only access to the tables populated by the FCC import.

pub mod queries;
pub mod routes;

pub use queries::LicenseLookup;
pub use routes::licenses_routes;
