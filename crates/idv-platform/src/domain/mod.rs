//! Domain Layer
//!
//! Pure building blocks of reconciliation: text normalization, calendar
//! age computation and the persisted user record.

pub mod age;
pub mod normalize;
pub mod user;

pub use age::{compute_age, AgeError, Clock, FixedClock, SystemClock};
pub use normalize::FieldNormalizer;
pub use user::UserRecord;
