pub mod error;
pub mod logging;
pub mod phone;

pub use error::*;
pub use phone::{normalize, to_digits, CanonicalPhone, NormalizationPolicy};
