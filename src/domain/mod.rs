//! Domain models for Baseline Guard
//!
//! Architecture: Rich Domain Models - feature records, targets and violations carry behavior

pub mod features;
pub mod target;
pub mod violations;
