//! Disruption cost estimation.
//!
//! Raw disruption records are flattened to one row per affected line,
//! live arrival predictions give each line a typical headway, and the two
//! are combined with a severity delay map into an hourly cost per
//! (line, severity).

pub mod aggregate;
pub mod analyzer;
pub mod headway;
pub mod normalize;
pub mod summary;
pub mod types;
pub mod utility;
