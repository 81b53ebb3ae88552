pub mod embedding;
pub mod evaluator;
pub mod log;
pub mod matcher;
pub mod polarity;
pub mod principles;
pub mod tenants;
