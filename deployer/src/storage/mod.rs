//! On-disk configuration

pub mod inputs;
pub mod settings;
