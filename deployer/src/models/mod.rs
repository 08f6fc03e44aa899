//! Data models

pub mod command;
pub mod credentials;
pub mod deployment;
pub mod device;
