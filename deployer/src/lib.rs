//! MDM Deployer Library
//!
//! Deployment orchestration for managed Android fleets: the MDM command
//! client, the step executors and the pipeline that sequences them.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod report;
pub mod server;
pub mod storage;
pub mod utils;
