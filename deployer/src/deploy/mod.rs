//! Deployment pipeline

pub mod context;
pub mod fsm;
pub mod handle;
pub mod orchestrator;
pub mod poll;
pub mod step;
pub mod steps;
