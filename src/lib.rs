//! Identity Wizard — client core for the creator identity flow.

pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod feedback;
pub mod flow;
pub mod identity;
pub mod normalize;
pub mod storage;
pub mod wizard;
