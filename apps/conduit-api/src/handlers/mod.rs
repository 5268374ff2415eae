//! Handlers 模块

pub mod metrics;
pub mod mqtt;
pub mod rules;

pub use metrics::*;
pub use mqtt::*;
pub use rules::*;
