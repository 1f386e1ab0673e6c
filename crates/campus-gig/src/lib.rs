//! Project lifecycle and eligibility-matching engine for university-industry student
//! projects.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
