//! Reconciles a membership-platform export with a community-platform export and reports
//! which matched members have renewals coming up.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
