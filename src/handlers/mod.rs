//! HTTP handlers

pub mod root;
pub mod health;
pub mod metrics;
pub mod predict;
pub mod batch;
