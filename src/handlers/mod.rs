//! HTTP handlers

pub mod decisions;
pub mod health;
