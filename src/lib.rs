//! Carelink Sync - real-time synchronization core for the hospital
//! operations dashboard.
//!
//! Keeps one authenticated event channel per session, routes decoded push
//! events to the views that care about them, and reconciles optimistic
//! writes with their server echoes so every entity appears exactly once.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
