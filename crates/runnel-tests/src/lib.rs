//! Integration test suite for the runnel streaming engine.
//!
//! This crate exercises full funding lifecycles through [`StreamHub`]
//! (senders, receivers and proxies together) and verifies the
//! fund-conservation invariants under randomized schedules.
//!
//! [`StreamHub`]: runnel_engine::StreamHub

pub mod helpers;
