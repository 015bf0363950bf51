//! # runnel-core
//! Foundation types and traits for the Runnel streaming protocol.

pub mod asset;
pub mod constants;
pub mod cycle;
pub mod error;
pub mod types;
