//! # runnel-engine — Continuous funding-stream engine.
//!
//! All bookkeeping is integer-only and amortized O(1) per mutation.
//!
//! This crate implements the lazy, compute-on-read streaming model:
//! - **Weighted receiver lists**: self-pruning linked structures splitting a
//!   funding rate proportionally across receivers.
//! - **Cycle-delta ledgers**: per-receiver chains of signed per-cycle rate
//!   deltas; accrual is reconstructed exactly at collection time, never
//!   updated per tick.
//! - **Sender state machine**: start/stop/top-up/withdraw expressed as
//!   delta edits over the receivers' ledgers, reverting only the unelapsed
//!   portion of a stream.
//! - **Proxy redistribution**: aggregate inflow fanned out to a secondary
//!   weighted receiver set, reconfigurable mid-stream.
//!
//! The engine is clock-free: every operation takes `now` explicitly.

pub mod deltas;
pub mod hub;
pub mod proxy;
pub mod receiver;
pub mod receivers;
pub mod sender;

pub use deltas::{DeltaLedger, LedgerEdit, LedgerTarget};
pub use hub::{HubConfig, StreamHub};
pub use proxy::ProxyState;
pub use receiver::ReceiverState;
pub use receivers::WeightedList;
pub use sender::SenderState;
