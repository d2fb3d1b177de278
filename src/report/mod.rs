//! SII reports: a period's invoices of one book, communicated to AEAT as a
//! batch.
//!
//! A [`Report`] moves through a fixed state machine:
//!
//! | from | to |
//! |---|---|
//! | draft | confirmed, cancelled |
//! | confirmed | draft, sent, cancelled |
//! | cancelled | draft |
//!
//! `sent` is only reached through [`Report::send`] and has no way out.
//!
//! The host's invoice store is reached through the [`Ledger`] trait;
//! [`MemoryLedger`] keeps everything in memory.

pub mod lifecycle;
mod ledger;
mod memory;
mod model;
mod reconcile;
mod workflow;

pub use crate::core::ReportState;
pub use ledger::{HistoryEntry, InvoiceFilter, Ledger, latest_state};
pub use lifecycle::PendingAction;
pub use memory::MemoryLedger;
pub use model::*;
pub use workflow::SendStrategy;
