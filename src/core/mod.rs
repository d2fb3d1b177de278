//! Core SII records, code lists, builders and errors.
//!
//! The invoice, party and tax records carry the SII attributes directly;
//! the host ledger fills them in and the rest of the crate reads them.

mod builder;
mod error;
pub mod keys;
mod party;
mod text;
mod types;

pub use builder::*;
pub use error::*;
pub use keys::*;
pub use text::unaccent;
pub use types::*;
