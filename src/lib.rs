//! # aeat-sii
//!
//! Reporting of invoices to the Spanish tax agency (AEAT) through the SII
//! ("Suministro Inmediato de Información") web services: invoice records
//! with their SII keys, the mapping onto the AEAT request schema, report
//! batches with their state machine, and the gateway that submits them.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//! Amounts are signed as stored; credit notes carry negative amounts.
//!
//! ## Quick Start
//!
//! ```rust
//! use aeat_sii::core::*;
//! use aeat_sii::mapping::IssuedMapper;
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let company = Company::new(
//!     "ACME SL",
//!     PartyBuilder::new("ACME SL").vat_code("ESB12345678").build(),
//! );
//! let period = FiscalPeriod::new(1, "2017", 3, NaiveDate::from_ymd_opt(2017, 3, 1).unwrap());
//! let vat21 = TaxBuilder::new(1, "IVA 21%", dec!(0.21))
//!     .subjected(SubjectedKey::NoReverseCharge)
//!     .build();
//!
//! let invoice = InvoiceBuilder::new(
//!     InvoiceId(1),
//!     InvoiceKind::OutInvoice,
//!     NaiveDate::from_ymd_opt(2017, 3, 9).unwrap(),
//!     period,
//!     company,
//! )
//! .number("FV-0001")
//! .party(PartyBuilder::new("Cliente SA").vat_code("ESA87654321").build())
//! .operation_key(OperationKey::Invoice)
//! .issued_key(IssuedRegimeKey::General)
//! .subjected_key(SubjectedKey::NoReverseCharge)
//! .add_tax(vat21, dec!(100), dec!(21))
//! .build()
//! .unwrap();
//!
//! let request = IssuedMapper.build_request(&invoice).unwrap();
//! assert_eq!(request.period.period, "03");
//! assert_eq!(request.id.issue_date, "09/03/2017");
//! assert_eq!(request.body.total_amount, dec!(121));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Records, code lists, mapping, reports, gateway trait |
//! | `soap` | SOAP envelopes, response parsing and the HTTPS gateway |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod mapping;

#[cfg(feature = "core")]
pub mod report;

#[cfg(feature = "core")]
pub mod gateway;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
