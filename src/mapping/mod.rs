//! Invoice Mapper: invoice → AEAT request tree.
//!
//! Mapping is pure. [`FieldSource`] has one method per output field with a
//! default over [`Invoice`](crate::core::Invoice); [`IssuedMapper`] and
//! [`ReceivedMapper`] override what differs by direction and assemble the
//! `FacturaExpedida` / `FacturaRecibida` bodies.
//!
//! Amounts are signed as stored. Tax rates go out as percentages.

mod fields;
mod issued;
mod received;
mod request;

pub use fields::*;
pub use issued::IssuedMapper;
pub use received::ReceivedMapper;
pub use request::*;

use crate::core::{Direction, Invoice, SiiError};

/// Register request for `invoice`, with the mapper matching its direction.
pub fn build_submit_record(invoice: &Invoice) -> Result<SubmitRecord, SiiError> {
    match invoice.direction() {
        Direction::Issued => IssuedMapper.build_request(invoice).map(SubmitRecord::Issued),
        Direction::Received => ReceivedMapper
            .build_request(invoice)
            .map(SubmitRecord::Received),
    }
}

/// Period and identity of `invoice` as AEAT knows it.
pub fn record_header(invoice: &Invoice) -> Result<RecordHeader, SiiError> {
    match invoice.direction() {
        Direction::Issued => IssuedMapper.build_cancel_request(invoice),
        Direction::Received => ReceivedMapper.build_cancel_request(invoice),
    }
}
