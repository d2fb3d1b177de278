//! `FacturaExpedida` mapping.

use rust_decimal::Decimal;

use super::fields::*;
use super::request::*;
use crate::core::*;

/// Maps issued invoices; the serial is the invoice number and the issuer
/// is the company itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct IssuedMapper;

impl FieldSource for IssuedMapper {
    fn serial_number(&self, invoice: &Invoice) -> Result<String, SiiError> {
        invoice
            .number
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| SiiError::mapping(invoice.label(), "issued invoice has no number"))
    }
}

impl IssuedMapper {
    pub fn special_key(&self, invoice: &Invoice) -> Result<IssuedRegimeKey, SiiError> {
        invoice
            .sii
            .issued_key
            .ok_or_else(|| SiiError::mapping(invoice.label(), "missing issued special regime key"))
    }

    fn issuer(&self, invoice: &Invoice) -> Result<PartyId, SiiError> {
        Ok(PartyId {
            nif: Some(self.nif(invoice)?),
            other: None,
        })
    }

    pub fn build_breakdown(&self, invoice: &Invoice) -> Result<Breakdown, SiiError> {
        let not_exempt = match self.not_exempt_kind(invoice) {
            Some(kind) => {
                let details = self
                    .taxes(invoice)
                    .into_iter()
                    .map(|tax| build_tax_detail(self, invoice, tax))
                    .collect::<Result<Vec<_>, _>>()?;
                if details.is_empty() {
                    return Err(SiiError::mapping(
                        invoice.label(),
                        format!("subjected key {kind} but no qualifying tax line"),
                    ));
                }
                Some(NotExemptBlock { kind, details })
            }
            None => None,
        };

        let exempt = self.exempt_kind(invoice).map(|cause| {
            let exempt_taxes = self.exempt_taxes(invoice);
            let base = if exempt_taxes.is_empty() {
                invoice.untaxed_amount
            } else {
                exempt_taxes.iter().map(|t| t.base).sum::<Decimal>()
            };
            ExemptBlock { cause, base }
        });

        if exempt.is_none() && not_exempt.is_none() {
            return Err(SiiError::mapping(
                invoice.label(),
                "invoice has neither a subjected key nor an exemption cause",
            ));
        }
        Ok(Breakdown { exempt, not_exempt })
    }

    pub fn build_issued_invoice(&self, invoice: &Invoice) -> Result<IssuedInvoice, SiiError> {
        Ok(IssuedInvoice {
            invoice_kind: self.invoice_kind(invoice)?,
            rectification: self.rectified_invoice_kind(invoice),
            special_key: self.special_key(invoice)?,
            total_amount: self.total_amount(invoice),
            description: self.description(invoice)?,
            counterpart: build_counterpart(self, invoice)?,
            breakdown: self.build_breakdown(invoice)?,
        })
    }

    pub fn build_request(&self, invoice: &Invoice) -> Result<IssuedRequest, SiiError> {
        Ok(InvoiceRequest {
            period: build_period(self, invoice),
            id: build_invoice_id(self, invoice, self.issuer(invoice)?)?,
            body: self.build_issued_invoice(invoice)?,
        })
    }

    /// Period and identity only, as sent in a delete request.
    pub fn build_cancel_request(&self, invoice: &Invoice) -> Result<RecordHeader, SiiError> {
        Ok(RecordHeader {
            period: build_period(self, invoice),
            id: build_invoice_id(self, invoice, self.issuer(invoice)?)?,
        })
    }
}
