//! Field-level accessors shared by the issued and received mappers.
//!
//! Every value that ends up in a request has one method here. The defaults
//! read the SII attributes straight off [`Invoice`]; a mapper overrides the
//! handful that differ by direction (serial number, issuer, regime key).

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use super::request::*;
use crate::core::*;

/// Source of every output field of an AEAT invoice record.
pub trait FieldSource {
    fn year(&self, invoice: &Invoice) -> String {
        invoice.period.fiscal_year.clone()
    }

    /// Month of the period start, 1–12.
    fn period(&self, invoice: &Invoice) -> u32 {
        invoice.period.start_date.month()
    }

    /// NIF of the company sending the report.
    fn nif(&self, invoice: &Invoice) -> Result<String, SiiError> {
        invoice
            .company
            .party
            .sii_vat_code()
            .ok_or_else(|| SiiError::mapping(invoice.label(), "company has no VAT code"))
    }

    fn serial_number(&self, invoice: &Invoice) -> Result<String, SiiError>;

    fn final_serial_number(&self, invoice: &Invoice) -> Option<String> {
        invoice.final_serial_number.clone()
    }

    fn issue_date(&self, invoice: &Invoice) -> NaiveDate {
        invoice.invoice_date
    }

    fn invoice_kind(&self, invoice: &Invoice) -> Result<OperationKey, SiiError> {
        invoice
            .sii
            .operation_key
            .ok_or_else(|| SiiError::mapping(invoice.label(), "missing SII operation key"))
    }

    /// Corrective invoices are always reported by differences.
    fn rectified_invoice_kind(&self, invoice: &Invoice) -> Option<RectificationType> {
        invoice
            .sii
            .operation_key
            .filter(|k| k.is_corrective())
            .map(|_| RectificationType::Differences)
    }

    fn not_exempt_kind(&self, invoice: &Invoice) -> Option<SubjectedKey> {
        invoice.sii.subjected_key
    }

    fn exempt_kind(&self, invoice: &Invoice) -> Option<ExemptionCause> {
        invoice.sii.exemption_cause
    }

    /// Invoice description, else first line description, else the serial number.
    fn description(&self, invoice: &Invoice) -> Result<String, SiiError> {
        if let Some(desc) = invoice.description.as_deref().filter(|d| !d.is_empty()) {
            return Ok(unaccent(desc));
        }
        if let Some(desc) = invoice.line_descriptions.first().filter(|d| !d.is_empty()) {
            return Ok(unaccent(desc));
        }
        self.serial_number(invoice)
    }

    fn counterpart_name(&self, invoice: &Invoice) -> String {
        unaccent(&invoice.party.name)
    }

    fn counterpart_id(&self, invoice: &Invoice) -> String {
        invoice.party.counterpart_nif()
    }

    fn counterpart_id_type(&self, invoice: &Invoice) -> Option<PartyIdentifierType> {
        invoice.party.sii_identifier_type
    }

    fn counterpart_country(&self, invoice: &Invoice) -> String {
        invoice
            .party
            .sii_vat_country()
            .or_else(|| invoice.party.country_code.clone())
            .unwrap_or_default()
    }

    /// Tax lines reported one-for-one: subject and not exempt without
    /// reverse charge, surcharges excluded.
    fn taxes<'a>(&self, invoice: &'a Invoice) -> Vec<&'a InvoiceTax> {
        invoice
            .taxes
            .iter()
            .filter(|t| {
                t.tax.subjected_key == Some(SubjectedKey::NoReverseCharge)
                    && !t.tax.equivalence_surcharge
            })
            .collect()
    }

    fn exempt_taxes<'a>(&self, invoice: &'a Invoice) -> Vec<&'a InvoiceTax> {
        invoice
            .taxes
            .iter()
            .filter(|t| t.tax.exemption_key.is_some() && !t.tax.equivalence_surcharge)
            .collect()
    }

    /// Percentage, exact: a 0.052 rate is 5.2.
    fn tax_rate(&self, tax: &InvoiceTax) -> Decimal {
        (tax.tax.rate * Decimal::ONE_HUNDRED).normalize()
    }

    fn tax_base(&self, tax: &InvoiceTax) -> Decimal {
        tax.base
    }

    fn tax_amount(&self, tax: &InvoiceTax) -> Decimal {
        tax.amount
    }

    /// Equivalence surcharge line sharing `tax`'s parent, if any.
    fn equivalence_surcharge<'a>(
        &self,
        invoice: &'a Invoice,
        tax: &InvoiceTax,
    ) -> Result<Option<&'a InvoiceTax>, SiiError> {
        let Some(parent) = tax.tax.parent else {
            return Ok(None);
        };
        let siblings: Vec<&InvoiceTax> = invoice
            .taxes
            .iter()
            .filter(|t| t.tax.equivalence_surcharge && t.tax.parent == Some(parent))
            .collect();
        match siblings.as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(*one)),
            many => Err(SiiError::mapping(
                invoice.label(),
                format!(
                    "{} equivalence surcharge taxes share parent tax {parent}, expected at most one",
                    many.len()
                ),
            )),
        }
    }

    /// Bases of the reported taxes plus every tax amount, surcharges included.
    /// Without tax lines it is the untaxed amount, as the exempt base is.
    fn total_amount(&self, invoice: &Invoice) -> Decimal {
        if invoice.taxes.is_empty() {
            return invoice.untaxed_amount;
        }
        invoice
            .taxes
            .iter()
            .map(|t| {
                if t.tax.equivalence_surcharge {
                    t.amount
                } else {
                    t.base + t.amount
                }
            })
            .sum()
    }
}

/// `DD/MM/YYYY`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

pub fn build_period<M: FieldSource + ?Sized>(mapper: &M, invoice: &Invoice) -> PeriodBlock {
    PeriodBlock {
        year: mapper.year(invoice),
        period: format!("{:02}", mapper.period(invoice)),
    }
}

pub fn build_invoice_id<M: FieldSource + ?Sized>(
    mapper: &M,
    invoice: &Invoice,
    issuer: PartyId,
) -> Result<InvoiceIdBlock, SiiError> {
    let final_serial_number = match mapper.invoice_kind(invoice)? {
        OperationKey::InvoiceSummary => mapper.final_serial_number(invoice),
        _ => None,
    };
    Ok(InvoiceIdBlock {
        issuer,
        serial_number: mapper.serial_number(invoice)?,
        final_serial_number,
        issue_date: format_date(mapper.issue_date(invoice)),
    })
}

/// Spanish parties go by NIF; everybody else by `IDOtro`.
pub fn counterpart_party_id<M: FieldSource + ?Sized>(mapper: &M, invoice: &Invoice) -> PartyId {
    let id = mapper.counterpart_id(invoice);
    match mapper.counterpart_id_type(invoice) {
        None => PartyId {
            nif: Some(id),
            other: None,
        },
        Some(id_type) => PartyId {
            nif: None,
            other: Some(OtherId {
                country: mapper.counterpart_country(invoice),
                id_type,
                id,
            }),
        },
    }
}

/// `None` for the kinds sent without counterpart (F2, F4, R5).
pub fn build_counterpart<M: FieldSource + ?Sized>(
    mapper: &M,
    invoice: &Invoice,
) -> Result<Option<Counterpart>, SiiError> {
    if !mapper.invoice_kind(invoice)?.has_counterpart() {
        return Ok(None);
    }
    Ok(Some(Counterpart {
        name: mapper.counterpart_name(invoice),
        id: counterpart_party_id(mapper, invoice),
    }))
}

pub fn build_tax_detail<M: FieldSource + ?Sized>(
    mapper: &M,
    invoice: &Invoice,
    tax: &InvoiceTax,
) -> Result<TaxDetail, SiiError> {
    let surcharge = mapper.equivalence_surcharge(invoice, tax)?;
    Ok(TaxDetail {
        rate: Some(mapper.tax_rate(tax)),
        base: mapper.tax_base(tax),
        amount: Some(mapper.tax_amount(tax)),
        surcharge_rate: surcharge.map(|s| mapper.tax_rate(s)),
        surcharge_amount: surcharge.map(|s| mapper.tax_amount(s)),
        reagyp_rate: None,
        reagyp_amount: None,
    })
}
