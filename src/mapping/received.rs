//! `FacturaRecibida` mapping.

use rust_decimal::Decimal;

use super::fields::*;
use super::request::*;
use crate::core::*;

/// Maps received invoices; the serial is the supplier's reference and the
/// issuer is the counterpart.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceivedMapper;

impl FieldSource for ReceivedMapper {
    fn serial_number(&self, invoice: &Invoice) -> Result<String, SiiError> {
        invoice
            .reference
            .clone()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| SiiError::mapping(invoice.label(), "received invoice has no reference"))
    }
}

impl ReceivedMapper {
    pub fn special_key(&self, invoice: &Invoice) -> Result<ReceivedRegimeKey, SiiError> {
        invoice.sii.received_key.ok_or_else(|| {
            SiiError::mapping(invoice.label(), "missing received special regime key")
        })
    }

    /// `FechaRegContable`: the move date, else the invoice date.
    pub fn accounting_date(&self, invoice: &Invoice) -> String {
        format_date(invoice.accounting_date.unwrap_or(invoice.invoice_date))
    }

    /// Signed sum of the amounts of reported taxes the company may deduct.
    pub fn deductible_amount(&self, invoice: &Invoice) -> Decimal {
        self.taxes(invoice)
            .into_iter()
            .filter(|t| t.tax.deductible)
            .map(|t| self.tax_amount(t))
            .sum()
    }

    /// Tax details; under the agriculture compensation regime rate and
    /// amount move to the REAGYP fields.
    pub fn build_taxes(&self, invoice: &Invoice) -> Result<Vec<TaxDetail>, SiiError> {
        let reagyp = invoice.sii.received_key == Some(ReceivedRegimeKey::AgricultureCompensation);
        let details = self
            .taxes(invoice)
            .into_iter()
            .map(|tax| {
                let mut detail = build_tax_detail(self, invoice, tax)?;
                if reagyp {
                    detail.reagyp_rate = detail.rate.take();
                    detail.reagyp_amount = detail.amount.take();
                }
                Ok(detail)
            })
            .collect::<Result<Vec<_>, SiiError>>()?;
        if details.is_empty() {
            return Err(SiiError::mapping(
                invoice.label(),
                "received invoice has no qualifying tax line",
            ));
        }
        Ok(details)
    }

    pub fn build_received_invoice(&self, invoice: &Invoice) -> Result<ReceivedInvoice, SiiError> {
        Ok(ReceivedInvoice {
            invoice_kind: self.invoice_kind(invoice)?,
            rectification: self.rectified_invoice_kind(invoice),
            special_key: self.special_key(invoice)?,
            total_amount: self.total_amount(invoice),
            description: self.description(invoice)?,
            details: self.build_taxes(invoice)?,
            counterpart: build_counterpart(self, invoice)?,
            accounting_date: self.accounting_date(invoice),
            deductible_amount: self.deductible_amount(invoice),
        })
    }

    pub fn build_request(&self, invoice: &Invoice) -> Result<ReceivedRequest, SiiError> {
        Ok(InvoiceRequest {
            period: build_period(self, invoice),
            id: build_invoice_id(self, invoice, counterpart_party_id(self, invoice))?,
            body: self.build_received_invoice(invoice)?,
        })
    }

    /// Period and identity only, as sent in a delete request.
    pub fn build_cancel_request(&self, invoice: &Invoice) -> Result<RecordHeader, SiiError> {
        Ok(RecordHeader {
            period: build_period(self, invoice),
            id: build_invoice_id(self, invoice, counterpart_party_id(self, invoice))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input_vat(id: u64, rate: Decimal, deductible: bool) -> Tax {
        let b = TaxBuilder::new(id, format!("IVA soportado {id}"), rate)
            .subjected(SubjectedKey::NoReverseCharge)
            .received_key(ReceivedRegimeKey::General);
        if deductible { b.deductible().build() } else { b.build() }
    }

    fn builder() -> InvoiceBuilder {
        InvoiceBuilder::new(
            InvoiceId(3),
            InvoiceKind::InInvoice,
            date(2017, 2, 20),
            FiscalPeriod::new(1, "2017", 2, date(2017, 2, 1)),
            Company::new(
                "ACME SL",
                PartyBuilder::new("ACME SL").vat_code("ESB12345678").build(),
            ),
        )
        .reference("PROV/2017/15")
        .party(PartyBuilder::new("Proveedor SL").vat_code("ESB99999999").build())
        .operation_key(OperationKey::Invoice)
        .received_key(ReceivedRegimeKey::General)
        .subjected_key(SubjectedKey::NoReverseCharge)
    }

    #[test]
    fn issuer_is_the_supplier() {
        let inv = builder()
            .add_tax(input_vat(1, dec!(0.21), true), dec!(100), dec!(21))
            .build()
            .unwrap();
        let req = ReceivedMapper.build_request(&inv).unwrap();
        assert_eq!(req.id.issuer.nif.as_deref(), Some("B99999999"));
        assert_eq!(req.id.serial_number, "PROV/2017/15");
        assert_eq!(req.period.period, "02");
        assert_eq!(req.body.accounting_date, "20/02/2017");
    }

    #[test]
    fn deductible_amount_sums_deductible_lines_only() {
        let inv = builder()
            .add_tax(input_vat(1, dec!(0.21), true), dec!(100), dec!(21))
            .add_tax(input_vat(2, dec!(0.10), false), dec!(50), dec!(5))
            .add_tax(input_vat(3, dec!(0.04), true), dec!(-25), dec!(-1))
            .build()
            .unwrap();
        let body = ReceivedMapper.build_received_invoice(&inv).unwrap();
        assert_eq!(body.deductible_amount, dec!(20));
        assert_eq!(body.details.len(), 3);
    }

    #[test]
    fn accounting_date_prefers_move_date() {
        let inv = builder()
            .accounting_date(date(2017, 3, 2))
            .add_tax(input_vat(1, dec!(0.21), true), dec!(100), dec!(21))
            .build()
            .unwrap();
        assert_eq!(ReceivedMapper.accounting_date(&inv), "02/03/2017");
    }

    #[test]
    fn agriculture_regime_reports_reagyp() {
        let inv = builder()
            .received_key(ReceivedRegimeKey::AgricultureCompensation)
            .add_tax(input_vat(1, dec!(0.12), true), dec!(100), dec!(12))
            .build()
            .unwrap();
        let details = ReceivedMapper.build_taxes(&inv).unwrap();
        assert_eq!(details[0].reagyp_rate, Some(dec!(12)));
        assert_eq!(details[0].reagyp_amount, Some(dec!(12)));
        assert_eq!(details[0].rate, None);
        assert_eq!(details[0].amount, None);
    }

    #[test]
    fn missing_reference_is_a_mapping_error() {
        let mut inv = builder()
            .add_tax(input_vat(1, dec!(0.21), true), dec!(100), dec!(21))
            .build()
            .unwrap();
        inv.reference = None;
        let err = ReceivedMapper.build_request(&inv).unwrap_err();
        assert!(matches!(err, SiiError::Mapping { .. }));
    }

    #[test]
    fn no_tax_lines_is_a_mapping_error() {
        let inv = builder().build().unwrap();
        assert!(ReceivedMapper.build_request(&inv).is_err());
    }
}
