use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::error::SiiError;
use super::keys::*;
use super::types::*;

/// Longest `NumSerieFacturaEmisor` AEAT accepts.
pub const MAX_SERIAL_LEN: usize = 60;
/// Longest `DescripcionOperacion` AEAT accepts.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Builder for invoices handed to the SII layer.
///
/// ```
/// use aeat_sii::core::*;
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let d = NaiveDate::from_ymd_opt(2017, 7, 12).unwrap();
/// let period = FiscalPeriod::new(1, "2017", 7, NaiveDate::from_ymd_opt(2017, 7, 1).unwrap());
/// let company = Company::new("ACME SL", PartyBuilder::new("ACME SL").vat_code("ESB12345678").build());
/// let vat21 = TaxBuilder::new(1, "IVA 21%", dec!(0.21)).subjected(SubjectedKey::NoReverseCharge).build();
///
/// let invoice = InvoiceBuilder::new(InvoiceId(1), InvoiceKind::OutInvoice, d, period, company)
///     .number("FV-0001")
///     .party(PartyBuilder::new("Cliente SA").vat_code("ESA87654321").build())
///     .add_tax(vat21, dec!(100), dec!(21))
///     .build()
///     .unwrap();
/// assert_eq!(invoice.untaxed_amount, dec!(100));
/// ```
pub struct InvoiceBuilder {
    id: InvoiceId,
    kind: InvoiceKind,
    state: InvoiceState,
    number: Option<String>,
    reference: Option<String>,
    invoice_date: NaiveDate,
    accounting_date: Option<NaiveDate>,
    period: FiscalPeriod,
    company: Company,
    party: Option<Party>,
    description: Option<String>,
    line_descriptions: Vec<String>,
    taxes: Vec<InvoiceTax>,
    untaxed_amount: Option<Decimal>,
    final_serial_number: Option<String>,
    sii: SiiInvoiceData,
}

impl InvoiceBuilder {
    pub fn new(
        id: InvoiceId,
        kind: InvoiceKind,
        invoice_date: NaiveDate,
        period: FiscalPeriod,
        company: Company,
    ) -> Self {
        let book_key = match kind.direction() {
            Direction::Issued => BookKey::Issued,
            Direction::Received => BookKey::Received,
        };
        Self {
            id,
            kind,
            state: InvoiceState::Posted,
            number: None,
            reference: None,
            invoice_date,
            accounting_date: None,
            period,
            company,
            party: None,
            description: None,
            line_descriptions: Vec::new(),
            taxes: Vec::new(),
            untaxed_amount: None,
            final_serial_number: None,
            sii: SiiInvoiceData {
                book_key: Some(book_key),
                ..Default::default()
            },
        }
    }

    pub fn state(mut self, state: InvoiceState) -> Self {
        self.state = state;
        self
    }

    pub fn number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn accounting_date(mut self, date: NaiveDate) -> Self {
        self.accounting_date = Some(date);
        self
    }

    pub fn party(mut self, party: Party) -> Self {
        self.party = Some(party);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn line_description(mut self, description: impl Into<String>) -> Self {
        self.line_descriptions.push(description.into());
        self
    }

    pub fn add_tax(mut self, tax: Tax, base: Decimal, amount: Decimal) -> Self {
        self.taxes.push(InvoiceTax { tax, base, amount });
        self
    }

    /// Override the untaxed amount (defaults to the sum of non-surcharge bases).
    pub fn untaxed_amount(mut self, amount: Decimal) -> Self {
        self.untaxed_amount = Some(amount);
        self
    }

    pub fn final_serial_number(mut self, number: impl Into<String>) -> Self {
        self.final_serial_number = Some(number.into());
        self
    }

    pub fn book_key(mut self, key: BookKey) -> Self {
        self.sii.book_key = Some(key);
        self
    }

    pub fn operation_key(mut self, key: OperationKey) -> Self {
        self.sii.operation_key = Some(key);
        self
    }

    pub fn issued_key(mut self, key: IssuedRegimeKey) -> Self {
        self.sii.issued_key = Some(key);
        self
    }

    pub fn received_key(mut self, key: ReceivedRegimeKey) -> Self {
        self.sii.received_key = Some(key);
        self
    }

    pub fn subjected_key(mut self, key: SubjectedKey) -> Self {
        self.sii.subjected_key = Some(key);
        self
    }

    pub fn exemption_cause(mut self, cause: ExemptionCause) -> Self {
        self.sii.exemption_cause = Some(cause);
        self
    }

    pub fn intracommunity_key(mut self, key: IntracommunityType) -> Self {
        self.sii.intracommunity_key = Some(key);
        self
    }

    pub fn pending_sending(mut self, pending: bool) -> Self {
        self.sii.pending_sending = pending;
        self
    }

    /// Build the invoice, checking the limits AEAT enforces on free-text fields.
    pub fn build(self) -> Result<Invoice, SiiError> {
        let party = self
            .party
            .ok_or_else(|| SiiError::Validation("party is required".into()))?;

        for serial in [&self.number, &self.reference].into_iter().flatten() {
            if serial.chars().count() > MAX_SERIAL_LEN {
                return Err(SiiError::Validation(format!(
                    "serial number cannot exceed {MAX_SERIAL_LEN} characters"
                )));
            }
        }
        if let Some(desc) = &self.description {
            if desc.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(SiiError::Validation(format!(
                    "description cannot exceed {MAX_DESCRIPTION_LEN} characters"
                )));
            }
        }

        let untaxed_amount = self.untaxed_amount.unwrap_or_else(|| {
            self.taxes
                .iter()
                .filter(|t| !t.tax.equivalence_surcharge)
                .map(|t| t.base)
                .sum()
        });

        Ok(Invoice {
            id: self.id,
            kind: self.kind,
            state: self.state,
            number: self.number,
            reference: self.reference,
            invoice_date: self.invoice_date,
            accounting_date: self.accounting_date,
            period: self.period,
            company: self.company,
            party,
            description: self.description,
            line_descriptions: self.line_descriptions,
            taxes: self.taxes,
            untaxed_amount,
            final_serial_number: self.final_serial_number,
            sii: self.sii,
        })
    }
}

/// Builder for Party (company, customer or supplier).
pub struct PartyBuilder {
    name: String,
    vat_code: Option<String>,
    identifiers: Vec<PartyIdentifier>,
    sii_identifier_type: Option<PartyIdentifierType>,
    country_code: Option<String>,
}

impl PartyBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vat_code: None,
            identifiers: Vec::new(),
            sii_identifier_type: None,
            country_code: None,
        }
    }

    pub fn vat_code(mut self, vat: impl Into<String>) -> Self {
        self.vat_code = Some(vat.into());
        self
    }

    pub fn identifier(mut self, kind: IdentifierKind, code: impl Into<String>) -> Self {
        self.identifiers.push(PartyIdentifier {
            kind,
            code: code.into(),
        });
        self
    }

    pub fn identifier_type(mut self, id_type: PartyIdentifierType) -> Self {
        self.sii_identifier_type = Some(id_type);
        self
    }

    pub fn country(mut self, code: impl Into<String>) -> Self {
        self.country_code = Some(code.into());
        self
    }

    pub fn build(self) -> Party {
        Party {
            name: self.name,
            vat_code: self.vat_code,
            identifiers: self.identifiers,
            sii_identifier_type: self.sii_identifier_type,
            country_code: self.country_code,
        }
    }
}

/// Builder for Tax.
pub struct TaxBuilder {
    tax: Tax,
}

impl TaxBuilder {
    /// `rate` is a fraction (0.21 for 21 %).
    pub fn new(id: u64, name: impl Into<String>, rate: Decimal) -> Self {
        Self {
            tax: Tax {
                id,
                name: name.into(),
                rate,
                parent: None,
                equivalence_surcharge: false,
                deductible: false,
                book_key: None,
                issued_key: None,
                received_key: None,
                subjected_key: None,
                exemption_key: None,
                intracommunity_key: None,
            },
        }
    }

    pub fn parent(mut self, parent_id: u64) -> Self {
        self.tax.parent = Some(parent_id);
        self
    }

    pub fn equivalence_surcharge(mut self) -> Self {
        self.tax.equivalence_surcharge = true;
        self
    }

    pub fn deductible(mut self) -> Self {
        self.tax.deductible = true;
        self
    }

    pub fn book(mut self, key: BookKey) -> Self {
        self.tax.book_key = Some(key);
        self
    }

    pub fn issued_key(mut self, key: IssuedRegimeKey) -> Self {
        self.tax.issued_key = Some(key);
        self
    }

    pub fn received_key(mut self, key: ReceivedRegimeKey) -> Self {
        self.tax.received_key = Some(key);
        self
    }

    pub fn subjected(mut self, key: SubjectedKey) -> Self {
        self.tax.subjected_key = Some(key);
        self
    }

    pub fn exempt(mut self, cause: ExemptionCause) -> Self {
        self.tax.exemption_key = Some(cause);
        self
    }

    pub fn intracommunity(mut self, key: IntracommunityType) -> Self {
        self.tax.intracommunity_key = Some(key);
        self
    }

    pub fn build(self) -> Tax {
        self.tax
    }
}

impl FiscalPeriod {
    pub fn new(
        fiscal_year_id: u64,
        fiscal_year: impl Into<String>,
        period_id: u64,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            fiscal_year_id,
            fiscal_year: fiscal_year.into(),
            period_id,
            start_date,
        }
    }
}

impl Company {
    pub fn new(name: impl Into<String>, party: Party) -> Self {
        Self {
            name: name.into(),
            party,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn builder() -> InvoiceBuilder {
        InvoiceBuilder::new(
            InvoiceId(7),
            InvoiceKind::InInvoice,
            date(2017, 7, 3),
            FiscalPeriod::new(1, "2017", 7, date(2017, 7, 1)),
            Company::new("ACME SL", PartyBuilder::new("ACME SL").build()),
        )
        .party(PartyBuilder::new("Proveedor SA").build())
    }

    #[test]
    fn book_key_follows_direction() {
        let inv = builder().reference("P-1").build().unwrap();
        assert_eq!(inv.sii.book_key, Some(BookKey::Received));
        assert_eq!(inv.serial_number(), Some("P-1"));
    }

    #[test]
    fn untaxed_ignores_surcharge_bases() {
        let vat = TaxBuilder::new(1, "IVA 21%", dec!(0.21)).build();
        let re = TaxBuilder::new(2, "RE 5.2%", dec!(0.052))
            .equivalence_surcharge()
            .build();
        let inv = builder()
            .add_tax(vat, dec!(100), dec!(21))
            .add_tax(re, dec!(100), dec!(5.20))
            .build()
            .unwrap();
        assert_eq!(inv.untaxed_amount, dec!(100));
    }

    #[test]
    fn rejects_long_serial() {
        let err = builder().reference("X".repeat(61)).build().unwrap_err();
        assert!(err.to_string().contains("serial number"));
    }

    #[test]
    fn party_required() {
        let res = InvoiceBuilder::new(
            InvoiceId(1),
            InvoiceKind::OutInvoice,
            date(2017, 1, 1),
            FiscalPeriod::new(1, "2017", 1, date(2017, 1, 1)),
            Company::new("ACME SL", PartyBuilder::new("ACME SL").build()),
        )
        .build();
        assert!(res.is_err());
    }
}
