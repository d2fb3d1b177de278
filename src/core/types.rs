use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::keys::*;

/// Identifier of an invoice in the host ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InvoiceId(pub u64);

impl std::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An invoice as seen by the SII layer.
///
/// All amounts are in company currency and signed natively: a credit note
/// stores negative amounts and nothing is negated on the way out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub kind: InvoiceKind,
    pub state: InvoiceState,
    /// Number assigned on posting (serial for issued invoices).
    pub number: Option<String>,
    /// Supplier's number (serial for received invoices).
    pub reference: Option<String>,
    pub invoice_date: NaiveDate,
    /// Date of the accounting move (`FechaRegContable` for received invoices).
    pub accounting_date: Option<NaiveDate>,
    pub period: FiscalPeriod,
    pub company: Company,
    pub party: Party,
    pub description: Option<String>,
    pub line_descriptions: Vec<String>,
    pub taxes: Vec<InvoiceTax>,
    pub untaxed_amount: Decimal,
    /// Last ticket number for summary (F4) invoices.
    pub final_serial_number: Option<String>,
    pub sii: SiiInvoiceData,
}

impl Invoice {
    /// Issued or received, from the invoice type.
    pub fn direction(&self) -> Direction {
        self.kind.direction()
    }

    /// Serial number as known to AEAT: `number` when issued, `reference` when received.
    pub fn serial_number(&self) -> Option<&str> {
        match self.direction() {
            Direction::Issued => self.number.as_deref(),
            Direction::Received => self.reference.as_deref(),
        }
    }

    /// A readable label for error messages.
    pub fn label(&self) -> String {
        match self.serial_number() {
            Some(serial) => format!("{} ({serial})", self.id),
            None => self.id.to_string(),
        }
    }

    pub fn is_credit_note(&self) -> bool {
        matches!(self.kind, InvoiceKind::OutCreditNote | InvoiceKind::InCreditNote)
    }
}

/// SII attributes carried by an invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiiInvoiceData {
    pub book_key: Option<BookKey>,
    pub operation_key: Option<OperationKey>,
    pub issued_key: Option<IssuedRegimeKey>,
    pub received_key: Option<ReceivedRegimeKey>,
    pub subjected_key: Option<SubjectedKey>,
    pub exemption_cause: Option<ExemptionCause>,
    pub intracommunity_key: Option<IntracommunityType>,
    /// Posted changes not yet registered at AEAT.
    pub pending_sending: bool,
    /// JSON snapshot of the identity last registered at AEAT.
    pub header: Option<String>,
}

/// Invoice type in the host ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceKind {
    OutInvoice,
    OutCreditNote,
    InInvoice,
    InCreditNote,
}

impl InvoiceKind {
    pub fn direction(&self) -> Direction {
        match self {
            Self::OutInvoice | Self::OutCreditNote => Direction::Issued,
            Self::InInvoice | Self::InCreditNote => Direction::Received,
        }
    }
}

/// Invoice workflow state in the host ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceState {
    Draft,
    Validated,
    Posted,
    Paid,
    Cancelled,
}

/// Whether the company issued or received the invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Issued,
    Received,
}

impl BookKey {
    /// Direction of the invoices kept in this book, if the book is bound to one.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::Issued => Some(Direction::Issued),
            Self::Received => Some(Direction::Received),
            Self::InvestmentGoods | Self::Intracommunity => None,
        }
    }
}

/// Accounting period an invoice is posted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalPeriod {
    pub fiscal_year_id: u64,
    /// Fiscal year name, sent as `Ejercicio` (e.g. "2017").
    pub fiscal_year: String,
    pub period_id: u64,
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    pub party: Party,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    /// VAT code with country prefix (e.g. "ESB12345678").
    pub vat_code: Option<String>,
    pub identifiers: Vec<PartyIdentifier>,
    pub sii_identifier_type: Option<PartyIdentifierType>,
    /// Country of the invoice address (ISO 3166-1 alpha-2).
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyIdentifier {
    pub kind: IdentifierKind,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentifierKind {
    EuVat,
    EuNotVat,
    Other(String),
}

/// Tax definition from the chart of taxes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tax {
    pub id: u64,
    pub name: String,
    /// Rate as a fraction: 0.21 is 21 %.
    pub rate: Decimal,
    pub parent: Option<u64>,
    /// Equivalence surcharge (recargo de equivalencia) child tax.
    pub equivalence_surcharge: bool,
    /// Input tax the company may deduct.
    pub deductible: bool,
    pub book_key: Option<BookKey>,
    pub issued_key: Option<IssuedRegimeKey>,
    pub received_key: Option<ReceivedRegimeKey>,
    pub subjected_key: Option<SubjectedKey>,
    pub exemption_key: Option<ExemptionCause>,
    pub intracommunity_key: Option<IntracommunityType>,
}

/// One tax line of an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceTax {
    pub tax: Tax,
    pub base: Decimal,
    pub amount: Decimal,
}
