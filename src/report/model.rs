use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::*;
use crate::mapping::{InvoiceIdBlock, SubmitRecord, TaxDetail};

/// Most invoice records AEAT accepts in one submission.
pub const MAX_RECORDS_PER_SUBMISSION: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReportId(pub u64);

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SII-{}", self.0)
    }
}

/// A batch of invoices of one book and period to communicate to AEAT.
///
/// Period, book and operation type are only writable through the setters,
/// which enforce the read-only rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub company: Company,
    /// Holder NIF, 9 characters. Defaults to the company's.
    pub company_vat: Option<String>,
    pub version: SiiVersion,
    pub(crate) period: FiscalPeriod,
    pub(crate) operation_type: CommunicationType,
    pub(crate) book: BookKey,
    pub(crate) state: ReportState,
    pub(crate) communication_state: Option<CommunicationState>,
    pub(crate) csv: Option<String>,
    pub(crate) send_date: Option<NaiveDateTime>,
    pub(crate) lines: Vec<ReportLine>,
}

impl Report {
    pub fn new(
        id: ReportId,
        company: Company,
        period: FiscalPeriod,
        book: BookKey,
        operation_type: CommunicationType,
    ) -> Self {
        let company_vat = company.party.sii_vat_code();
        Self {
            id,
            company,
            company_vat,
            version: SiiVersion::default(),
            period,
            operation_type,
            book,
            state: ReportState::Draft,
            communication_state: None,
            csv: None,
            send_date: None,
            lines: Vec::new(),
        }
    }

    pub fn state(&self) -> ReportState {
        self.state
    }

    pub fn period(&self) -> &FiscalPeriod {
        &self.period
    }

    pub fn book(&self) -> BookKey {
        self.book
    }

    pub fn operation_type(&self) -> CommunicationType {
        self.operation_type
    }

    pub fn communication_state(&self) -> Option<CommunicationState> {
        self.communication_state
    }

    /// Confirmation code returned by AEAT.
    pub fn csv(&self) -> Option<&str> {
        self.csv.as_deref()
    }

    pub fn send_date(&self) -> Option<NaiveDateTime> {
        self.send_date
    }

    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    /// Whether `invoice` already has a line in this report.
    pub fn contains(&self, invoice: InvoiceId) -> bool {
        self.lines.iter().any(|l| l.invoice == Some(invoice))
    }

    /// Query reports may hold lines without invoice.
    pub fn is_query(&self) -> bool {
        self.operation_type == CommunicationType::Query
    }
}

/// One invoice in a report, with what AEAT said about it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportLine {
    pub invoice: Option<InvoiceId>,
    pub state: Option<InvoiceSiiState>,
    pub communication_code: Option<i64>,
    pub communication_msg: Option<String>,
    pub issuer_vat_number: Option<String>,
    pub serial_number: Option<String>,
    pub final_serial_number: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub invoice_kind: Option<OperationKey>,
    /// Issued or received regime code, depending on the book.
    pub special_key: Option<String>,
    pub total_amount: Option<Decimal>,
    pub counterpart_name: Option<String>,
    pub counterpart_id: Option<String>,
    pub taxes: Vec<ReportLineTax>,
    /// Query only: NIF of whoever presented the record.
    pub presenter: Option<String>,
    pub presentation_date: Option<NaiveDateTime>,
    pub csv: Option<String>,
    pub balance_state: Option<String>,
}

impl ReportLine {
    pub fn for_invoice(invoice: InvoiceId) -> Self {
        Self {
            invoice: Some(invoice),
            ..Default::default()
        }
    }

    /// Same invoice, every response and snapshot field cleared.
    pub fn reset(&self) -> Self {
        Self {
            invoice: self.invoice,
            ..Default::default()
        }
    }

    /// Record the identity block of what was sent.
    pub(crate) fn fill_identity(&mut self, id: &InvoiceIdBlock) {
        self.issuer_vat_number = id.issuer.code().map(str::to_string);
        self.serial_number = Some(id.serial_number.clone());
        self.final_serial_number = id.final_serial_number.clone();
        self.issue_date = parse_issue_date(&id.issue_date);
    }

    /// Record the full snapshot of a register request.
    pub(crate) fn fill_snapshot(&mut self, record: &SubmitRecord) {
        self.fill_identity(record.id());
        let (kind, key, total, counterpart, details) = match record {
            SubmitRecord::Issued(r) => {
                let details = r
                    .body
                    .breakdown
                    .not_exempt
                    .as_ref()
                    .map(|n| n.details.as_slice())
                    .unwrap_or_default();
                (
                    r.body.invoice_kind,
                    r.body.special_key.code(),
                    r.body.total_amount,
                    r.body.counterpart.as_ref(),
                    details,
                )
            }
            SubmitRecord::Received(r) => (
                r.body.invoice_kind,
                r.body.special_key.code(),
                r.body.total_amount,
                r.body.counterpart.as_ref(),
                r.body.details.as_slice(),
            ),
        };
        self.invoice_kind = Some(kind);
        self.special_key = Some(key.to_string());
        self.total_amount = Some(total);
        self.counterpart_name = counterpart.map(|c| c.name.clone());
        self.counterpart_id = counterpart.and_then(|c| c.id.code().map(str::to_string));
        self.taxes = details.iter().map(ReportLineTax::from).collect();
    }
}

/// Tax breakdown of a line as sent or as returned by a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportLineTax {
    pub base: Decimal,
    pub rate: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub surcharge_rate: Option<Decimal>,
    pub surcharge_amount: Option<Decimal>,
    pub reagyp_rate: Option<Decimal>,
    pub reagyp_amount: Option<Decimal>,
}

impl From<&TaxDetail> for ReportLineTax {
    fn from(d: &TaxDetail) -> Self {
        Self {
            base: d.base,
            rate: d.rate,
            amount: d.amount,
            surcharge_rate: d.surcharge_rate,
            surcharge_amount: d.surcharge_amount,
            reagyp_rate: d.reagyp_rate,
            reagyp_amount: d.reagyp_amount,
        }
    }
}

/// AEAT answers `DD-MM-YYYY` where requests carry `DD/MM/YYYY`.
pub(crate) fn parse_issue_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d-%m-%Y"))
        .ok()
}
