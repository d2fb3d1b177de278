//! The host ledger the report workflow reads invoices from and writes back to.

use crate::core::*;

use super::model::{Report, ReportId};
use crate::core::ReportState;

/// Invoice search criteria used by LoadInvoices.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceFilter {
    pub book_key: BookKey,
    pub fiscal_year_id: u64,
    pub period_id: u64,
    /// Invoice workflow states to include.
    pub states: Vec<InvoiceState>,
    /// Accepted SII states; `None` in the list stands for "never reported".
    /// An empty list does not filter.
    pub sii_states: Vec<Option<InvoiceSiiState>>,
}

impl InvoiceFilter {
    pub fn matches(&self, invoice: &Invoice, sii_state: Option<InvoiceSiiState>) -> bool {
        invoice.sii.book_key == Some(self.book_key)
            && invoice.period.fiscal_year_id == self.fiscal_year_id
            && invoice.period.period_id == self.period_id
            && self.states.contains(&invoice.state)
            && (self.sii_states.is_empty() || self.sii_states.contains(&sii_state))
    }
}

/// One report line an invoice appears in.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub report: ReportId,
    pub report_state: ReportState,
    pub line_index: usize,
    pub state: Option<InvoiceSiiState>,
}

/// SII state of an invoice: the outcome on its most recent report line.
pub fn latest_state(history: &[HistoryEntry]) -> Option<InvoiceSiiState> {
    history
        .iter()
        .max_by_key(|h| (h.report, h.line_index))
        .and_then(|h| h.state)
}

/// Persistence collaborator. The library never owns invoices or reports.
pub trait Ledger {
    fn search_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, SiiError>;

    fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, SiiError>;

    /// Invoices of `direction` whose serial number is one of `serials`.
    fn invoices_by_serial(
        &self,
        direction: Direction,
        serials: &[String],
    ) -> Result<Vec<Invoice>, SiiError>;

    /// Every report line referencing the invoice.
    fn sii_history(&self, id: InvoiceId) -> Result<Vec<HistoryEntry>, SiiError>;

    fn save_invoice(&mut self, invoice: &Invoice) -> Result<(), SiiError>;

    fn save_report(&mut self, report: &Report) -> Result<(), SiiError>;

    fn sii_state(&self, id: InvoiceId) -> Result<Option<InvoiceSiiState>, SiiError> {
        Ok(latest_state(&self.sii_history(id)?))
    }
}
