use std::collections::BTreeMap;

use crate::core::*;

use super::ledger::{HistoryEntry, InvoiceFilter, Ledger};
use super::model::{Report, ReportId};

/// In-memory [`Ledger`] for tests, demos and hosts without their own store.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    invoices: BTreeMap<InvoiceId, Invoice>,
    reports: BTreeMap<ReportId, Report>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_invoice(&mut self, invoice: Invoice) {
        self.invoices.insert(invoice.id, invoice);
    }

    pub fn report(&self, id: ReportId) -> Option<&Report> {
        self.reports.get(&id)
    }

    pub fn remove_report(&mut self, id: ReportId) -> Option<Report> {
        self.reports.remove(&id)
    }
}

impl Ledger for MemoryLedger {
    fn search_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, SiiError> {
        let mut found = Vec::new();
        for invoice in self.invoices.values() {
            if filter.matches(invoice, self.sii_state(invoice.id)?) {
                found.push(invoice.clone());
            }
        }
        Ok(found)
    }

    fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, SiiError> {
        Ok(self.invoices.get(&id).cloned())
    }

    fn invoices_by_serial(
        &self,
        direction: Direction,
        serials: &[String],
    ) -> Result<Vec<Invoice>, SiiError> {
        Ok(self
            .invoices
            .values()
            .filter(|i| i.direction() == direction)
            .filter(|i| {
                i.serial_number()
                    .is_some_and(|s| serials.iter().any(|x| x == s))
            })
            .cloned()
            .collect())
    }

    fn sii_history(&self, id: InvoiceId) -> Result<Vec<HistoryEntry>, SiiError> {
        Ok(self
            .reports
            .values()
            .flat_map(|report| {
                report
                    .lines()
                    .iter()
                    .enumerate()
                    .filter(move |(_, line)| line.invoice == Some(id))
                    .map(move |(line_index, line)| HistoryEntry {
                        report: report.id,
                        report_state: report.state(),
                        line_index,
                        state: line.state,
                    })
            })
            .collect())
    }

    fn save_invoice(&mut self, invoice: &Invoice) -> Result<(), SiiError> {
        if !self.invoices.contains_key(&invoice.id) {
            return Err(SiiError::NotFound(format!("invoice {}", invoice.id)));
        }
        self.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    fn save_report(&mut self, report: &Report) -> Result<(), SiiError> {
        self.reports.insert(report.id, report.clone());
        Ok(())
    }
}
