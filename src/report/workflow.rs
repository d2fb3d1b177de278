//! Report state machine, invoice loading and sending.

use chrono::{Datelike, Utc};
use tracing::{debug, info, warn};

use crate::core::*;
use crate::gateway::{CredentialSource, SiiGateway};
use crate::mapping::{self, Headers, PeriodBlock, RecordHeader, SubmitRecord};

use super::ledger::{InvoiceFilter, Ledger};
use super::model::*;
use super::reconcile;

/// The six AEAT operations a report can perform, one per book and
/// communication type pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStrategy {
    SubmitIssued,
    SubmitReceived,
    QueryIssued,
    QueryReceived,
    DeleteIssued,
    DeleteReceived,
}

impl SendStrategy {
    /// Fails with [`SiiError::Configuration`] for any pair AEAT has no
    /// service for (investment goods and intracommunity books).
    pub fn resolve(book: BookKey, operation: CommunicationType) -> Result<Self, SiiError> {
        use CommunicationType::*;
        let strategy = match (book, operation) {
            (BookKey::Issued, New | Amend) => Self::SubmitIssued,
            (BookKey::Issued, Query) => Self::QueryIssued,
            (BookKey::Issued, Delete) => Self::DeleteIssued,
            (BookKey::Received, New | Amend) => Self::SubmitReceived,
            (BookKey::Received, Query) => Self::QueryReceived,
            (BookKey::Received, Delete) => Self::DeleteReceived,
            _ => return Err(SiiError::Configuration { book, operation }),
        };
        Ok(strategy)
    }

    pub fn direction(self) -> Direction {
        match self {
            Self::SubmitIssued | Self::QueryIssued | Self::DeleteIssued => Direction::Issued,
            Self::SubmitReceived | Self::QueryReceived | Self::DeleteReceived => {
                Direction::Received
            }
        }
    }
}

impl Report {
    fn transition(&mut self, to: ReportState) -> Result<(), SiiError> {
        if !self.state.can_transition_to(to) {
            return Err(SiiError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!(report = %self.id, from = %self.state, %to, "report transition");
        self.state = to;
        Ok(())
    }

    /// Period, book and operation type may change while the report is a
    /// draft or has no lines.
    pub fn fields_writable(&self) -> bool {
        self.state == ReportState::Draft || self.lines.is_empty()
    }

    fn ensure_writable(&self, field: &'static str) -> Result<(), SiiError> {
        if self.fields_writable() {
            Ok(())
        } else {
            Err(SiiError::ReadOnly(field))
        }
    }

    pub fn set_period(&mut self, period: FiscalPeriod) -> Result<(), SiiError> {
        self.ensure_writable("period")?;
        self.period = period;
        Ok(())
    }

    pub fn set_operation_type(&mut self, operation: CommunicationType) -> Result<(), SiiError> {
        self.ensure_writable("operation_type")?;
        self.operation_type = operation;
        Ok(())
    }

    pub fn set_book(&mut self, book: BookKey) -> Result<(), SiiError> {
        self.ensure_writable("book")?;
        self.book = book;
        Ok(())
    }

    /// Check everything a confirmed report needs, reporting all problems at once.
    pub fn validate(&self) -> Result<(), SiiError> {
        let mut errors = Vec::new();
        match self.company_vat.as_deref() {
            None | Some("") => errors.push(ValidationError::new("company_vat", "is required")),
            Some(vat) if vat.chars().count() > 9 => errors.push(ValidationError::new(
                "company_vat",
                "must be at most 9 characters",
            )),
            Some(_) => {}
        }
        if !self.is_query() {
            for (i, line) in self.lines.iter().enumerate() {
                if line.invoice.is_none() {
                    errors.push(ValidationError::new(
                        format!("lines[{i}].invoice"),
                        "is required unless the report is a query",
                    ));
                }
            }
        }
        if self.lines.len() > MAX_RECORDS_PER_SUBMISSION {
            errors.push(ValidationError::new(
                "lines",
                format!("at most {MAX_RECORDS_PER_SUBMISSION} invoices per submission"),
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(validation_failure(&errors))
        }
    }

    pub fn confirm(&mut self) -> Result<(), SiiError> {
        if self.state.can_transition_to(ReportState::Confirmed) {
            self.validate()?;
        }
        self.transition(ReportState::Confirmed)
    }

    pub fn draft(&mut self) -> Result<(), SiiError> {
        self.transition(ReportState::Draft)
    }

    /// Lines are kept.
    pub fn cancel(&mut self) -> Result<(), SiiError> {
        self.transition(ReportState::Cancelled)
    }

    pub fn ensure_deletable(&self) -> Result<(), SiiError> {
        if self.state == ReportState::Cancelled {
            Ok(())
        } else {
            Err(SiiError::Workflow(format!(
                "report {} must be cancelled before deletion",
                self.id
            )))
        }
    }

    /// A new draft with the same settings and invoices, every AEAT answer cleared.
    pub fn duplicate(&self, id: ReportId) -> Report {
        Report {
            id,
            company: self.company.clone(),
            company_vat: self.company_vat.clone(),
            version: self.version,
            period: self.period.clone(),
            operation_type: self.operation_type,
            book: self.book,
            state: ReportState::Draft,
            communication_state: None,
            csv: None,
            send_date: None,
            lines: self.lines.iter().map(ReportLine::reset).collect(),
        }
    }

    /// SII states an invoice may be in to be loaded for this operation.
    fn loadable_sii_states(&self) -> Option<Vec<Option<InvoiceSiiState>>> {
        match self.operation_type {
            CommunicationType::New => Some(vec![None, Some(InvoiceSiiState::Rejected)]),
            CommunicationType::Amend => Some(vec![Some(InvoiceSiiState::AcceptedWithErrors)]),
            CommunicationType::Query | CommunicationType::Delete => None,
        }
    }

    /// Attach every eligible invoice of the report's book and period that
    /// is not in the report yet. Returns how many lines were added.
    ///
    /// Query and delete reports load nothing.
    pub fn load_invoices<L: Ledger + ?Sized>(&mut self, ledger: &L) -> Result<usize, SiiError> {
        if !matches!(self.state, ReportState::Draft | ReportState::Confirmed) {
            return Err(SiiError::Workflow(format!(
                "invoices can only be loaded into draft or confirmed reports, {} is {}",
                self.id, self.state
            )));
        }
        let Some(sii_states) = self.loadable_sii_states() else {
            debug!(report = %self.id, operation = %self.operation_type, "nothing to load");
            return Ok(0);
        };

        let filter = InvoiceFilter {
            book_key: self.book,
            fiscal_year_id: self.period.fiscal_year_id,
            period_id: self.period.period_id,
            states: vec![InvoiceState::Posted, InvoiceState::Paid],
            sii_states,
        };
        debug!(report = %self.id, ?filter, "searching invoices for SII report");

        let mut added = 0;
        for invoice in ledger.search_invoices(&filter)? {
            if self.contains(invoice.id) {
                continue;
            }
            if self.lines.len() >= MAX_RECORDS_PER_SUBMISSION {
                warn!(
                    report = %self.id,
                    limit = MAX_RECORDS_PER_SUBMISSION,
                    "report is full, remaining invoices left for another report"
                );
                break;
            }
            self.lines.push(ReportLine::for_invoice(invoice.id));
            added += 1;
        }
        info!(report = %self.id, added, "loaded invoices into SII report");
        Ok(added)
    }

    /// Attach hand-picked invoices. Each must be posted or paid, belong to
    /// the report's period and match the book's direction.
    pub fn add_invoices(&mut self, invoices: &[Invoice]) -> Result<usize, SiiError> {
        if self.state != ReportState::Draft {
            return Err(SiiError::ReadOnly("lines"));
        }
        if self.is_query() {
            return Err(SiiError::Workflow(
                "query reports are filled from the AEAT answer".into(),
            ));
        }

        let direction = self.book.direction();
        let mut errors = Vec::new();
        let mut fresh = Vec::new();
        for invoice in invoices {
            let field = format!("invoice {}", invoice.label());
            if direction.is_some_and(|d| d != invoice.direction()) {
                errors.push(ValidationError::new(
                    &field,
                    format!("does not belong to book {}", self.book),
                ));
            }
            if !matches!(invoice.state, InvoiceState::Posted | InvoiceState::Paid) {
                errors.push(ValidationError::new(&field, "must be posted or paid"));
            }
            if invoice.period.period_id != self.period.period_id
                || invoice.period.fiscal_year_id != self.period.fiscal_year_id
            {
                errors.push(ValidationError::new(&field, "is outside the report period"));
            }
            if !self.contains(invoice.id) && !fresh.contains(&invoice.id) {
                fresh.push(invoice.id);
            }
        }
        if !errors.is_empty() {
            return Err(validation_failure(&errors));
        }
        if self.lines.len() + fresh.len() > MAX_RECORDS_PER_SUBMISSION {
            return Err(SiiError::Validation(format!(
                "a report holds at most {MAX_RECORDS_PER_SUBMISSION} invoices"
            )));
        }

        let added = fresh.len();
        self.lines.extend(fresh.into_iter().map(ReportLine::for_invoice));
        Ok(added)
    }

    /// `Cabecera` for this report's communication.
    pub fn headers(&self) -> Result<Headers, SiiError> {
        let vat = self
            .company_vat
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| SiiError::Validation("company_vat: is required".into()))?;
        Ok(Headers::new(
            self.company.party.name.clone(),
            vat,
            self.operation_type,
            self.version,
        ))
    }

    fn line_invoices<L: Ledger + ?Sized>(&self, ledger: &L) -> Result<Vec<Invoice>, SiiError> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let id = line.invoice.ok_or_else(|| {
                    SiiError::Validation(format!("lines[{i}].invoice: is required"))
                })?;
                ledger
                    .invoice(id)?
                    .ok_or_else(|| SiiError::NotFound(format!("invoice {id}")))
            })
            .collect()
    }

    fn ensure_lines(&self) -> Result<(), SiiError> {
        if self.lines.is_empty() {
            return Err(SiiError::Workflow(format!(
                "report {} has no invoices to send",
                self.id
            )));
        }
        Ok(())
    }

    /// Communicate the report to AEAT and reconcile the answer.
    ///
    /// Every request is built before the gateway is called, so mapping
    /// errors never reach AEAT. A gateway failure leaves the report
    /// confirmed and untouched.
    pub async fn send<G, C, L>(
        &mut self,
        gateway: &G,
        credentials: &C,
        ledger: &mut L,
    ) -> Result<(), SiiError>
    where
        G: SiiGateway + ?Sized,
        C: CredentialSource + ?Sized,
        L: Ledger + ?Sized,
    {
        if !self.state.can_transition_to(ReportState::Sent) {
            return Err(SiiError::InvalidTransition {
                from: self.state,
                to: ReportState::Sent,
            });
        }
        let strategy = SendStrategy::resolve(self.book, self.operation_type)?;
        let direction = strategy.direction();
        let headers = self.headers()?;
        info!(report = %self.id, ?strategy, lines = self.lines.len(), "sending report to AEAT SII");

        match strategy {
            SendStrategy::SubmitIssued | SendStrategy::SubmitReceived => {
                self.ensure_lines()?;
                let records = self
                    .line_invoices(&*ledger)?
                    .iter()
                    .map(mapping::build_submit_record)
                    .collect::<Result<Vec<SubmitRecord>, _>>()?;
                let response = {
                    let credential = credentials.acquire(&self.company)?;
                    gateway.submit(&credential, &headers, direction, &records).await
                }
                .inspect_err(|e| warn!(report = %self.id, error = %e, "SII submission failed"))?;
                reconcile::apply_submit(self, &records, response, ledger)?;
            }
            SendStrategy::DeleteIssued | SendStrategy::DeleteReceived => {
                self.ensure_lines()?;
                let records = self
                    .line_invoices(&*ledger)?
                    .iter()
                    .map(mapping::record_header)
                    .collect::<Result<Vec<RecordHeader>, _>>()?;
                let response = {
                    let credential = credentials.acquire(&self.company)?;
                    gateway.cancel(&credential, &headers, direction, &records).await
                }
                .inspect_err(|e| warn!(report = %self.id, error = %e, "SII deletion failed"))?;
                reconcile::apply_cancel(self, &records, response, ledger)?;
            }
            SendStrategy::QueryIssued | SendStrategy::QueryReceived => {
                let period = PeriodBlock {
                    year: self.period.fiscal_year.clone(),
                    period: format!("{:02}", self.period.start_date.month()),
                };
                let response = {
                    let credential = credentials.acquire(&self.company)?;
                    gateway.query(&credential, &headers, direction, &period).await
                }
                .inspect_err(|e| warn!(report = %self.id, error = %e, "SII query failed"))?;
                reconcile::apply_query(self, direction, response, &*ledger)?;
            }
        }

        self.send_date = Some(Utc::now().naive_utc());
        self.transition(ReportState::Sent)?;
        info!(
            report = %self.id,
            communication_state = ?self.communication_state,
            csv = ?self.csv,
            "done sending report to AEAT SII"
        );
        Ok(())
    }
}
