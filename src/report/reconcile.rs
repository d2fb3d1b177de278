//! Writing AEAT answers back onto reports, lines and invoices.
//!
//! Register and delete answers are paired with the records sent by the
//! identity AEAT echoes back (issuer, serial number and issue date). An
//! identity that is not unique on both sides stays unmatched, so one answer
//! line never lands on two invoices. Only when the answer carries no
//! identities at all are they paired by position.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::core::*;
use crate::gateway::{QueryRecord, QueryResponse, ResponseLine, SubmitResponse};
use crate::mapping::{CorrelationKey, InvoiceIdBlock, RecordHeader, SubmitRecord, format_date};

use super::ledger::Ledger;
use super::model::{Report, ReportLine, ReportLineTax};

/// Pair each sent identity with its answer line, by index into `sent`.
fn pair_responses<'r>(
    report: &Report,
    sent: &[&InvoiceIdBlock],
    lines: &'r [ResponseLine],
) -> Vec<Option<&'r ResponseLine>> {
    if !lines.is_empty() && lines.iter().all(|l| l.key.is_none()) {
        warn!(
            report = %report.id,
            sent = sent.len(),
            received = lines.len(),
            "AEAT answer carries no invoice identities, pairing by position"
        );
        return (0..sent.len()).map(|i| lines.get(i)).collect();
    }

    let keys: Vec<CorrelationKey> = sent.iter().map(|id| id.correlation_key()).collect();
    let mut sent_count: HashMap<&CorrelationKey, usize> = HashMap::new();
    for key in &keys {
        *sent_count.entry(key).or_default() += 1;
    }
    let mut by_key: HashMap<&CorrelationKey, Vec<&ResponseLine>> = HashMap::new();
    for line in lines {
        if let Some(key) = &line.key {
            by_key.entry(key).or_default().push(line);
        }
    }

    keys.iter()
        .map(|key| {
            let answers = by_key.get(key).map(Vec::as_slice).unwrap_or_default();
            match answers {
                [answer] if sent_count.get(key) == Some(&1) => Some(*answer),
                [] => {
                    warn!(
                        report = %report.id,
                        issuer = %key.issuer,
                        serial = %key.serial_number,
                        date = %key.issue_date,
                        "no AEAT answer for invoice"
                    );
                    None
                }
                _ => {
                    warn!(
                        report = %report.id,
                        issuer = %key.issuer,
                        serial = %key.serial_number,
                        date = %key.issue_date,
                        sent = sent_count.get(key).copied().unwrap_or_default(),
                        received = answers.len(),
                        "ambiguous AEAT answer for invoice, leaving it unmatched"
                    );
                    None
                }
            }
        })
        .collect()
}

fn linked_invoice<L: Ledger + ?Sized>(
    line: &ReportLine,
    ledger: &L,
) -> Result<Option<Invoice>, SiiError> {
    match line.invoice {
        Some(id) => ledger.invoice(id),
        None => Ok(None),
    }
}

fn apply_line(line: &mut ReportLine, answer: &ResponseLine) {
    line.state = Some(answer.state);
    line.communication_code = answer.error_code;
    line.communication_msg = answer.error_message.clone();
}

/// Reconcile a register (`A0`/`A1`) answer. Lines and records share order.
///
/// Invoices accepted by AEAT, with or without errors, stop being pending and
/// remember the identity they were registered under.
pub(crate) fn apply_submit<L: Ledger + ?Sized>(
    report: &mut Report,
    records: &[SubmitRecord],
    response: SubmitResponse,
    ledger: &mut L,
) -> Result<(), SiiError> {
    let ids: Vec<&InvoiceIdBlock> = records.iter().map(SubmitRecord::id).collect();
    let answers = pair_responses(report, &ids, &response.lines);

    for ((line, record), answer) in report.lines.iter_mut().zip(records).zip(answers) {
        line.fill_snapshot(record);
        let Some(answer) = answer else { continue };
        apply_line(line, answer);

        if answer.state.is_registered() {
            if let Some(mut invoice) = linked_invoice(line, &*ledger)? {
                invoice.sii.pending_sending = false;
                invoice.sii.header = Some(record.header().to_snapshot());
                ledger.save_invoice(&invoice)?;
            }
        }
    }

    report.communication_state = Some(response.state);
    report.csv = response.csv;
    Ok(())
}

/// Reconcile a delete (`D0`) answer. Accepted records are marked deleted on
/// the line and lose their stored identity.
pub(crate) fn apply_cancel<L: Ledger + ?Sized>(
    report: &mut Report,
    records: &[RecordHeader],
    response: SubmitResponse,
    ledger: &mut L,
) -> Result<(), SiiError> {
    let ids: Vec<&InvoiceIdBlock> = records.iter().map(|r| &r.id).collect();
    let answers = pair_responses(report, &ids, &response.lines);

    for ((line, record), answer) in report.lines.iter_mut().zip(records).zip(answers) {
        line.fill_identity(&record.id);
        let Some(answer) = answer else { continue };
        apply_line(line, answer);

        if answer.state.is_registered() {
            line.state = Some(InvoiceSiiState::Deleted);
            if let Some(mut invoice) = linked_invoice(line, &*ledger)? {
                invoice.sii.header = None;
                ledger.save_invoice(&invoice)?;
            }
        }
    }

    report.communication_state = Some(response.state);
    report.csv = response.csv;
    Ok(())
}

/// Identity of the issuer as AEAT records it.
fn issuer_code(invoice: &Invoice) -> Option<String> {
    match invoice.direction() {
        Direction::Issued => invoice.company.party.sii_vat_code(),
        Direction::Received => Some(invoice.party.counterpart_nif()),
    }
}

/// Pick the local invoice a query record refers to.
///
/// Serial numbers are not unique over time, so several candidates are
/// narrowed down by issue date and issuer. Anything still ambiguous stays
/// unlinked.
fn match_invoice(
    report: &Report,
    record: &QueryRecord,
    candidates: &[Invoice],
) -> Option<InvoiceId> {
    let key = record.id.correlation_key();
    let same_serial: Vec<&Invoice> = candidates
        .iter()
        .filter(|i| i.serial_number().map(str::trim) == Some(key.serial_number.as_str()))
        .collect();
    if let [only] = same_serial.as_slice() {
        return Some(only.id);
    }

    let issuer = record.id.issuer.code();
    let exact: Vec<&Invoice> = same_serial
        .into_iter()
        .filter(|i| format_date(i.invoice_date) == key.issue_date)
        .filter(|i| issuer.is_none() || issuer_code(i).as_deref() == issuer)
        .collect();
    match exact.as_slice() {
        [only] => Some(only.id),
        [] => {
            debug!(
                report = %report.id,
                serial = %key.serial_number,
                "no local invoice for AEAT record"
            );
            None
        }
        many => {
            warn!(
                report = %report.id,
                serial = %key.serial_number,
                candidates = many.len(),
                "AEAT record matches several invoices, left unlinked"
            );
            None
        }
    }
}

fn query_line(invoice: Option<InvoiceId>, record: &QueryRecord) -> ReportLine {
    let mut line = ReportLine {
        invoice,
        state: Some(record.state),
        communication_code: record.error_code,
        communication_msg: record.error_message.clone(),
        invoice_kind: record.invoice_kind,
        special_key: record.special_key.clone(),
        total_amount: record.total_amount,
        counterpart_name: record.counterpart.as_ref().map(|c| c.name.clone()),
        counterpart_id: record
            .counterpart
            .as_ref()
            .and_then(|c| c.id.code().map(str::to_string)),
        taxes: record.taxes.iter().map(ReportLineTax::from).collect(),
        balance_state: record.balance_state.clone(),
        ..Default::default()
    };
    line.fill_identity(&record.id);
    if let Some(p) = &record.presentation {
        line.presenter = Some(p.presenter.clone());
        line.presentation_date = p.timestamp;
        line.csv = p.csv.clone();
    }
    line
}

/// Replace the report's lines with what AEAT holds for the period.
pub(crate) fn apply_query<L: Ledger + ?Sized>(
    report: &mut Report,
    direction: Direction,
    response: QueryResponse,
    ledger: &L,
) -> Result<(), SiiError> {
    let serials: Vec<String> = response
        .records
        .iter()
        .map(|r| r.id.serial_number.trim().to_string())
        .collect();
    let candidates = ledger.invoices_by_serial(direction, &serials)?;

    let lines: Vec<ReportLine> = response
        .records
        .iter()
        .map(|record| query_line(match_invoice(report, record, &candidates), record))
        .collect();
    debug!(report = %report.id, records = lines.len(), "query answer reconciled");
    report.lines = lines;
    Ok(())
}
