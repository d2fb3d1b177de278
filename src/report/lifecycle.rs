//! SII side of the invoice lifecycle: what happens on post and draft, and
//! what a pending invoice needs next.

use rust_decimal::Decimal;
use tracing::debug;

use crate::core::*;
use crate::mapping::{RecordHeader, record_header};

use super::ledger::Ledger;
use crate::core::ReportState;

/// Warning raised when posting an invoice AEAT already knows about.
pub const WARN_POST_WITH_HISTORY: &str = "sii_post_with_history";
/// Warning raised when drafting an invoice of a sent or cancelled report.
pub const WARN_DRAFT_REPORTED: &str = "sii_draft_reported";

/// What a pending invoice needs to become current at AEAT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    /// Nothing pending.
    UpToDate,
    /// Never registered: send with `A0`.
    New,
    /// Registered under the same identity: send with `A1`.
    Amend,
    /// Registered under another identity: delete the old record, then send as new.
    DeleteAndResend { previous: RecordHeader },
}

/// Operation key for invoices raised from a sale: a refund when the
/// untaxed amount is negative.
pub fn sale_operation_key(untaxed_amount: Decimal) -> OperationKey {
    if untaxed_amount < Decimal::ZERO {
        OperationKey::CorrectedLaw
    } else {
        OperationKey::Invoice
    }
}

/// Fill SII keys the invoice lacks from its taxes, first tax first.
pub fn apply_tax_defaults(invoice: &mut Invoice) {
    let default_key = if invoice.is_credit_note() {
        OperationKey::CorrectedLaw
    } else {
        sale_operation_key(invoice.untaxed_amount)
    };
    let sii = &mut invoice.sii;
    for line in invoice.taxes.iter().filter(|t| !t.tax.equivalence_surcharge) {
        let tax = &line.tax;
        sii.book_key = sii.book_key.or(tax.book_key);
        sii.issued_key = sii.issued_key.or(tax.issued_key);
        sii.received_key = sii.received_key.or(tax.received_key);
        sii.subjected_key = sii.subjected_key.or(tax.subjected_key);
        sii.exemption_cause = sii.exemption_cause.or(tax.exemption_key);
        sii.intracommunity_key = sii.intracommunity_key.or(tax.intracommunity_key);
    }
    sii.operation_key = sii.operation_key.or(Some(default_key));
}

fn warning(key: &str, message: String) -> SiiError {
    SiiError::Warning {
        key: key.to_string(),
        message,
    }
}

/// Post `invoice`: default its keys and flag it for sending when it
/// belongs to a book.
///
/// Posting again an invoice that already went to AEAT raises
/// [`WARN_POST_WITH_HISTORY`] unless it is in `acknowledged`.
pub fn post<L: Ledger + ?Sized>(
    ledger: &L,
    invoice: &mut Invoice,
    acknowledged: &[&str],
) -> Result<(), SiiError> {
    let history = ledger.sii_history(invoice.id)?;
    if !history.is_empty() && !acknowledged.contains(&WARN_POST_WITH_HISTORY) {
        return Err(warning(
            WARN_POST_WITH_HISTORY,
            format!(
                "invoice {} already has SII records; posting it again will require a new communication",
                invoice.label()
            ),
        ));
    }
    apply_tax_defaults(invoice);
    invoice.sii.pending_sending = invoice.sii.book_key.is_some();
    invoice.state = InvoiceState::Posted;
    debug!(invoice = %invoice.id, pending = invoice.sii.pending_sending, "posted");
    Ok(())
}

/// Move `invoice` back to draft.
///
/// Blocked while the invoice is in a confirmed report. An invoice in a sent
/// or cancelled report needs [`WARN_DRAFT_REPORTED`] acknowledged.
pub fn draft<L: Ledger + ?Sized>(
    ledger: &L,
    invoice: &mut Invoice,
    acknowledged: &[&str],
) -> Result<(), SiiError> {
    let history = ledger.sii_history(invoice.id)?;
    if let Some(entry) = history
        .iter()
        .find(|h| h.report_state == ReportState::Confirmed)
    {
        return Err(SiiError::Workflow(format!(
            "invoice {} is in confirmed SII report {}; set the report back to draft or cancel it first",
            invoice.label(),
            entry.report
        )));
    }
    let reported = history
        .iter()
        .any(|h| matches!(h.report_state, ReportState::Sent | ReportState::Cancelled));
    if reported && !acknowledged.contains(&WARN_DRAFT_REPORTED) {
        return Err(warning(
            WARN_DRAFT_REPORTED,
            format!(
                "invoice {} was already communicated to AEAT",
                invoice.label()
            ),
        ));
    }
    invoice.state = InvoiceState::Draft;
    Ok(())
}

/// Compare the identity the invoice would be sent under with the one it
/// was last registered under.
pub fn pending_action(invoice: &Invoice) -> Result<PendingAction, SiiError> {
    if !invoice.sii.pending_sending {
        return Ok(PendingAction::UpToDate);
    }
    let Some(stored) = invoice.sii.header.as_deref() else {
        return Ok(PendingAction::New);
    };
    let current = record_header(invoice)?;
    match RecordHeader::from_snapshot(stored) {
        Some(previous) if previous == current => Ok(PendingAction::Amend),
        Some(previous) => Ok(PendingAction::DeleteAndResend { previous }),
        None => Err(SiiError::mapping(
            invoice.label(),
            "stored SII header is not readable",
        )),
    }
}

/// Change book and operation keys of posted invoices and flag them for sending.
///
/// Every invoice must fit the book's direction; nothing changes otherwise.
pub fn reassign_keys(
    invoices: &mut [Invoice],
    book_key: BookKey,
    operation_key: OperationKey,
) -> Result<usize, SiiError> {
    if let Some(direction) = book_key.direction() {
        if invoices.iter().all(|i| i.direction() != direction) {
            return Err(SiiError::Validation(format!(
                "the SII book key {book_key} is not available for any of the selected invoices"
            )));
        }
        let wrong: Vec<ValidationError> = invoices
            .iter()
            .filter(|i| i.direction() != direction)
            .map(|i| {
                ValidationError::new(
                    format!("invoice {}", i.label()),
                    format!("cannot use book {book_key}"),
                )
            })
            .collect();
        if !wrong.is_empty() {
            return Err(validation_failure(&wrong));
        }
    }
    for invoice in invoices.iter_mut() {
        invoice.sii.book_key = Some(book_key);
        invoice.sii.operation_key = Some(operation_key);
        invoice.sii.pending_sending = true;
    }
    Ok(invoices.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{MemoryLedger, Report, ReportId, ReportLine};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn company() -> Company {
        Company::new(
            "ACME SL",
            PartyBuilder::new("ACME SL").vat_code("ESB12345678").build(),
        )
    }

    fn period() -> FiscalPeriod {
        FiscalPeriod::new(1, "2017", 3, date(2017, 3, 1))
    }

    fn vat21() -> Tax {
        TaxBuilder::new(1, "IVA 21%", dec!(0.21))
            .subjected(SubjectedKey::NoReverseCharge)
            .issued_key(IssuedRegimeKey::General)
            .build()
    }

    fn invoice(id: u64, kind: InvoiceKind) -> Invoice {
        InvoiceBuilder::new(InvoiceId(id), kind, date(2017, 3, 9), period(), company())
            .state(InvoiceState::Validated)
            .number(format!("FV-{id}"))
            .party(PartyBuilder::new("Cliente").vat_code("ESA87654321").build())
            .add_tax(vat21(), dec!(100), dec!(21))
            .build()
            .unwrap()
    }

    fn report_with(ledger: &mut MemoryLedger, id: u64, invoice: InvoiceId, state: ReportState) {
        let mut r = Report::new(
            ReportId(id),
            company(),
            period(),
            BookKey::Issued,
            CommunicationType::New,
        );
        r.lines.push(ReportLine {
            state: Some(InvoiceSiiState::Accepted),
            ..ReportLine::for_invoice(invoice)
        });
        r.state = state;
        ledger.save_report(&r).unwrap();
    }

    #[test]
    fn post_defaults_keys_and_flags_pending() {
        let ledger = MemoryLedger::new();
        let mut inv = invoice(1, InvoiceKind::OutInvoice);
        post(&ledger, &mut inv, &[]).unwrap();
        assert_eq!(inv.state, InvoiceState::Posted);
        assert!(inv.sii.pending_sending);
        assert_eq!(inv.sii.issued_key, Some(IssuedRegimeKey::General));
        assert_eq!(inv.sii.subjected_key, Some(SubjectedKey::NoReverseCharge));
        assert_eq!(inv.sii.operation_key, Some(OperationKey::Invoice));
    }

    #[test]
    fn credit_notes_default_to_r1() {
        let ledger = MemoryLedger::new();
        let mut inv = invoice(1, InvoiceKind::OutCreditNote);
        post(&ledger, &mut inv, &[]).unwrap();
        assert_eq!(inv.sii.operation_key, Some(OperationKey::CorrectedLaw));
        assert_eq!(sale_operation_key(dec!(-100)), OperationKey::CorrectedLaw);
        assert_eq!(sale_operation_key(dec!(0)), OperationKey::Invoice);
    }

    #[test]
    fn post_with_history_warns_until_acknowledged() {
        let mut ledger = MemoryLedger::new();
        let mut inv = invoice(1, InvoiceKind::OutInvoice);
        report_with(&mut ledger, 1, inv.id, ReportState::Sent);

        let err = post(&ledger, &mut inv, &[]).unwrap_err();
        assert!(err.is_warning());
        post(&ledger, &mut inv, &[WARN_POST_WITH_HISTORY]).unwrap();
    }

    #[test]
    fn draft_blocked_by_confirmed_report() {
        let mut ledger = MemoryLedger::new();
        let mut inv = invoice(1, InvoiceKind::OutInvoice);
        inv.state = InvoiceState::Posted;
        report_with(&mut ledger, 1, inv.id, ReportState::Confirmed);

        let err = draft(&ledger, &mut inv, &[WARN_DRAFT_REPORTED]).unwrap_err();
        assert!(matches!(err, SiiError::Workflow(_)));
        assert_eq!(inv.state, InvoiceState::Posted);
    }

    #[test]
    fn draft_of_sent_invoice_needs_acknowledgement() {
        let mut ledger = MemoryLedger::new();
        let mut inv = invoice(1, InvoiceKind::OutInvoice);
        inv.state = InvoiceState::Posted;
        report_with(&mut ledger, 1, inv.id, ReportState::Sent);

        assert!(draft(&ledger, &mut inv, &[]).unwrap_err().is_warning());
        draft(&ledger, &mut inv, &[WARN_DRAFT_REPORTED]).unwrap();
        assert_eq!(inv.state, InvoiceState::Draft);
    }

    #[test]
    fn draft_without_history_is_free() {
        let ledger = MemoryLedger::new();
        let mut inv = invoice(1, InvoiceKind::OutInvoice);
        draft(&ledger, &mut inv, &[]).unwrap();
        assert_eq!(inv.state, InvoiceState::Draft);
    }

    #[test]
    fn pending_action_follows_stored_identity() {
        let mut inv = invoice(1, InvoiceKind::OutInvoice);
        inv.sii.operation_key = Some(OperationKey::Invoice);
        assert_eq!(pending_action(&inv).unwrap(), PendingAction::UpToDate);

        inv.sii.pending_sending = true;
        assert_eq!(pending_action(&inv).unwrap(), PendingAction::New);

        let sent = record_header(&inv).unwrap();
        inv.sii.header = Some(sent.to_snapshot());
        assert_eq!(pending_action(&inv).unwrap(), PendingAction::Amend);

        inv.invoice_date = date(2017, 3, 10);
        assert_eq!(
            pending_action(&inv).unwrap(),
            PendingAction::DeleteAndResend { previous: sent }
        );
    }

    #[test]
    fn reassign_checks_book_direction() {
        let mut invoices = vec![invoice(1, InvoiceKind::OutInvoice)];
        let err =
            reassign_keys(&mut invoices, BookKey::Received, OperationKey::Invoice).unwrap_err();
        assert!(err.to_string().contains("not available"));

        let n = reassign_keys(&mut invoices, BookKey::Issued, OperationKey::SimplifiedInvoice)
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(
            invoices[0].sii.operation_key,
            Some(OperationKey::SimplifiedInvoice)
        );
        assert!(invoices[0].sii.pending_sending);
    }
}
