//! Property-based tests for mapping and the report state machine.
//!
//! Run with: `cargo test --test proptest_tests`

use aeat_sii::core::*;
use aeat_sii::mapping::*;
use aeat_sii::report::*;
use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
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

fn period(month: u32) -> FiscalPeriod {
    FiscalPeriod::new(1, "2017", month as u64, date(2017, month, 1))
}

/// One qualifying tax line: (base, rate, deductible).
type TaxLine = (Decimal, Decimal, bool);

fn build_invoice(
    kind: InvoiceKind,
    month: u32,
    op: OperationKey,
    lines: &[TaxLine],
) -> Invoice {
    let mut builder = InvoiceBuilder::new(InvoiceId(1), kind, date(2017, month, 15), period(month), company())
        .number("FV-PROP")
        .reference("PROV-PROP")
        .party(PartyBuilder::new("Cliente SA").vat_code("ESA87654321").build())
        .operation_key(op)
        .issued_key(IssuedRegimeKey::General)
        .received_key(ReceivedRegimeKey::General)
        .subjected_key(SubjectedKey::NoReverseCharge);
    for (i, (base, rate, deductible)) in lines.iter().enumerate() {
        let mut tax = TaxBuilder::new(i as u64 + 1, format!("IVA {rate}"), *rate)
            .subjected(SubjectedKey::NoReverseCharge);
        if *deductible {
            tax = tax.deductible();
        }
        builder = builder.add_tax(tax.build(), *base, (*base * *rate).round_dp(2));
    }
    builder.build().unwrap()
}

// ── Proptest Strategies ─────────────────────────────────────────────────────

/// Signed amount between -99999.99 and 99999.99, never zero.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2)),
        (1i64..10_000_000i64).prop_map(|cents| Decimal::new(-cents, 2)),
    ]
}

fn arb_rate() -> impl Strategy<Value = Decimal> {
    prop_oneof![Just(dec!(0.04)), Just(dec!(0.10)), Just(dec!(0.21))]
}

fn arb_tax_lines() -> impl Strategy<Value = Vec<TaxLine>> {
    prop::collection::vec((arb_amount(), arb_rate(), any::<bool>()), 1..=4)
}

fn arb_operation_key() -> impl Strategy<Value = OperationKey> {
    prop::sample::select(OperationKey::ALL.to_vec())
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Confirm,
    Draft,
    Cancel,
}

fn arb_actions() -> impl Strategy<Value = Vec<Action>> {
    prop::collection::vec(
        prop_oneof![Just(Action::Confirm), Just(Action::Draft), Just(Action::Cancel)],
        0..20,
    )
}

// ── Property Tests ──────────────────────────────────────────────────────────

proptest! {
    /// The period is always the two-digit month of the period start.
    #[test]
    fn period_is_two_digit_month(month in 1u32..=12, lines in arb_tax_lines()) {
        let inv = build_invoice(InvoiceKind::OutInvoice, month, OperationKey::Invoice, &lines);
        let req = IssuedMapper.build_request(&inv).unwrap();
        prop_assert_eq!(req.period.period.len(), 2);
        prop_assert_eq!(req.period.period.parse::<u32>().unwrap(), month);
        prop_assert_eq!(req.id.issue_date, format!("15/{month:02}/2017"));
    }

    /// Counterparts are left out exactly for F2, F4 and R5.
    #[test]
    fn counterpart_only_when_the_kind_has_one(op in arb_operation_key(), lines in arb_tax_lines()) {
        let inv = build_invoice(InvoiceKind::OutInvoice, 7, op, &lines);
        let body = IssuedMapper.build_issued_invoice(&inv).unwrap();
        let expected = !matches!(
            op,
            OperationKey::SimplifiedInvoice
                | OperationKey::InvoiceSummary
                | OperationKey::CorrectedSimplified
        );
        prop_assert_eq!(body.counterpart.is_some(), expected);
        prop_assert_eq!(body.rectification.is_some(), op.is_corrective());
    }

    /// Totals and deductible amounts are signed sums of what is stored.
    #[test]
    fn received_amounts_are_signed_sums(lines in arb_tax_lines()) {
        let inv = build_invoice(InvoiceKind::InInvoice, 7, OperationKey::Invoice, &lines);
        let body = ReceivedMapper.build_received_invoice(&inv).unwrap();

        let total: Decimal = inv.taxes.iter().map(|t| t.base + t.amount).sum();
        let deductible: Decimal = inv
            .taxes
            .iter()
            .filter(|t| t.tax.deductible)
            .map(|t| t.amount)
            .sum();
        prop_assert_eq!(body.total_amount, total);
        prop_assert_eq!(body.deductible_amount, deductible);
        prop_assert_eq!(body.details.len(), lines.len());
        for (detail, tax) in body.details.iter().zip(&inv.taxes) {
            prop_assert_eq!(detail.base, tax.base);
            prop_assert_eq!(detail.amount, Some(tax.amount));
        }
    }

    /// The identity AEAT echoes back, with dashed dates, keys the same record.
    #[test]
    fn echoed_identity_matches_sent(month in 1u32..=12, day in 1u32..=28) {
        let mut inv = build_invoice(InvoiceKind::OutInvoice, month, OperationKey::Invoice, &[(dec!(10), dec!(0.21), false)]);
        inv.invoice_date = date(2017, month, day);
        let header = record_header(&inv).unwrap();
        let echoed = CorrelationKey::new(
            header.id.issuer.code().unwrap_or_default(),
            &format!(" {} ", header.id.serial_number),
            &header.id.issue_date.replace('/', "-"),
        );
        prop_assert_eq!(header.id.correlation_key(), echoed);
    }

    /// Free text always leaves as ASCII without the symbols AEAT rejects.
    #[test]
    fn unaccent_yields_plain_ascii(text in "\\PC{0,40}") {
        let out = unaccent(&text);
        prop_assert!(out.is_ascii());
        prop_assert!(!out.contains(['"', '/', '*', '@', '<', '>', '\\']));
        prop_assert!(!out.starts_with('_') && !out.ends_with('_'));
    }

    /// Whatever the operator does, the report only moves along listed edges
    /// and refused moves leave it untouched.
    #[test]
    fn report_state_follows_the_table(actions in arb_actions()) {
        let mut report = Report::new(
            ReportId(1),
            company(),
            period(7),
            BookKey::Issued,
            CommunicationType::New,
        );
        for action in actions {
            let before = report.state();
            let (result, target) = match action {
                Action::Confirm => (report.confirm(), ReportState::Confirmed),
                Action::Draft => (report.draft(), ReportState::Draft),
                Action::Cancel => (report.cancel(), ReportState::Cancelled),
            };
            if before.can_transition_to(target) {
                prop_assert!(result.is_ok());
                prop_assert_eq!(report.state(), target);
            } else {
                prop_assert!(result.is_err());
                prop_assert_eq!(report.state(), before);
            }
        }
    }
}
