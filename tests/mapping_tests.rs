use aeat_sii::core::*;
use aeat_sii::mapping::*;
use chrono::NaiveDate;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn company() -> Company {
    Company::new(
        "Distribuciones Ibéricas SL",
        PartyBuilder::new("Distribuciones Ibéricas SL")
            .vat_code("ESB12345678")
            .build(),
    )
}

fn period() -> FiscalPeriod {
    FiscalPeriod::new(3, "2017", 39, date(2017, 11, 1))
}

// --- Issued ---

#[test]
fn issued_with_surcharge_and_exempt_part() {
    let vat = TaxBuilder::new(10, "IVA 21%", dec!(0.21))
        .parent(1)
        .subjected(SubjectedKey::NoReverseCharge)
        .build();
    let surcharge = TaxBuilder::new(11, "Recargo 5,2%", dec!(0.052))
        .parent(1)
        .equivalence_surcharge()
        .subjected(SubjectedKey::NoReverseCharge)
        .build();
    let exempt = TaxBuilder::new(12, "IVA exento", dec!(0))
        .exempt(ExemptionCause::Article20)
        .build();

    let invoice = InvoiceBuilder::new(
        InvoiceId(7),
        InvoiceKind::OutInvoice,
        date(2017, 11, 30),
        period(),
        company(),
    )
    .number("2017/0456")
    .party(PartyBuilder::new("Farmacia López").vat_code("ES12345678Z").build())
    .description("Suministro de material sanitario")
    .operation_key(OperationKey::Invoice)
    .issued_key(IssuedRegimeKey::General)
    .subjected_key(SubjectedKey::NoReverseCharge)
    .exemption_cause(ExemptionCause::Article20)
    .add_tax(vat, dec!(200), dec!(42))
    .add_tax(surcharge, dec!(200), dec!(10.40))
    .add_tax(exempt, dec!(50), dec!(0))
    .build()
    .unwrap();

    let req = IssuedMapper.build_request(&invoice).unwrap();
    assert_eq!(req.period.year, "2017");
    assert_eq!(req.period.period, "11");
    assert_eq!(req.id.issuer.nif.as_deref(), Some("B12345678"));
    assert_eq!(req.id.serial_number, "2017/0456");
    assert_eq!(req.id.issue_date, "30/11/2017");

    let body = &req.body;
    assert_eq!(body.description, "Suministro de material sanitario");
    // 200 + 42 + 10.40 + 50
    assert_eq!(body.total_amount, dec!(302.40));
    let counterpart = body.counterpart.as_ref().unwrap();
    assert_eq!(counterpart.name, "Farmacia Lopez");
    assert_eq!(counterpart.id.nif.as_deref(), Some("12345678Z"));

    let exempt = body.breakdown.exempt.as_ref().unwrap();
    assert_eq!(exempt.cause, ExemptionCause::Article20);
    assert_eq!(exempt.base, dec!(50));

    let not_exempt = body.breakdown.not_exempt.as_ref().unwrap();
    assert_eq!(not_exempt.kind, SubjectedKey::NoReverseCharge);
    assert_eq!(not_exempt.details.len(), 1);
    let detail = &not_exempt.details[0];
    assert_eq!(detail.rate, Some(dec!(21)));
    assert_eq!(detail.base, dec!(200));
    assert_eq!(detail.amount, Some(dec!(42)));
    assert_eq!(detail.surcharge_rate, Some(dec!(5.2)));
    assert_eq!(detail.surcharge_amount, Some(dec!(10.40)));
}

#[test]
fn exempt_invoice_without_tax_lines_totals_its_base() {
    let invoice = InvoiceBuilder::new(
        InvoiceId(9),
        InvoiceKind::OutInvoice,
        date(2017, 11, 15),
        period(),
        company(),
    )
    .number("2017/0460")
    .party(PartyBuilder::new("Colegio San José").vat_code("ESR2800000A").build())
    .description("Clases de formación")
    .operation_key(OperationKey::Invoice)
    .issued_key(IssuedRegimeKey::General)
    .exemption_cause(ExemptionCause::Article20)
    .untaxed_amount(dec!(250))
    .build()
    .unwrap();

    let body = IssuedMapper.build_issued_invoice(&invoice).unwrap();
    assert!(body.breakdown.not_exempt.is_none());
    let exempt = body.breakdown.exempt.as_ref().unwrap();
    assert_eq!(exempt.cause, ExemptionCause::Article20);
    assert_eq!(exempt.base, dec!(250));
    assert_eq!(body.total_amount, exempt.base);
}

#[test]
fn simplified_invoice_has_no_counterpart() {
    let invoice = InvoiceBuilder::new(
        InvoiceId(8),
        InvoiceKind::OutInvoice,
        date(2017, 11, 2),
        period(),
        company(),
    )
    .number("T-0001")
    .party(PartyBuilder::new("Contado").build())
    .operation_key(OperationKey::SimplifiedInvoice)
    .issued_key(IssuedRegimeKey::General)
    .subjected_key(SubjectedKey::NoReverseCharge)
    .add_tax(
        TaxBuilder::new(1, "IVA 10%", dec!(0.10))
            .subjected(SubjectedKey::NoReverseCharge)
            .build(),
        dec!(10),
        dec!(1),
    )
    .build()
    .unwrap();

    let record = build_submit_record(&invoice).unwrap();
    assert_eq!(record.direction(), Direction::Issued);
    let SubmitRecord::Issued(req) = record else {
        panic!("expected an issued record");
    };
    assert_eq!(req.body.counterpart, None);
    assert_eq!(req.body.description, "T-0001");
    assert_eq!(req.body.total_amount, dec!(11));
}

// --- Received ---

fn supplier_invoice() -> InvoiceBuilder {
    InvoiceBuilder::new(
        InvoiceId(20),
        InvoiceKind::InInvoice,
        date(2017, 10, 28),
        period(),
        company(),
    )
    .reference("FR-2017-118")
    .accounting_date(date(2017, 11, 3))
    .party(
        PartyBuilder::new("Fournitures Générales SARL")
            .vat_code("FR40303265045")
            .identifier_type(PartyIdentifierType::NifVat)
            .country("FR")
            .build(),
    )
    .operation_key(OperationKey::Invoice)
    .received_key(ReceivedRegimeKey::IntracommunityAcquisition)
}

#[test]
fn received_from_foreign_supplier() {
    let invoice = supplier_invoice()
        .add_tax(
            TaxBuilder::new(30, "IVA 21% soportado", dec!(0.21))
                .subjected(SubjectedKey::NoReverseCharge)
                .deductible()
                .build(),
            dec!(1000),
            dec!(210),
        )
        .build()
        .unwrap();

    let req = ReceivedMapper.build_request(&invoice).unwrap();
    assert_eq!(req.id.serial_number, "FR-2017-118");
    assert_eq!(req.id.issue_date, "28/10/2017");
    assert_eq!(req.id.issuer.nif, None);
    let other = req.id.issuer.other.as_ref().unwrap();
    assert_eq!(other.country, "FR");
    assert_eq!(other.id_type, PartyIdentifierType::NifVat);
    assert_eq!(other.id, "FR40303265045");

    let body = &req.body;
    assert_eq!(body.special_key, ReceivedRegimeKey::IntracommunityAcquisition);
    assert_eq!(body.accounting_date, "03/11/2017");
    assert_eq!(body.deductible_amount, dec!(210));
    assert_eq!(body.total_amount, dec!(1210));
    assert_eq!(
        body.counterpart.as_ref().map(|c| c.name.as_str()),
        Some("Fournitures Generales SARL")
    );

    let header = ReceivedMapper.build_cancel_request(&invoice).unwrap();
    assert_eq!(header, req.header());
    assert_eq!(record_header(&invoice).unwrap(), header);
}

#[test]
fn non_deductible_tax_is_reported_but_not_deducted() {
    let invoice = supplier_invoice()
        .add_tax(
            TaxBuilder::new(31, "IVA 21% no deducible", dec!(0.21))
                .subjected(SubjectedKey::NoReverseCharge)
                .build(),
            dec!(100),
            dec!(21),
        )
        .build()
        .unwrap();
    let body = ReceivedMapper.build_received_invoice(&invoice).unwrap();
    assert_eq!(body.details.len(), 1);
    assert_eq!(body.deductible_amount, dec!(0));
}

#[test]
fn mapping_errors_name_the_invoice() {
    let invoice = supplier_invoice().build().unwrap();
    let err = ReceivedMapper.build_request(&invoice).unwrap_err();
    match err {
        SiiError::Mapping { invoice, message } => {
            assert!(invoice.contains("FR-2017-118"), "{invoice}");
            assert!(message.contains("no qualifying tax"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}
