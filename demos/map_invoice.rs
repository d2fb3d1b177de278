use aeat_sii::core::*;
use aeat_sii::mapping::{IssuedMapper, ReceivedMapper, build_submit_record};
use chrono::NaiveDate;
use rust_decimal_macros::dec;

fn main() {
    let company = Company::new(
        "Distribuciones Ibéricas SL",
        PartyBuilder::new("Distribuciones Ibéricas SL")
            .vat_code("ESB12345678")
            .build(),
    );
    let period = FiscalPeriod::new(1, "2017", 7, NaiveDate::from_ymd_opt(2017, 7, 1).unwrap());

    // A sale with equivalence surcharge: the surcharge folds into the VAT detail
    let vat21 = TaxBuilder::new(1, "IVA 21%", dec!(0.21))
        .parent(100)
        .subjected(SubjectedKey::NoReverseCharge)
        .build();
    let re52 = TaxBuilder::new(2, "Recargo de equivalencia 5,2%", dec!(0.052))
        .parent(100)
        .subjected(SubjectedKey::NoReverseCharge)
        .equivalence_surcharge()
        .build();

    let sale = InvoiceBuilder::new(
        InvoiceId(1),
        InvoiceKind::OutInvoice,
        NaiveDate::from_ymd_opt(2017, 7, 12).unwrap(),
        period.clone(),
        company.clone(),
    )
    .number("FV-2017-0042")
    .party(
        PartyBuilder::new("Ferretería Martínez")
            .vat_code("ES12345678Z")
            .build(),
    )
    .description("Venta de herramientas")
    .operation_key(OperationKey::Invoice)
    .issued_key(IssuedRegimeKey::General)
    .subjected_key(SubjectedKey::NoReverseCharge)
    .add_tax(vat21, dec!(1250.00), dec!(262.50))
    .add_tax(re52, dec!(1250.00), dec!(65.00))
    .build()
    .expect("sale should be valid");

    let request = IssuedMapper
        .build_request(&sale)
        .expect("sale should map");
    println!("=== Issued invoice {} ===", request.id.serial_number);
    println!("Period:      {}/{}", request.period.year, request.period.period);
    println!("Issue date:  {}", request.id.issue_date);
    println!("Total:       {} EUR", request.body.total_amount);
    if let Some(not_exempt) = &request.body.breakdown.not_exempt {
        for detail in &not_exempt.details {
            println!(
                "  {:>6}% on {:>9} = {:>8}  (surcharge {:?}% = {:?})",
                detail.rate.unwrap_or_default(),
                detail.base,
                detail.amount.unwrap_or_default(),
                detail.surcharge_rate,
                detail.surcharge_amount,
            );
        }
    }

    // A supplier credit note: negative amounts stay negative
    let input_vat = TaxBuilder::new(3, "IVA 21% soportado", dec!(0.21))
        .subjected(SubjectedKey::NoReverseCharge)
        .deductible()
        .build();
    let credit_note = InvoiceBuilder::new(
        InvoiceId(2),
        InvoiceKind::InCreditNote,
        NaiveDate::from_ymd_opt(2017, 7, 20).unwrap(),
        period,
        company,
    )
    .reference("ABONO-17/008")
    .party(PartyBuilder::new("Suministros Norte SA").vat_code("ESA48000000").build())
    .operation_key(OperationKey::CorrectedLaw)
    .received_key(ReceivedRegimeKey::General)
    .add_tax(input_vat, dec!(-80.00), dec!(-16.80))
    .build()
    .expect("credit note should be valid");

    let body = ReceivedMapper
        .build_received_invoice(&credit_note)
        .expect("credit note should map");
    println!("\n=== Received credit note ===");
    println!("Kind:        {} ({:?})", body.invoice_kind, body.rectification);
    println!("Total:       {} EUR", body.total_amount);
    println!("Deductible:  {} EUR", body.deductible_amount);

    // The full request tree, as JSON
    let record = build_submit_record(&credit_note).expect("credit note should map");
    let json = serde_json::to_string_pretty(&record).expect("record should serialize");
    println!("\n{json}");
}
