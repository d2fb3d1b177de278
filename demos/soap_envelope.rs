use aeat_sii::core::*;
use aeat_sii::gateway::envelope::{query_envelope, submit_envelope};
use aeat_sii::gateway::parse::parse_submit_response;
use aeat_sii::mapping::{Headers, build_period, build_submit_record, IssuedMapper};
use chrono::NaiveDate;
use rust_decimal_macros::dec;

fn main() {
    let company = Company::new(
        "Librería Cervantes SL",
        PartyBuilder::new("Librería Cervantes SL")
            .vat_code("ESB87654321")
            .build(),
    );
    let period = FiscalPeriod::new(1, "2017", 9, NaiveDate::from_ymd_opt(2017, 9, 1).unwrap());
    let vat4 = TaxBuilder::new(1, "IVA 4%", dec!(0.04))
        .subjected(SubjectedKey::NoReverseCharge)
        .build();

    let invoice = InvoiceBuilder::new(
        InvoiceId(1),
        InvoiceKind::OutInvoice,
        NaiveDate::from_ymd_opt(2017, 9, 4).unwrap(),
        period,
        company,
    )
    .number("L-2017-0311")
    .party(PartyBuilder::new("Biblioteca Municipal").vat_code("ESP2800000A").build())
    .description("Suministro de libros")
    .operation_key(OperationKey::Invoice)
    .issued_key(IssuedRegimeKey::General)
    .subjected_key(SubjectedKey::NoReverseCharge)
    .add_tax(vat4, dec!(480.77), dec!(19.23))
    .build()
    .expect("invoice should be valid");

    let headers = Headers::new(
        "Librería Cervantes SL",
        "B87654321",
        CommunicationType::New,
        SiiVersion::V1_0,
    );
    let record = build_submit_record(&invoice).expect("invoice should map");
    let xml = submit_envelope(&headers, Direction::Issued, &[record])
        .expect("envelope should serialize");
    println!("=== SuministroLRFacturasEmitidas ===\n{xml}\n");

    let query_headers = Headers::new(
        "Librería Cervantes SL",
        "B87654321",
        CommunicationType::Query,
        SiiVersion::V1_0,
    );
    let xml = query_envelope(
        &query_headers,
        Direction::Issued,
        &build_period(&IssuedMapper, &invoice),
    )
    .expect("envelope should serialize");
    println!("=== ConsultaLRFacturasEmitidas ===\n{xml}\n");

    // What an answer looks like once parsed
    let answer = r#"<env:Envelope xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">
  <env:Body>
    <siiR:RespuestaLRFacturasEmitidas xmlns:siiR="r" xmlns:sii="s">
      <siiR:CSV>B7XQ3MZ8W2TK9PLD</siiR:CSV>
      <siiR:EstadoEnvio>Correcto</siiR:EstadoEnvio>
      <siiR:RespuestaLinea>
        <siiR:IDFactura>
          <sii:IDEmisorFactura><sii:NIF>B87654321</sii:NIF></sii:IDEmisorFactura>
          <sii:NumSerieFacturaEmisor>L-2017-0311</sii:NumSerieFacturaEmisor>
          <sii:FechaExpedicionFacturaEmisor>04-09-2017</sii:FechaExpedicionFacturaEmisor>
        </siiR:IDFactura>
        <siiR:EstadoRegistro>Correcto</siiR:EstadoRegistro>
      </siiR:RespuestaLinea>
    </siiR:RespuestaLRFacturasEmitidas>
  </env:Body>
</env:Envelope>"#;
    match parse_submit_response(answer) {
        Ok(response) => {
            println!("EstadoEnvio: {}", response.state.code());
            println!("CSV:         {:?}", response.csv);
            for line in &response.lines {
                println!("  {:?} -> {}", line.key, line.state.code());
            }
        }
        Err(e) => eprintln!("unreadable answer: {e}"),
    }
}
