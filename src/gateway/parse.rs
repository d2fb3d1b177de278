//! Parsing of AEAT SOAP answers.
//!
//! Elements are matched by local name; AEAT changes namespace prefixes
//! between services and versions.

use std::str::FromStr;

use chrono::NaiveDateTime;
use quick_xml::Reader;
use quick_xml::events::Event;
use rust_decimal::Decimal;

use crate::core::{CommunicationState, InvoiceSiiState, OperationKey, PartyIdentifierType, SiiError};
use crate::mapping::{Counterpart, CorrelationKey, InvoiceIdBlock, OtherId, PartyId, TaxDetail};

use super::response::{Presentation, QueryRecord, QueryResponse, ResponseLine, SubmitResponse};

/// `TimestampPresentacion` format.
const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

fn xml_err(e: impl std::fmt::Display) -> SiiError {
    SiiError::Xml(format!("XML parse error: {e}"))
}

fn decimal(field: &str, text: &str) -> Result<Decimal, SiiError> {
    Decimal::from_str(text.trim())
        .map_err(|e| SiiError::Xml(format!("{field}: invalid amount '{text}': {e}")))
}

fn integer(field: &str, text: &str) -> Result<i64, SiiError> {
    text.trim()
        .parse()
        .map_err(|e| SiiError::Xml(format!("{field}: invalid number '{text}': {e}")))
}

fn record_state(text: &str) -> Result<InvoiceSiiState, SiiError> {
    InvoiceSiiState::from_code(text.trim())
        .ok_or_else(|| SiiError::Xml(format!("unknown EstadoRegistro '{text}'")))
}

/// What [`walk`] reports, with local-name paths.
enum Node<'a> {
    Text { path: &'a [String], text: &'a str },
    End { name: &'a str },
}

/// Walk the document outside of SOAP faults. A fault is turned into
/// [`SiiError::Gateway`].
fn walk<F>(xml: &str, mut visit: F) -> Result<(), SiiError>
where
    F: FnMut(Node<'_>) -> Result<(), SiiError>,
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut fault: Option<String> = None;
    let mut in_fault = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "Fault" {
                    in_fault = true;
                }
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(xml_err)?;
                if text.is_empty() {
                    continue;
                }
                if in_fault {
                    if path.last().is_some_and(|n| n == "faultstring") {
                        fault = Some(text.into_owned());
                    }
                    continue;
                }
                visit(Node::Text {
                    path: &path,
                    text: &text,
                })?;
            }
            Ok(Event::End(_)) => {
                let ended = path.pop().unwrap_or_default();
                if ended == "Fault" {
                    in_fault = false;
                } else if !in_fault {
                    visit(Node::End { name: &ended })?;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
    }

    match fault {
        Some(message) => Err(SiiError::Gateway(format!("SOAP fault: {message}"))),
        None => Ok(()),
    }
}

fn within(path: &[String], name: &str) -> bool {
    path.iter().any(|p| p == name)
}

/// `IDFactura` (or a counterpart) under construction.
#[derive(Default)]
struct IdDraft {
    nif: Option<String>,
    country: Option<String>,
    id_type: Option<String>,
    id: Option<String>,
    serial_number: Option<String>,
    final_serial_number: Option<String>,
    issue_date: Option<String>,
}

impl IdDraft {
    /// Returns true if `name` was an identity element.
    fn handle(&mut self, name: &str, text: &str) -> bool {
        let slot = match name {
            "NIF" => &mut self.nif,
            "CodigoPais" => &mut self.country,
            "IDType" => &mut self.id_type,
            "ID" => &mut self.id,
            "NumSerieFacturaEmisor" => &mut self.serial_number,
            "NumSerieFacturaEmisorResumenFin" => &mut self.final_serial_number,
            "FechaExpedicionFacturaEmisor" => &mut self.issue_date,
            _ => return false,
        };
        *slot = Some(text.to_string());
        true
    }

    fn party(&self) -> PartyId {
        let other = match (&self.id, self.id_type.as_deref().and_then(PartyIdentifierType::from_code)) {
            (Some(id), Some(id_type)) => Some(OtherId {
                country: self.country.clone().unwrap_or_default(),
                id_type,
                id: id.clone(),
            }),
            _ => None,
        };
        PartyId {
            nif: self.nif.clone(),
            other,
        }
    }

    fn key(&self) -> Option<CorrelationKey> {
        match (&self.serial_number, &self.issue_date) {
            (Some(serial), Some(date)) => Some(CorrelationKey::new(
                self.party().code().unwrap_or_default(),
                serial,
                date,
            )),
            _ => None,
        }
    }

    fn block(&self) -> Result<InvoiceIdBlock, SiiError> {
        let serial_number = self
            .serial_number
            .clone()
            .ok_or_else(|| SiiError::Xml("IDFactura without NumSerieFacturaEmisor".into()))?;
        let issue_date = self
            .issue_date
            .clone()
            .ok_or_else(|| SiiError::Xml("IDFactura without FechaExpedicionFacturaEmisor".into()))?;
        Ok(InvoiceIdBlock {
            issuer: self.party(),
            serial_number,
            final_serial_number: self.final_serial_number.clone(),
            issue_date: issue_date.replace('-', "/"),
        })
    }
}

#[derive(Default)]
struct LineDraft {
    id: IdDraft,
    state: Option<InvoiceSiiState>,
    error_code: Option<i64>,
    error_message: Option<String>,
}

/// Parse the answer to a register or delete request.
pub fn parse_submit_response(xml: &str) -> Result<SubmitResponse, SiiError> {
    let mut state: Option<CommunicationState> = None;
    let mut csv: Option<String> = None;
    let mut lines: Vec<ResponseLine> = Vec::new();
    let mut current = LineDraft::default();

    walk(xml, |node| match node {
        Node::Text { path, text } => {
            let Some(name) = path.last().map(String::as_str) else {
                return Ok(());
            };
            if within(path, "RespuestaLinea") {
                if within(path, "IDFactura") {
                    current.id.handle(name, text);
                    return Ok(());
                }
                match name {
                    "EstadoRegistro" => current.state = Some(record_state(text)?),
                    "CodigoErrorRegistro" => {
                        current.error_code = Some(integer("CodigoErrorRegistro", text)?)
                    }
                    "DescripcionErrorRegistro" => current.error_message = Some(text.to_string()),
                    _ => {}
                }
                return Ok(());
            }
            if within(path, "DatosPresentacion") || within(path, "Cabecera") {
                return Ok(());
            }
            match name {
                "EstadoEnvio" => {
                    state = Some(CommunicationState::from_code(text.trim()).ok_or_else(|| {
                        SiiError::Xml(format!("unknown EstadoEnvio '{text}'"))
                    })?)
                }
                "CSV" => csv = Some(text.to_string()),
                _ => {}
            }
            Ok(())
        }
        Node::End { name } => {
            if name == "RespuestaLinea" {
                let draft = std::mem::take(&mut current);
                let state = draft
                    .state
                    .ok_or_else(|| SiiError::Xml("RespuestaLinea without EstadoRegistro".into()))?;
                lines.push(ResponseLine {
                    key: draft.id.key(),
                    state,
                    error_code: draft.error_code,
                    error_message: draft.error_message,
                });
            }
            Ok(())
        }
    })?;

    let state = state.ok_or_else(|| SiiError::Xml("answer without EstadoEnvio".into()))?;
    Ok(SubmitResponse { state, csv, lines })
}

#[derive(Default)]
struct TaxDraft {
    rate: Option<Decimal>,
    base: Option<Decimal>,
    amount: Option<Decimal>,
    surcharge_rate: Option<Decimal>,
    surcharge_amount: Option<Decimal>,
    reagyp_rate: Option<Decimal>,
    reagyp_amount: Option<Decimal>,
}

impl TaxDraft {
    fn handle(&mut self, name: &str, text: &str) -> Result<(), SiiError> {
        let slot = match name {
            "TipoImpositivo" => &mut self.rate,
            "BaseImponible" => &mut self.base,
            "CuotaRepercutida" | "CuotaSoportada" => &mut self.amount,
            "TipoRecargoEquivalencia" => &mut self.surcharge_rate,
            "CuotaRecargoEquivalencia" => &mut self.surcharge_amount,
            "PorcentCompensacionREAGYP" => &mut self.reagyp_rate,
            "ImporteCompensacionREAGYP" => &mut self.reagyp_amount,
            _ => return Ok(()),
        };
        *slot = Some(decimal(name, text)?);
        Ok(())
    }

    fn finish(self) -> TaxDetail {
        TaxDetail {
            rate: self.rate.map(|r| r.normalize()),
            base: self.base.unwrap_or_default(),
            amount: self.amount,
            surcharge_rate: self.surcharge_rate,
            surcharge_amount: self.surcharge_amount,
            reagyp_rate: self.reagyp_rate,
            reagyp_amount: self.reagyp_amount,
        }
    }
}

#[derive(Default)]
struct RecordDraft {
    id: IdDraft,
    state: Option<InvoiceSiiState>,
    error_code: Option<i64>,
    error_message: Option<String>,
    invoice_kind: Option<OperationKey>,
    special_key: Option<String>,
    total_amount: Option<Decimal>,
    taxes: Vec<TaxDetail>,
    tax: TaxDraft,
    counterpart_name: Option<String>,
    counterpart_id: IdDraft,
    presenter: Option<String>,
    timestamp: Option<NaiveDateTime>,
    presentation_csv: Option<String>,
    balance_state: Option<String>,
}

impl RecordDraft {
    fn handle(&mut self, path: &[String], name: &str, text: &str) -> Result<(), SiiError> {
        if within(path, "IDFactura") {
            self.id.handle(name, text);
        } else if within(path, "Contraparte") {
            if name == "NombreRazon" {
                self.counterpart_name = Some(text.to_string());
            } else {
                self.counterpart_id.handle(name, text);
            }
        } else if within(path, "DetalleIVA") {
            self.tax.handle(name, text)?;
        } else if within(path, "DatosPresentacion") {
            match name {
                "NIFPresentador" => self.presenter = Some(text.to_string()),
                "TimestampPresentacion" => {
                    self.timestamp = Some(
                        NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT).map_err(
                            |e| SiiError::Xml(format!("invalid TimestampPresentacion '{text}': {e}")),
                        )?,
                    )
                }
                "CSV" => self.presentation_csv = Some(text.to_string()),
                _ => {}
            }
        } else if within(path, "EstadoFactura") {
            match name {
                "EstadoRegistro" => self.state = Some(record_state(text)?),
                "CodigoErrorRegistro" => {
                    self.error_code = Some(integer("CodigoErrorRegistro", text)?)
                }
                "DescripcionErrorRegistro" => self.error_message = Some(text.to_string()),
                "EstadoCuadre" => self.balance_state = Some(text.to_string()),
                _ => {}
            }
        } else {
            match name {
                "TipoFactura" => self.invoice_kind = OperationKey::from_code(text.trim()),
                "ClaveRegimenEspecialOTrascendencia" => {
                    self.special_key = Some(text.trim().to_string())
                }
                "ImporteTotal" => self.total_amount = Some(decimal(name, text)?),
                _ => {}
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<QueryRecord, SiiError> {
        let id = self.id.block()?;
        let state = self
            .state
            .ok_or_else(|| SiiError::Xml(format!("record {} without EstadoRegistro", id.serial_number)))?;
        let counterpart = self.counterpart_name.map(|name| Counterpart {
            name,
            id: self.counterpart_id.party(),
        });
        let presentation = self.presenter.map(|presenter| Presentation {
            presenter,
            timestamp: self.timestamp,
            csv: self.presentation_csv,
        });
        Ok(QueryRecord {
            id,
            state,
            error_code: self.error_code,
            error_message: self.error_message,
            invoice_kind: self.invoice_kind,
            special_key: self.special_key,
            total_amount: self.total_amount,
            taxes: self.taxes,
            counterpart,
            presentation,
            balance_state: self.balance_state,
        })
    }
}

fn is_query_record(name: &str) -> bool {
    name.starts_with("RegistroRespuestaConsultaLRFacturas")
}

/// Parse the answer to a query. Records come back in AEAT's order.
pub fn parse_query_response(xml: &str) -> Result<QueryResponse, SiiError> {
    let mut records: Vec<QueryRecord> = Vec::new();
    let mut current: Option<RecordDraft> = None;
    let mut seen_answer = false;

    walk(xml, |node| match node {
        Node::Text { path, text } => {
            let Some(name) = path.last().map(String::as_str) else {
                return Ok(());
            };
            if name == "ResultadoConsulta" {
                seen_answer = true;
            }
            if !path.iter().any(|p| is_query_record(p)) {
                return Ok(());
            }
            current
                .get_or_insert_with(RecordDraft::default)
                .handle(path, name, text)
        }
        Node::End { name } => {
            if name.starts_with("RespuestaConsultaLRFacturas") {
                seen_answer = true;
            }
            if name == "DetalleIVA" {
                if let Some(draft) = current.as_mut() {
                    let tax = std::mem::take(&mut draft.tax);
                    draft.taxes.push(tax.finish());
                }
            }
            if is_query_record(name) {
                if let Some(draft) = current.take() {
                    records.push(draft.finish()?);
                }
            }
            Ok(())
        }
    })?;

    if !seen_answer {
        return Err(SiiError::Xml("not a query answer".into()));
    }
    Ok(QueryResponse { records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SUBMIT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<env:Envelope xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">
  <env:Body>
    <siiR:RespuestaLRFacturasEmitidas xmlns:siiR="r" xmlns:sii="s">
      <siiR:CSV>ABCD1234EFGH5678</siiR:CSV>
      <siiR:DatosPresentacion>
        <sii:NIFPresentador>B12345678</sii:NIFPresentador>
        <sii:TimestampPresentacion>12-07-2017 10:11:12</sii:TimestampPresentacion>
      </siiR:DatosPresentacion>
      <siiR:Cabecera>
        <sii:IDVersionSii>1.0</sii:IDVersionSii>
      </siiR:Cabecera>
      <siiR:EstadoEnvio>ParcialmenteCorrecto</siiR:EstadoEnvio>
      <siiR:RespuestaLinea>
        <siiR:IDFactura>
          <sii:IDEmisorFactura><sii:NIF>B12345678</sii:NIF></sii:IDEmisorFactura>
          <sii:NumSerieFacturaEmisor>FV-2</sii:NumSerieFacturaEmisor>
          <sii:FechaExpedicionFacturaEmisor>13-07-2017</sii:FechaExpedicionFacturaEmisor>
        </siiR:IDFactura>
        <siiR:EstadoRegistro>Incorrecto</siiR:EstadoRegistro>
        <siiR:CodigoErrorRegistro>1104</siiR:CodigoErrorRegistro>
        <siiR:DescripcionErrorRegistro>Valor del campo NIF incorrecto</siiR:DescripcionErrorRegistro>
      </siiR:RespuestaLinea>
      <siiR:RespuestaLinea>
        <siiR:IDFactura>
          <sii:IDEmisorFactura><sii:NIF>B12345678</sii:NIF></sii:IDEmisorFactura>
          <sii:NumSerieFacturaEmisor>FV-1</sii:NumSerieFacturaEmisor>
          <sii:FechaExpedicionFacturaEmisor>12-07-2017</sii:FechaExpedicionFacturaEmisor>
        </siiR:IDFactura>
        <siiR:EstadoRegistro>Correcto</siiR:EstadoRegistro>
      </siiR:RespuestaLinea>
    </siiR:RespuestaLRFacturasEmitidas>
  </env:Body>
</env:Envelope>"#;

    #[test]
    fn submit_answer() {
        let resp = parse_submit_response(SUBMIT).unwrap();
        assert_eq!(resp.state, CommunicationState::PartiallyAccepted);
        assert_eq!(resp.csv.as_deref(), Some("ABCD1234EFGH5678"));
        assert_eq!(resp.lines.len(), 2);

        let rejected = &resp.lines[0];
        assert_eq!(rejected.key, Some(CorrelationKey::new("B12345678", "FV-2", "13/07/2017")));
        assert_eq!(rejected.state, InvoiceSiiState::Rejected);
        assert_eq!(rejected.error_code, Some(1104));
        assert_eq!(
            rejected.error_message.as_deref(),
            Some("Valor del campo NIF incorrecto")
        );

        assert_eq!(resp.lines[1].state, InvoiceSiiState::Accepted);
        assert_eq!(resp.lines[1].error_code, None);
    }

    #[test]
    fn soap_fault_is_gateway_error() {
        let xml = r#"<env:Envelope xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">
  <env:Body>
    <env:Fault>
      <faultcode>env:Client</faultcode>
      <faultstring>Codigo[4102].El XML no cumple el esquema.</faultstring>
    </env:Fault>
  </env:Body>
</env:Envelope>"#;
        let err = parse_submit_response(xml).unwrap_err();
        assert!(matches!(err, SiiError::Gateway(ref m) if m.contains("4102")));
    }

    #[test]
    fn missing_state_is_xml_error() {
        let err = parse_submit_response("<a><b>1</b></a>").unwrap_err();
        assert!(matches!(err, SiiError::Xml(_)));
    }

    #[test]
    fn malformed_xml_is_xml_error() {
        assert!(matches!(
            parse_submit_response("<a><b></a>"),
            Err(SiiError::Xml(_))
        ));
    }

    #[test]
    fn query_answer() {
        let xml = r#"<env:Envelope xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">
  <env:Body>
    <siiRC:RespuestaConsultaLRFacturasRecibidas xmlns:siiRC="rc" xmlns:sii="s">
      <siiRC:IndicadorPaginacion>N</siiRC:IndicadorPaginacion>
      <siiRC:ResultadoConsulta>ConDatos</siiRC:ResultadoConsulta>
      <siiRC:RegistroRespuestaConsultaLRFacturasRecibidas>
        <siiRC:IDFactura>
          <sii:IDEmisorFactura>
            <sii:IDOtro>
              <sii:CodigoPais>FR</sii:CodigoPais>
              <sii:IDType>02</sii:IDType>
              <sii:ID>FR12345678901</sii:ID>
            </sii:IDOtro>
          </sii:IDEmisorFactura>
          <sii:NumSerieFacturaEmisor>PROV-7</sii:NumSerieFacturaEmisor>
          <sii:FechaExpedicionFacturaEmisor>01-07-2017</sii:FechaExpedicionFacturaEmisor>
        </siiRC:IDFactura>
        <siiRC:DatosFacturaRecibida>
          <sii:TipoFactura>F1</sii:TipoFactura>
          <sii:ClaveRegimenEspecialOTrascendencia>09</sii:ClaveRegimenEspecialOTrascendencia>
          <sii:ImporteTotal>121.00</sii:ImporteTotal>
          <sii:DesgloseFactura>
            <sii:DesgloseIVA>
              <sii:DetalleIVA>
                <sii:TipoImpositivo>21.00</sii:TipoImpositivo>
                <sii:BaseImponible>100.00</sii:BaseImponible>
                <sii:CuotaSoportada>21.00</sii:CuotaSoportada>
              </sii:DetalleIVA>
            </sii:DesgloseIVA>
          </sii:DesgloseFactura>
          <sii:Contraparte>
            <sii:NombreRazon>Fournisseur SARL</sii:NombreRazon>
            <sii:IDOtro>
              <sii:CodigoPais>FR</sii:CodigoPais>
              <sii:IDType>02</sii:IDType>
              <sii:ID>FR12345678901</sii:ID>
            </sii:IDOtro>
          </sii:Contraparte>
        </siiRC:DatosFacturaRecibida>
        <siiRC:DatosPresentacion>
          <sii:NIFPresentador>B12345678</sii:NIFPresentador>
          <sii:TimestampPresentacion>02-07-2017 09:30:00</sii:TimestampPresentacion>
          <sii:CSV>CSV0001</sii:CSV>
        </siiRC:DatosPresentacion>
        <siiRC:EstadoFactura>
          <sii:EstadoCuadre>2</sii:EstadoCuadre>
          <sii:EstadoRegistro>AceptadaConErrores</sii:EstadoRegistro>
          <sii:CodigoErrorRegistro>2011</sii:CodigoErrorRegistro>
        </siiRC:EstadoFactura>
      </siiRC:RegistroRespuestaConsultaLRFacturasRecibidas>
    </siiRC:RespuestaConsultaLRFacturasRecibidas>
  </env:Body>
</env:Envelope>"#;
        let resp = parse_query_response(xml).unwrap();
        assert_eq!(resp.records.len(), 1);
        let r = &resp.records[0];
        assert_eq!(r.id.serial_number, "PROV-7");
        assert_eq!(r.id.issue_date, "01/07/2017");
        assert_eq!(r.id.issuer.code(), Some("FR12345678901"));
        assert_eq!(r.state, InvoiceSiiState::AcceptedWithErrors);
        assert_eq!(r.error_code, Some(2011));
        assert_eq!(r.invoice_kind, Some(OperationKey::Invoice));
        assert_eq!(r.special_key.as_deref(), Some("09"));
        assert_eq!(r.total_amount, Some(dec!(121)));
        assert_eq!(r.taxes.len(), 1);
        assert_eq!(r.taxes[0].rate, Some(dec!(21)));
        assert_eq!(r.taxes[0].amount, Some(dec!(21)));
        let counterpart = r.counterpart.as_ref().unwrap();
        assert_eq!(counterpart.name, "Fournisseur SARL");
        assert_eq!(counterpart.id.other.as_ref().unwrap().country, "FR");
        let presentation = r.presentation.as_ref().unwrap();
        assert_eq!(presentation.csv.as_deref(), Some("CSV0001"));
        assert_eq!(
            presentation.timestamp.unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2017-07-02 09:30"
        );
        assert_eq!(r.balance_state.as_deref(), Some("2"));
    }

    #[test]
    fn empty_query_answer() {
        let xml = r#"<RespuestaConsultaLRFacturasEmitidas><ResultadoConsulta>SinDatos</ResultadoConsulta></RespuestaConsultaLRFacturasEmitidas>"#;
        assert!(parse_query_response(xml).unwrap().records.is_empty());
    }
}
