//! SOAP envelopes for the AEAT SII services.
//!
//! Elements of the request body live in the `siiLR` namespace, the shared
//! data types in `sii`.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::{Decimal, RoundingStrategy};
use std::io::Cursor;

use crate::core::{Direction, SiiError};
use crate::mapping::{
    Breakdown, Counterpart, Headers, InvoiceIdBlock, IssuedInvoice, PartyId, PeriodBlock,
    ReceivedInvoice, RecordHeader, SubmitRecord, TaxDetail,
};

pub const SOAPENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SII_LR_NS: &str = "https://www2.agenciatributaria.gob.es/static_files/common/internet/dep/aplicaciones/es/aeat/ssii/fact/ws/SuministroLR.xsd";
pub const SII_NS: &str = "https://www2.agenciatributaria.gob.es/static_files/common/internet/dep/aplicaciones/es/aeat/ssii/fact/ws/SuministroInformacion.xsd";

/// The three SII operations, per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Submit,
    Cancel,
    Query,
}

impl Operation {
    /// Root element of the request body.
    pub fn root_element(&self, direction: Direction) -> &'static str {
        match (self, direction) {
            (Self::Submit, Direction::Issued) => "siiLR:SuministroLRFacturasEmitidas",
            (Self::Submit, Direction::Received) => "siiLR:SuministroLRFacturasRecibidas",
            (Self::Cancel, Direction::Issued) => "siiLR:BajaLRFacturasEmitidas",
            (Self::Cancel, Direction::Received) => "siiLR:BajaLRFacturasRecibidas",
            (Self::Query, Direction::Issued) => "siiLR:ConsultaLRFacturasEmitidas",
            (Self::Query, Direction::Received) => "siiLR:ConsultaLRFacturasRecibidas",
        }
    }

    /// WSDL operation name.
    pub fn name(&self, direction: Direction) -> &'static str {
        match (self, direction) {
            (Self::Submit, Direction::Issued) => "SuministroLRFacturasEmitidas",
            (Self::Submit, Direction::Received) => "SuministroLRFacturasRecibidas",
            (Self::Cancel, Direction::Issued) => "AnulacionLRFacturasEmitidas",
            (Self::Cancel, Direction::Received) => "AnulacionLRFacturasRecibidas",
            (Self::Query, Direction::Issued) => "ConsultaLRFacturasEmitidas",
            (Self::Query, Direction::Received) => "ConsultaLRFacturasRecibidas",
        }
    }

    fn record_element(&self, direction: Direction) -> &'static str {
        match (self, direction) {
            (Self::Cancel, Direction::Issued) => "siiLR:RegistroLRBajaExpedidas",
            (Self::Cancel, Direction::Received) => "siiLR:RegistroLRBajaRecibidas",
            (_, Direction::Issued) => "siiLR:RegistroLRFacturasEmitidas",
            (_, Direction::Received) => "siiLR:RegistroLRFacturasRecibidas",
        }
    }
}

fn xml_io(e: std::io::Error) -> SiiError {
    SiiError::Xml(format!("XML write error: {e}"))
}

struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    fn new() -> Result<Self, SiiError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    fn into_string(self) -> Result<String, SiiError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| SiiError::Xml(format!("XML UTF-8 error: {e}")))
    }

    fn start(&mut self, name: &str) -> Result<&mut Self, SiiError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    fn start_with_attrs(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<&mut Self, SiiError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer.write_event(Event::Start(elem)).map_err(xml_io)?;
        Ok(self)
    }

    fn end(&mut self, name: &str) -> Result<&mut Self, SiiError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    fn empty(&mut self, name: &str) -> Result<&mut Self, SiiError> {
        self.writer
            .write_event(Event::Empty(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    fn text(&mut self, name: &str, text: &str) -> Result<&mut Self, SiiError> {
        self.start(name)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end(name)
    }

    fn opt_text(&mut self, name: &str, text: Option<&str>) -> Result<&mut Self, SiiError> {
        match text {
            Some(t) => self.text(name, t),
            None => Ok(self),
        }
    }

    fn amount(&mut self, name: &str, value: Decimal) -> Result<&mut Self, SiiError> {
        self.text(name, &format_amount(value))
    }

    fn opt_amount(&mut self, name: &str, value: Option<Decimal>) -> Result<&mut Self, SiiError> {
        match value {
            Some(v) => self.amount(name, v),
            None => Ok(self),
        }
    }
}

/// AEAT amounts carry exactly two decimals, halves rounded away from zero.
pub fn format_amount(d: Decimal) -> String {
    format!(
        "{:.2}",
        d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

fn open_envelope(w: &mut XmlWriter, root: &str) -> Result<(), SiiError> {
    w.start_with_attrs(
        "soapenv:Envelope",
        &[
            ("xmlns:soapenv", SOAPENV_NS),
            ("xmlns:siiLR", SII_LR_NS),
            ("xmlns:sii", SII_NS),
        ],
    )?;
    w.empty("soapenv:Header")?;
    w.start("soapenv:Body")?;
    w.start(root)?;
    Ok(())
}

fn close_envelope(mut w: XmlWriter, root: &str) -> Result<String, SiiError> {
    w.end(root)?.end("soapenv:Body")?.end("soapenv:Envelope")?;
    w.into_string()
}

/// `Cabecera`. Only register requests state a communication type.
fn write_headers(w: &mut XmlWriter, headers: &Headers, with_type: bool) -> Result<(), SiiError> {
    w.start("sii:Cabecera")?;
    w.text("sii:IDVersionSii", headers.version.code())?;
    w.start("sii:Titular")?;
    w.text("sii:NombreRazon", &headers.holder_name)?;
    w.text("sii:NIF", &headers.holder_nif)?;
    w.end("sii:Titular")?;
    if with_type {
        w.text("sii:TipoComunicacion", headers.communication_type.code())?;
    }
    w.end("sii:Cabecera")?;
    Ok(())
}

fn write_period(w: &mut XmlWriter, headers: &Headers, period: &PeriodBlock) -> Result<(), SiiError> {
    let element = format!("sii:{}", headers.version.period_element());
    w.start(&element)?;
    w.text("sii:Ejercicio", &period.year)?;
    w.text("sii:Periodo", &period.period)?;
    w.end(&element)?;
    Ok(())
}

fn write_party_id(w: &mut XmlWriter, id: &PartyId) -> Result<(), SiiError> {
    w.opt_text("sii:NIF", id.nif.as_deref())?;
    if let Some(other) = &id.other {
        w.start("sii:IDOtro")?;
        w.text("sii:CodigoPais", &other.country)?;
        w.text("sii:IDType", other.id_type.code())?;
        w.text("sii:ID", &other.id)?;
        w.end("sii:IDOtro")?;
    }
    Ok(())
}

fn write_invoice_id(w: &mut XmlWriter, id: &InvoiceIdBlock) -> Result<(), SiiError> {
    w.start("siiLR:IDFactura")?;
    w.start("sii:IDEmisorFactura")?;
    write_party_id(w, &id.issuer)?;
    w.end("sii:IDEmisorFactura")?;
    w.text("sii:NumSerieFacturaEmisor", &id.serial_number)?;
    w.opt_text(
        "sii:NumSerieFacturaEmisorResumenFin",
        id.final_serial_number.as_deref(),
    )?;
    w.text("sii:FechaExpedicionFacturaEmisor", &id.issue_date)?;
    w.end("siiLR:IDFactura")?;
    Ok(())
}

fn write_counterpart(w: &mut XmlWriter, counterpart: Option<&Counterpart>) -> Result<(), SiiError> {
    let Some(c) = counterpart else {
        return Ok(());
    };
    w.start("sii:Contraparte")?;
    w.text("sii:NombreRazon", &c.name)?;
    write_party_id(w, &c.id)?;
    w.end("sii:Contraparte")?;
    Ok(())
}

fn write_detail(w: &mut XmlWriter, detail: &TaxDetail, amount_element: &str) -> Result<(), SiiError> {
    w.start("sii:DetalleIVA")?;
    w.opt_amount("sii:TipoImpositivo", detail.rate)?;
    w.amount("sii:BaseImponible", detail.base)?;
    w.opt_amount(amount_element, detail.amount)?;
    w.opt_amount("sii:TipoRecargoEquivalencia", detail.surcharge_rate)?;
    w.opt_amount("sii:CuotaRecargoEquivalencia", detail.surcharge_amount)?;
    w.opt_amount("sii:PorcentCompensacionREAGYP", detail.reagyp_rate)?;
    w.opt_amount("sii:ImporteCompensacionREAGYP", detail.reagyp_amount)?;
    w.end("sii:DetalleIVA")?;
    Ok(())
}

fn write_issued_breakdown(w: &mut XmlWriter, breakdown: &Breakdown) -> Result<(), SiiError> {
    w.start("sii:TipoDesglose")?;
    w.start("sii:DesgloseFactura")?;
    w.start("sii:Sujeta")?;
    if let Some(exempt) = &breakdown.exempt {
        w.start("sii:Exenta")?;
        w.text("sii:CausaExencion", exempt.cause.code())?;
        w.amount("sii:BaseImponible", exempt.base)?;
        w.end("sii:Exenta")?;
    }
    if let Some(not_exempt) = &breakdown.not_exempt {
        w.start("sii:NoExenta")?;
        w.text("sii:TipoNoExenta", not_exempt.kind.code())?;
        w.start("sii:DesgloseIVA")?;
        for detail in &not_exempt.details {
            write_detail(w, detail, "sii:CuotaRepercutida")?;
        }
        w.end("sii:DesgloseIVA")?;
        w.end("sii:NoExenta")?;
    }
    w.end("sii:Sujeta")?;
    w.end("sii:DesgloseFactura")?;
    w.end("sii:TipoDesglose")?;
    Ok(())
}

fn write_issued(w: &mut XmlWriter, body: &IssuedInvoice) -> Result<(), SiiError> {
    w.start("siiLR:FacturaExpedida")?;
    w.text("sii:TipoFactura", body.invoice_kind.code())?;
    w.opt_text("sii:TipoRectificativa", body.rectification.map(|r| r.code()))?;
    w.text("sii:ClaveRegimenEspecialOTrascendencia", body.special_key.code())?;
    w.amount("sii:ImporteTotal", body.total_amount)?;
    w.text("sii:DescripcionOperacion", &body.description)?;
    write_counterpart(w, body.counterpart.as_ref())?;
    write_issued_breakdown(w, &body.breakdown)?;
    w.end("siiLR:FacturaExpedida")?;
    Ok(())
}

fn write_received(w: &mut XmlWriter, body: &ReceivedInvoice) -> Result<(), SiiError> {
    w.start("siiLR:FacturaRecibida")?;
    w.text("sii:TipoFactura", body.invoice_kind.code())?;
    w.opt_text("sii:TipoRectificativa", body.rectification.map(|r| r.code()))?;
    w.text("sii:ClaveRegimenEspecialOTrascendencia", body.special_key.code())?;
    w.amount("sii:ImporteTotal", body.total_amount)?;
    w.text("sii:DescripcionOperacion", &body.description)?;
    w.start("sii:DesgloseFactura")?;
    w.start("sii:DesgloseIVA")?;
    for detail in &body.details {
        write_detail(w, detail, "sii:CuotaSoportada")?;
    }
    w.end("sii:DesgloseIVA")?;
    w.end("sii:DesgloseFactura")?;
    write_counterpart(w, body.counterpart.as_ref())?;
    w.text("sii:FechaRegContable", &body.accounting_date)?;
    w.amount("sii:CuotaDeducible", body.deductible_amount)?;
    w.end("siiLR:FacturaRecibida")?;
    Ok(())
}

/// Register (`A0`) or amend (`A1`) request.
///
/// Every record must match `direction`.
pub fn submit_envelope(
    headers: &Headers,
    direction: Direction,
    records: &[SubmitRecord],
) -> Result<String, SiiError> {
    let op = Operation::Submit;
    let root = op.root_element(direction);
    let mut w = XmlWriter::new()?;
    open_envelope(&mut w, root)?;
    write_headers(&mut w, headers, true)?;
    for record in records {
        if record.direction() != direction {
            return Err(SiiError::Xml(format!(
                "record {} does not belong to the {} book",
                record.id().serial_number,
                direction_name(direction)
            )));
        }
        w.start(op.record_element(direction))?;
        match record {
            SubmitRecord::Issued(r) => {
                write_period(&mut w, headers, &r.period)?;
                write_invoice_id(&mut w, &r.id)?;
                write_issued(&mut w, &r.body)?;
            }
            SubmitRecord::Received(r) => {
                write_period(&mut w, headers, &r.period)?;
                write_invoice_id(&mut w, &r.id)?;
                write_received(&mut w, &r.body)?;
            }
        }
        w.end(op.record_element(direction))?;
    }
    close_envelope(w, root)
}

/// Delete request.
pub fn cancel_envelope(
    headers: &Headers,
    direction: Direction,
    records: &[RecordHeader],
) -> Result<String, SiiError> {
    let op = Operation::Cancel;
    let root = op.root_element(direction);
    let mut w = XmlWriter::new()?;
    open_envelope(&mut w, root)?;
    write_headers(&mut w, headers, false)?;
    for record in records {
        w.start(op.record_element(direction))?;
        write_period(&mut w, headers, &record.period)?;
        write_invoice_id(&mut w, &record.id)?;
        w.end(op.record_element(direction))?;
    }
    close_envelope(w, root)
}

/// Query for everything registered in one period.
pub fn query_envelope(
    headers: &Headers,
    direction: Direction,
    period: &PeriodBlock,
) -> Result<String, SiiError> {
    let root = Operation::Query.root_element(direction);
    let mut w = XmlWriter::new()?;
    open_envelope(&mut w, root)?;
    write_headers(&mut w, headers, false)?;
    w.start("siiLR:FiltroConsulta")?;
    write_period(&mut w, headers, period)?;
    w.end("siiLR:FiltroConsulta")?;
    close_envelope(w, root)
}

fn direction_name(direction: Direction) -> &'static str {
    match direction {
        Direction::Issued => "issued",
        Direction::Received => "received",
    }
}
