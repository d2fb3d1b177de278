//! Request tree sent to AEAT.
//!
//! Field names are Rust-side; the SOAP writer maps each one onto its schema
//! element (`PeriodoImpositivo`, `IDFactura`, `DetalleIVA`, ...).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{
    CommunicationType, Direction, ExemptionCause, IssuedRegimeKey, OperationKey,
    PartyIdentifierType, ReceivedRegimeKey, SiiVersion, SubjectedKey,
};

/// `Cabecera`: who sends and what kind of communication it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    /// `IDVersionSii`
    pub version: SiiVersion,
    /// `Titular/NombreRazon`
    pub holder_name: String,
    /// `Titular/NIF`
    pub holder_nif: String,
    /// `TipoComunicacion`
    pub communication_type: CommunicationType,
}

impl Headers {
    pub fn new(
        holder_name: impl Into<String>,
        holder_nif: impl Into<String>,
        communication_type: CommunicationType,
        version: SiiVersion,
    ) -> Self {
        Self {
            version,
            holder_name: crate::core::unaccent(&holder_name.into()),
            holder_nif: holder_nif.into(),
            communication_type,
        }
    }
}

/// `PeriodoImpositivo` (`PeriodoLiquidacion` from 1.1): fiscal year and two-digit month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodBlock {
    pub year: String,
    pub period: String,
}

/// Identification of a party either by Spanish NIF or by `IDOtro`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyId {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nif: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other: Option<OtherId>,
}

impl PartyId {
    /// The raw identifier, whichever form it takes.
    pub fn code(&self) -> Option<&str> {
        self.nif
            .as_deref()
            .or_else(|| self.other.as_ref().map(|o| o.id.as_str()))
    }
}

/// `IDOtro`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherId {
    pub country: String,
    pub id_type: PartyIdentifierType,
    pub id: String,
}

/// `IDFactura`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIdBlock {
    pub issuer: PartyId,
    pub serial_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_serial_number: Option<String>,
    /// `DD/MM/YYYY`
    pub issue_date: String,
}

impl InvoiceIdBlock {
    pub fn correlation_key(&self) -> CorrelationKey {
        CorrelationKey::new(
            self.issuer.code().unwrap_or_default(),
            &self.serial_number,
            &self.issue_date,
        )
    }
}

/// Key echoed back by AEAT for each record, used to pair responses with requests.
///
/// Received invoices from different suppliers may share serial number and
/// date, so the issuer is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationKey {
    pub issuer: String,
    pub serial_number: String,
    pub issue_date: String,
}

impl CorrelationKey {
    pub fn new(issuer: &str, serial_number: &str, issue_date: &str) -> Self {
        Self {
            issuer: issuer.trim().to_uppercase(),
            serial_number: serial_number.trim().to_string(),
            issue_date: issue_date.trim().replace('-', "/"),
        }
    }
}

/// Period plus identity of one record: the body of a delete request and the
/// snapshot kept on the invoice after a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub period: PeriodBlock,
    pub id: InvoiceIdBlock,
}

impl RecordHeader {
    pub fn to_snapshot(&self) -> String {
        // serializing plain strings and enums cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_snapshot(snapshot: &str) -> Option<Self> {
        serde_json::from_str(snapshot).ok()
    }
}

/// `Contraparte`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterpart {
    pub name: String,
    pub id: PartyId,
}

/// `DetalleIVA`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxDetail {
    /// Percentage, e.g. 21 for 21 %.
    pub rate: Option<Decimal>,
    pub base: Decimal,
    /// `CuotaRepercutida` (issued) or `CuotaSoportada` (received).
    pub amount: Option<Decimal>,
    pub surcharge_rate: Option<Decimal>,
    pub surcharge_amount: Option<Decimal>,
    pub reagyp_rate: Option<Decimal>,
    pub reagyp_amount: Option<Decimal>,
}

/// `Exenta`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptBlock {
    pub cause: ExemptionCause,
    pub base: Decimal,
}

/// `NoExenta`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotExemptBlock {
    pub kind: SubjectedKey,
    pub details: Vec<TaxDetail>,
}

/// `TipoDesglose/DesgloseFactura/Sujeta`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub exempt: Option<ExemptBlock>,
    pub not_exempt: Option<NotExemptBlock>,
}

/// `TipoRectificativa`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RectificationType {
    /// "S"
    Substitution,
    /// "I"
    Differences,
}

impl RectificationType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Substitution => "S",
            Self::Differences => "I",
        }
    }
}

/// `FacturaExpedida`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedInvoice {
    pub invoice_kind: OperationKey,
    pub rectification: Option<RectificationType>,
    pub special_key: IssuedRegimeKey,
    pub total_amount: Decimal,
    pub description: String,
    /// Absent for F2, F4 and R5.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterpart: Option<Counterpart>,
    pub breakdown: Breakdown,
}

/// `FacturaRecibida`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedInvoice {
    pub invoice_kind: OperationKey,
    pub rectification: Option<RectificationType>,
    pub special_key: ReceivedRegimeKey,
    pub total_amount: Decimal,
    pub description: String,
    pub details: Vec<TaxDetail>,
    /// Absent for F2, F4 and R5.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterpart: Option<Counterpart>,
    /// `FechaRegContable`, `DD/MM/YYYY`
    pub accounting_date: String,
    /// `CuotaDeducible`
    pub deductible_amount: Decimal,
}

/// One `RegistroLRFacturas*` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest<B> {
    pub period: PeriodBlock,
    pub id: InvoiceIdBlock,
    pub body: B,
}

pub type IssuedRequest = InvoiceRequest<IssuedInvoice>;
pub type ReceivedRequest = InvoiceRequest<ReceivedInvoice>;

impl<B> InvoiceRequest<B> {
    pub fn header(&self) -> RecordHeader {
        RecordHeader {
            period: self.period.clone(),
            id: self.id.clone(),
        }
    }
}

/// A register request of either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitRecord {
    Issued(IssuedRequest),
    Received(ReceivedRequest),
}

impl SubmitRecord {
    pub fn direction(&self) -> Direction {
        match self {
            Self::Issued(_) => Direction::Issued,
            Self::Received(_) => Direction::Received,
        }
    }

    pub fn header(&self) -> RecordHeader {
        match self {
            Self::Issued(r) => r.header(),
            Self::Received(r) => r.header(),
        }
    }

    pub fn id(&self) -> &InvoiceIdBlock {
        match self {
            Self::Issued(r) => &r.id,
            Self::Received(r) => &r.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> RecordHeader {
        RecordHeader {
            period: PeriodBlock {
                year: "2017".into(),
                period: "07".into(),
            },
            id: InvoiceIdBlock {
                issuer: PartyId {
                    nif: Some("B12345678".into()),
                    other: None,
                },
                serial_number: "FV-1".into(),
                final_serial_number: None,
                issue_date: "12/07/2017".into(),
            },
        }
    }

    #[test]
    fn snapshot_roundtrip() {
        let h = header();
        let snap = h.to_snapshot();
        assert!(snap.contains("\"serial_number\":\"FV-1\""));
        assert_eq!(RecordHeader::from_snapshot(&snap), Some(h));
        assert_eq!(RecordHeader::from_snapshot("not json"), None);
    }

    #[test]
    fn correlation_key_normalises_dashes() {
        let k = CorrelationKey::new(" b12345678 ", " FV-1 ", "12-07-2017");
        assert_eq!(k, header().id.correlation_key());
    }

    #[test]
    fn correlation_key_tells_issuers_apart() {
        let mut other = header().id;
        other.issuer.nif = Some("B99999999".into());
        assert_ne!(other.correlation_key(), header().id.correlation_key());
    }

    #[test]
    fn holder_name_is_unaccented() {
        let h = Headers::new(
            "Compañía Ñandú SL",
            "B12345678",
            CommunicationType::New,
            SiiVersion::V1_0,
        );
        assert_eq!(h.holder_name, "Compania Nandu SL");
    }
}
