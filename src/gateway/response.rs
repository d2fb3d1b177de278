use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{CommunicationState, InvoiceSiiState, OperationKey};
use crate::mapping::{Counterpart, CorrelationKey, InvoiceIdBlock, TaxDetail};

/// Answer to a register or delete request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// `EstadoEnvio`
    pub state: CommunicationState,
    /// Confirmation code; absent when the whole submission was rejected.
    pub csv: Option<String>,
    /// `RespuestaLinea`, one per record sent.
    pub lines: Vec<ResponseLine>,
}

/// Outcome of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseLine {
    /// Identity echoed back in `IDFactura`.
    pub key: Option<CorrelationKey>,
    /// `EstadoRegistro`
    pub state: InvoiceSiiState,
    /// `CodigoErrorRegistro`
    pub error_code: Option<i64>,
    /// `DescripcionErrorRegistro`
    pub error_message: Option<String>,
}

impl ResponseLine {
    pub fn accepted(key: CorrelationKey) -> Self {
        Self {
            key: Some(key),
            state: InvoiceSiiState::Accepted,
            error_code: None,
            error_message: None,
        }
    }

    pub fn rejected(key: CorrelationKey, code: i64, message: impl Into<String>) -> Self {
        Self {
            key: Some(key),
            state: InvoiceSiiState::Rejected,
            error_code: Some(code),
            error_message: Some(message.into()),
        }
    }
}

/// Answer to a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub records: Vec<QueryRecord>,
}

/// One record AEAT holds, with its current status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: InvoiceIdBlock,
    /// `EstadoFactura/EstadoRegistro`
    pub state: InvoiceSiiState,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
    pub invoice_kind: Option<OperationKey>,
    pub special_key: Option<String>,
    pub total_amount: Option<Decimal>,
    pub taxes: Vec<TaxDetail>,
    pub counterpart: Option<Counterpart>,
    pub presentation: Option<Presentation>,
    /// `EstadoCuadre`
    pub balance_state: Option<String>,
}

/// `DatosPresentacion`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    pub presenter: String,
    pub timestamp: Option<NaiveDateTime>,
    pub csv: Option<String>,
}
