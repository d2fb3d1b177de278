//! Submission Gateway: the boundary to the AEAT web services.
//!
//! [`SiiGateway`] exposes the three verbs the report workflow needs, per
//! invoice direction. Credentials are acquired from a [`CredentialSource`]
//! for the duration of one call and released when the
//! [`ClientCertificate`] is dropped.
//!
//! With the `soap` feature, [`SoapGateway`] implements the trait over
//! HTTPS with client-certificate authentication.

mod config;
mod credentials;
mod response;

#[cfg(feature = "soap")]
mod client;
#[cfg(feature = "soap")]
pub mod envelope;
#[cfg(feature = "soap")]
pub mod parse;

pub use config::{ENV_TEST, ENV_TIMEOUT_SECS, Environment, GatewayConfig, GatewayConfigBuilder};
pub use credentials::{ClientCertificate, CredentialSource, PemCredentials};
pub use response::*;

#[cfg(feature = "soap")]
pub use client::SoapGateway;

use async_trait::async_trait;

use crate::core::{Direction, SiiError};
use crate::mapping::{Headers, PeriodBlock, RecordHeader, SubmitRecord};

/// The AEAT SII services used by a report.
///
/// Implementations turn transport failures, SOAP faults and schema
/// rejections into [`SiiError::Gateway`] with a readable message.
#[async_trait]
pub trait SiiGateway: Send + Sync {
    /// Register (`A0`) or amend (`A1`) invoices.
    async fn submit(
        &self,
        credential: &ClientCertificate,
        headers: &Headers,
        direction: Direction,
        records: &[SubmitRecord],
    ) -> Result<SubmitResponse, SiiError>;

    /// Delete previously registered invoices.
    async fn cancel(
        &self,
        credential: &ClientCertificate,
        headers: &Headers,
        direction: Direction,
        records: &[RecordHeader],
    ) -> Result<SubmitResponse, SiiError>;

    /// List what AEAT holds for one period.
    async fn query(
        &self,
        credential: &ClientCertificate,
        headers: &Headers,
        direction: Direction,
        period: &PeriodBlock,
    ) -> Result<QueryResponse, SiiError>;
}
