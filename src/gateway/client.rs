//! HTTPS transport to the AEAT SOAP endpoints.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::debug;

use crate::core::{Direction, SiiError};
use crate::mapping::{Headers, PeriodBlock, RecordHeader, SubmitRecord};

use super::config::GatewayConfig;
use super::credentials::ClientCertificate;
use super::envelope::{self, Operation};
use super::parse;
use super::response::{QueryResponse, SubmitResponse};
use super::SiiGateway;

/// [`SiiGateway`] over SOAP/HTTPS, authenticated by client certificate.
///
/// A TLS client is built per call from the certificate passed in, so no key
/// material outlives the call.
#[derive(Debug, Clone, Default)]
pub struct SoapGateway {
    config: GatewayConfig,
}

impl SoapGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn client(&self, credential: &ClientCertificate) -> Result<reqwest::Client, SiiError> {
        let pem = credential.identity_pem();
        let identity = reqwest::Identity::from_pem(pem.expose_secret().as_bytes())
            .map_err(|e| SiiError::Gateway(format!("invalid client certificate: {e}")))?;
        reqwest::Client::builder()
            .identity(identity)
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| SiiError::Gateway(e.to_string()))
    }

    /// POST an envelope and return the answer body.
    ///
    /// SOAP faults arrive with HTTP 500, so the body is handed on whenever it
    /// holds one.
    async fn post(
        &self,
        credential: &ClientCertificate,
        direction: Direction,
        operation: Operation,
        body: String,
    ) -> Result<String, SiiError> {
        let url = self.config.endpoint(direction);
        debug!(
            url = %url,
            operation = operation.name(direction),
            bytes = body.len(),
            "posting SII request"
        );

        let resp = self
            .client(credential)?
            .post(&url)
            .header("Content-Type", "text/xml; charset=UTF-8")
            .header("SOAPAction", "\"\"")
            .body(body)
            .send()
            .await
            .map_err(|e| SiiError::Gateway(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SiiError::Gateway(e.to_string()))?;

        if !status.is_success() && !text.contains("Fault") {
            return Err(SiiError::Gateway(format!("HTTP {status}: {text}")));
        }
        debug!(status = %status, bytes = text.len(), "SII answer received");
        Ok(text)
    }
}

#[async_trait]
impl SiiGateway for SoapGateway {
    async fn submit(
        &self,
        credential: &ClientCertificate,
        headers: &Headers,
        direction: Direction,
        records: &[SubmitRecord],
    ) -> Result<SubmitResponse, SiiError> {
        let body = envelope::submit_envelope(headers, direction, records)?;
        let answer = self
            .post(credential, direction, Operation::Submit, body)
            .await?;
        parse::parse_submit_response(&answer)
    }

    async fn cancel(
        &self,
        credential: &ClientCertificate,
        headers: &Headers,
        direction: Direction,
        records: &[RecordHeader],
    ) -> Result<SubmitResponse, SiiError> {
        let body = envelope::cancel_envelope(headers, direction, records)?;
        let answer = self
            .post(credential, direction, Operation::Cancel, body)
            .await?;
        parse::parse_submit_response(&answer)
    }

    async fn query(
        &self,
        credential: &ClientCertificate,
        headers: &Headers,
        direction: Direction,
        period: &PeriodBlock,
    ) -> Result<QueryResponse, SiiError> {
        let body = envelope::query_envelope(headers, direction, period)?;
        let answer = self
            .post(credential, direction, Operation::Query, body)
            .await?;
        parse::parse_query_response(&answer)
    }
}
