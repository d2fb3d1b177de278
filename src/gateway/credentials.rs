use secrecy::{ExposeSecret, Secret};
use tracing::debug;

use crate::core::{Company, SiiError};

/// Client certificate and private key for one gateway call.
///
/// The key is held in a [`Secret`] and zeroised on drop.
pub struct ClientCertificate {
    holder: String,
    certificate_pem: String,
    private_key_pem: Secret<String>,
}

impl ClientCertificate {
    pub fn new(
        holder: impl Into<String>,
        certificate_pem: impl Into<String>,
        private_key_pem: Secret<String>,
    ) -> Self {
        Self {
            holder: holder.into(),
            certificate_pem: certificate_pem.into(),
            private_key_pem,
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    pub fn private_key(&self) -> &Secret<String> {
        &self.private_key_pem
    }

    /// Certificate followed by key, the bundle TLS identities are built from.
    pub fn identity_pem(&self) -> Secret<String> {
        Secret::new(format!(
            "{}\n{}",
            self.certificate_pem.trim_end(),
            self.private_key_pem.expose_secret()
        ))
    }
}

impl std::fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("holder", &self.holder)
            .field("private_key_pem", &"[REDACTED]")
            .finish()
    }
}

impl Drop for ClientCertificate {
    fn drop(&mut self) {
        debug!(holder = %self.holder, "released SII client certificate");
    }
}

/// Where the company's certificate comes from.
pub trait CredentialSource {
    fn acquire(&self, company: &Company) -> Result<ClientCertificate, SiiError>;
}

/// Fixed PEM certificate and key, e.g. loaded once from disk.
pub struct PemCredentials {
    certificate_pem: String,
    private_key_pem: Secret<String>,
}

impl PemCredentials {
    pub fn new(certificate_pem: impl Into<String>, private_key_pem: impl Into<String>) -> Self {
        Self {
            certificate_pem: certificate_pem.into(),
            private_key_pem: Secret::new(private_key_pem.into()),
        }
    }
}

impl CredentialSource for PemCredentials {
    fn acquire(&self, company: &Company) -> Result<ClientCertificate, SiiError> {
        if self.certificate_pem.trim().is_empty() {
            return Err(SiiError::Config(format!(
                "no SII certificate configured for {}",
                company.name
            )));
        }
        Ok(ClientCertificate::new(
            company.name.clone(),
            self.certificate_pem.clone(),
            Secret::new(self.private_key_pem.expose_secret().clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PartyBuilder;

    fn company() -> Company {
        Company::new("ACME SL", PartyBuilder::new("ACME SL").build())
    }

    #[test]
    fn debug_redacts_key() {
        let cert = ClientCertificate::new("ACME", "CERT", Secret::new("TOP-SECRET".into()));
        let dbg = format!("{cert:?}");
        assert!(!dbg.contains("TOP-SECRET"));
        assert!(dbg.contains("REDACTED"));
    }

    #[test]
    fn identity_bundles_cert_then_key() {
        let cert = ClientCertificate::new("ACME", "CERT\n", Secret::new("KEY".into()));
        assert_eq!(cert.identity_pem().expose_secret(), "CERT\nKEY");
    }

    #[test]
    fn empty_certificate_is_a_config_error() {
        let creds = PemCredentials::new("  ", "KEY");
        assert!(matches!(creds.acquire(&company()), Err(SiiError::Config(_))));
        let creds = PemCredentials::new("CERT", "KEY");
        assert_eq!(creds.acquire(&company()).unwrap().holder(), "ACME SL");
    }
}
