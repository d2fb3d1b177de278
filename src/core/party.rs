//! Party identity as reported to AEAT.

use super::keys::PartyIdentifierType;
use super::types::{IdentifierKind, Party};

impl Party {
    /// NIF as AEAT expects it: the last nine characters of the VAT code,
    /// or the first identifier when the party has no VAT code.
    pub fn sii_vat_code(&self) -> Option<String> {
        match self.vat_code.as_deref().filter(|v| !v.is_empty()) {
            Some(vat) => {
                let chars: Vec<char> = vat.chars().collect();
                let start = chars.len().saturating_sub(9);
                Some(chars[start..].iter().collect())
            }
            None => self.identifiers.first().map(|i| i.code.clone()),
        }
    }

    /// Country prefix of the VAT code.
    pub fn sii_vat_country(&self) -> Option<String> {
        self.vat_code
            .as_deref()
            .filter(|v| v.chars().count() >= 2)
            .map(|v| v.chars().take(2).collect::<String>().to_uppercase())
    }

    /// Identifier for the counterpart block: the VAT code, else the first
    /// identifier, without a leading `ES`.
    pub fn counterpart_nif(&self) -> String {
        let nif = self
            .vat_code
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(|| self.identifiers.first().map(|i| i.code.clone()))
            .unwrap_or_default();
        match nif.strip_prefix("ES") {
            Some(rest) => rest.to_string(),
            None => nif,
        }
    }

    /// Recompute `sii_identifier_type` from the identifiers.
    ///
    /// Spanish VAT numbers need no identifier type (they go as `NIF`); other EU
    /// VAT numbers are `02` and EU non-VAT identifiers `04`. Identifiers of
    /// other kinds leave the current value untouched.
    pub fn refresh_identifier_type(&mut self) {
        for identifier in &self.identifiers {
            match identifier.kind {
                IdentifierKind::EuVat => {
                    self.sii_identifier_type = if identifier.code.starts_with("ES") {
                        None
                    } else {
                        Some(PartyIdentifierType::NifVat)
                    };
                }
                IdentifierKind::EuNotVat => {
                    self.sii_identifier_type = Some(PartyIdentifierType::OfficialDocument);
                }
                IdentifierKind::Other(_) => {}
            }
        }
    }
}
