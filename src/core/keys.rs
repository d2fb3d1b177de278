//! AEAT SII code lists (the `L*` tables of the SII technical design).
//!
//! The codes are protocol-mandated and reproduced verbatim. Each list exposes
//! `code()`, `from_code()` and a human-readable `description()`; serde uses the
//! protocol code.

use serde::{Deserialize, Serialize};

macro_rules! code_list {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $code:tt, $desc:tt; )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $code)] $variant, )+
        }

        impl $name {
            /// Every code in the list, in protocol order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Protocol code.
            pub fn code(&self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            /// Parse from the protocol code.
            pub fn from_code(code: &str) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn description(&self) -> &'static str {
                match self {
                    $(Self::$variant => $desc,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.code())
            }
        }
    };
}

code_list! {
    /// L0: communication type (`TipoComunicacion`), plus query and delete.
    CommunicationType {
        /// A0: register new invoices.
        New => "A0", "Registration of invoices/records";
        /// A1: amend registration errors.
        Amend => "A1", "Amendment of invoices/records (registration errors)";
        /// C0: query previously sent invoices.
        Query => "C0", "Query invoices";
        /// D0: delete previously sent invoices.
        Delete => "D0", "Delete invoices";
    }
}

impl CommunicationType {
    /// New and amend communications carry full invoice bodies.
    pub fn is_submission(&self) -> bool {
        matches!(self, Self::New | Self::Amend)
    }
}

code_list! {
    /// Register (book) a report covers.
    BookKey {
        Issued => "E", "Issued invoices";
        InvestmentGoods => "I", "Investment goods";
        Received => "R", "Received invoices";
        Intracommunity => "U", "Particular intracommunity operations";
    }
}

code_list! {
    /// L2_EMI / L2_RECI: invoice kind (`TipoFactura`).
    OperationKey {
        Invoice => "F1", "Invoice";
        SimplifiedInvoice => "F2", "Simplified invoice (ticket)";
        /// R1: Art. 80.1, 80.2, 80.6 and error grounded in law.
        CorrectedLaw => "R1", "Corrected invoice (Art 80.1, 80.2 and 80.6 and error grounded in law)";
        CorrectedArt803 => "R2", "Corrected invoice (Art. 80.3)";
        CreditNote => "R3", "Credit note (Art 80.4)";
        CorrectedOther => "R4", "Corrected invoice (other)";
        CorrectedSimplified => "R5", "Corrected invoice in simplified invoices";
        SubstituteInvoice => "F3", "Invoice issued to replace simplified invoices issued and filed";
        InvoiceSummary => "F4", "Invoice summary entry";
        Import => "F5", "Import (DUA)";
        Other => "F6", "Other accounting documents";
    }
}

impl OperationKey {
    /// Kinds sent without a `Contraparte` block: F2, F4 and R5.
    pub fn has_counterpart(&self) -> bool {
        !matches!(
            self,
            Self::SimplifiedInvoice | Self::InvoiceSummary | Self::CorrectedSimplified
        )
    }

    /// R1–R5 correct a previously issued invoice.
    pub fn is_corrective(&self) -> bool {
        matches!(
            self,
            Self::CorrectedLaw
                | Self::CorrectedArt803
                | Self::CreditNote
                | Self::CorrectedOther
                | Self::CorrectedSimplified
        )
    }
}

code_list! {
    /// L4: identifier type for counterparts without a Spanish NIF (`IDType`).
    PartyIdentifierType {
        NifVat => "02", "NIF-VAT";
        Passport => "03", "Passport";
        OfficialDocument => "04", "Official identification document issued by the country or region of residence";
        ResidenceCertificate => "05", "Residence certificate";
        OtherDocument => "06", "Other supporting document";
        NotRegistered => "07", "Not registered";
    }
}

code_list! {
    /// L3.1: special regime or transcendence key for issued invoices.
    IssuedRegimeKey {
        General => "01", "General tax regime activity";
        Export => "02", "Export";
        UsedGoods => "03", "Special scheme of used goods, works of art, antiquities and collectables";
        InvestmentGold => "04", "Special scheme for investment gold";
        TravelAgencies => "05", "Special scheme for travel agencies";
        EntityGroups => "06", "Special scheme applicable to groups of entities, VAT (advanced)";
        CashBasis => "07", "Special cash basis scheme";
        CanaryIslands => "08", "Activities subject to IGIC / IPSI";
        TravelAgencyIntermediation => "09", "Travel agency services acting as intermediaries";
        ThirdPartyCollections => "10", "Collections on behalf of third parties";
        LeaseWithWithholding => "11", "Business premises lease activities subject to withholding";
        LeaseWithoutWithholding => "12", "Business premises lease activities not subject to withholding";
        LeaseMixed => "13", "Business premises lease activities subject and not subject to withholding";
        PendingAccrualPublicWorks => "14", "Invoice with VAT pending accrual (work certifications for public administration)";
        PendingAccrualSuccessive => "15", "Invoice with VAT pending accrual - operations of successive tract";
        FirstSemester2017 => "16", "First semester 2017";
    }
}

code_list! {
    /// L3.2: special regime or transcendence key for received invoices.
    ReceivedRegimeKey {
        General => "01", "General tax regime activity";
        AgricultureCompensation => "02", "Compensation for the special VAT arrangements for agriculture and fisheries";
        UsedGoods => "03", "Special scheme of used goods, works of art, antiquities and collectables";
        InvestmentGold => "04", "Special scheme for investment gold";
        TravelAgencies => "05", "Special scheme for travel agencies";
        EntityGroups => "06", "Special scheme applicable to groups of entities, VAT (advanced)";
        CashBasis => "07", "Special cash basis scheme";
        CanaryIslands => "08", "Activities subject to IGIC / IPSI";
        IntracommunityAcquisition => "09", "Intra-community acquisition of assets and provisions of services";
        Lease => "12", "Business premises lease activities";
        ImportWithoutDua => "13", "Invoice corresponding to an import (reported without a DUA)";
        FirstSemester2017 => "14", "First semester 2017";
    }
}

code_list! {
    /// L7: subject, not exempt (`TipoNoExenta`).
    SubjectedKey {
        NoReverseCharge => "S1", "Subject - not exempt. Non VAT reverse charge";
        ReverseCharge => "S2", "Subject - not exempt. VAT reverse charge";
        Both => "S3", "Subject - not exempt. Both non VAT reverse charge and VAT reverse charge";
    }
}

code_list! {
    /// L9: exemption cause (`CausaExencion`).
    ExemptionCause {
        Article20 => "E1", "Exempt on account of Article 20";
        Article21 => "E2", "Exempt on account of Article 21";
        Article22 => "E3", "Exempt on account of Article 22";
        Article23And24 => "E4", "Exempt on account of Article 23 and Article 24";
        Article25 => "E5", "Exempt on account of Article 25";
        OtherGrounds => "E6", "Exempt on other grounds";
    }
}

code_list! {
    /// L12: particular intracommunity operation type.
    IntracommunityType {
        PartialWorks => "A", "Transmission or receipt of goods for partial reports or works (Art. 70.1.7)";
        Article9And16 => "B", "Transfers of goods or intra-Community acquisitions listed in Art. 9.3 and 16.2";
    }
}

code_list! {
    /// `IDVersionSii` schema version tag.
    SiiVersion {
        V0_7 => "0.7", "SII 0.7";
        V1_0 => "1.0", "SII 1.0";
        V1_1 => "1.1", "SII 1.1";
    }
}

impl Default for SiiVersion {
    fn default() -> Self {
        Self::V1_0
    }
}

impl SiiVersion {
    /// Element wrapping `Ejercicio` and `Periodo`; renamed in 1.1.
    pub fn period_element(&self) -> &'static str {
        match self {
            Self::V0_7 | Self::V1_0 => "PeriodoImpositivo",
            Self::V1_1 => "PeriodoLiquidacion",
        }
    }
}

/// Lifecycle of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportState {
    Draft,
    Confirmed,
    Sent,
    Cancelled,
}

impl ReportState {
    /// Every allowed edge. `Sent` has no outgoing edge.
    pub const TRANSITIONS: &'static [(ReportState, ReportState)] = &[
        (Self::Draft, Self::Confirmed),
        (Self::Draft, Self::Cancelled),
        (Self::Confirmed, Self::Draft),
        (Self::Confirmed, Self::Sent),
        (Self::Confirmed, Self::Cancelled),
        (Self::Cancelled, Self::Draft),
    ];

    pub const ALL: &'static [ReportState] =
        &[Self::Draft, Self::Confirmed, Self::Sent, Self::Cancelled];

    pub fn can_transition_to(self, to: ReportState) -> bool {
        Self::TRANSITIONS.contains(&(self, to))
    }
}

impl std::fmt::Display for ReportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Draft => "draft",
            Self::Confirmed => "confirmed",
            Self::Sent => "sent",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Outcome of a whole submission (`EstadoEnvio`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommunicationState {
    #[serde(rename = "Correcto")]
    Accepted,
    #[serde(rename = "ParcialmenteCorrecto")]
    PartiallyAccepted,
    #[serde(rename = "Incorrecto")]
    Rejected,
}

impl CommunicationState {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Accepted => "Correcto",
            Self::PartiallyAccepted => "ParcialmenteCorrecto",
            Self::Rejected => "Incorrecto",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "Correcto" | "Correcta" => Some(Self::Accepted),
            "ParcialmenteCorrecto" | "ParcialmenteCorrecta" => Some(Self::PartiallyAccepted),
            "Incorrecto" | "Incorrecta" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Outcome of one invoice record (`EstadoRegistro`).
///
/// AEAT answers with both masculine and feminine spellings depending on the
/// service (`Correcto`/`Correcta`, `AceptadoConErrores`/`AceptadaConErrores`).
/// All of them parse; [`code`](Self::code) always yields the canonical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceSiiState {
    #[serde(rename = "Correcto", alias = "Correcta")]
    Accepted,
    #[serde(rename = "AceptadoConErrores", alias = "AceptadaConErrores")]
    AcceptedWithErrors,
    #[serde(rename = "Anulada", alias = "Anulado")]
    Deleted,
    #[serde(rename = "Incorrecto", alias = "Incorrecta")]
    Rejected,
}

impl InvoiceSiiState {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Accepted => "Correcto",
            Self::AcceptedWithErrors => "AceptadoConErrores",
            Self::Deleted => "Anulada",
            Self::Rejected => "Incorrecto",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "Correcto" | "Correcta" => Some(Self::Accepted),
            "AceptadoConErrores" | "AceptadaConErrores" => Some(Self::AcceptedWithErrors),
            "Anulada" | "Anulado" => Some(Self::Deleted),
            "Incorrecto" | "Incorrecta" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// The record is registered at AEAT (with or without errors).
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Accepted | Self::AcceptedWithErrors)
    }
}

impl std::fmt::Display for InvoiceSiiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_roundtrip_for_every_list() {
        for k in OperationKey::ALL {
            assert_eq!(OperationKey::from_code(k.code()), Some(*k));
        }
        for k in IssuedRegimeKey::ALL {
            assert_eq!(IssuedRegimeKey::from_code(k.code()), Some(*k));
        }
        for k in ReceivedRegimeKey::ALL {
            assert_eq!(ReceivedRegimeKey::from_code(k.code()), Some(*k));
        }
        assert_eq!(IssuedRegimeKey::ALL.len(), 16);
        assert_eq!(PartyIdentifierType::ALL.len(), 6);
    }

    #[test]
    fn counterpart_rule() {
        let without: Vec<_> = OperationKey::ALL
            .iter()
            .filter(|k| !k.has_counterpart())
            .map(|k| k.code())
            .collect();
        assert_eq!(without, vec!["F2", "R5", "F4"]);
    }

    #[test]
    fn historical_state_variants_normalise() {
        assert_eq!(
            InvoiceSiiState::from_code("Correcta"),
            Some(InvoiceSiiState::Accepted)
        );
        assert_eq!(
            InvoiceSiiState::from_code("AceptadaConErrores").map(|s| s.code()),
            Some("AceptadoConErrores")
        );
        let parsed: InvoiceSiiState = serde_json::from_str("\"AceptadaConErrores\"").unwrap();
        assert_eq!(parsed, InvoiceSiiState::AcceptedWithErrors);
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            "\"AceptadoConErrores\""
        );
    }

    #[test]
    fn serde_uses_protocol_codes() {
        assert_eq!(
            serde_json::to_string(&CommunicationType::New).unwrap(),
            "\"A0\""
        );
        let book: BookKey = serde_json::from_str("\"R\"").unwrap();
        assert_eq!(book, BookKey::Received);
        assert_eq!(SiiVersion::default().code(), "1.0");
    }

    #[test]
    fn report_state_text_matches_serde() {
        for state in ReportState::ALL {
            assert_eq!(
                serde_json::to_string(state).unwrap(),
                format!("\"{state}\"")
            );
        }
        assert!(!ReportState::Sent.can_transition_to(ReportState::Draft));
    }

    #[test]
    fn period_element_follows_version() {
        assert_eq!(SiiVersion::default().period_element(), "PeriodoImpositivo");
        assert_eq!(SiiVersion::V0_7.period_element(), "PeriodoImpositivo");
        assert_eq!(SiiVersion::V1_1.period_element(), "PeriodoLiquidacion");
        assert_eq!(SiiVersion::from_code("1.1"), Some(SiiVersion::V1_1));
    }
}
