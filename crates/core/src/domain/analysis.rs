use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Proposal text used when the model answered with nothing usable.
pub const PLACEHOLDER_PROPOSAL: &str = "Propuesta generada por IA";

/// Proposal text used when no model answer could be obtained at all.
pub const UNAVAILABLE_PROPOSAL: &str = "No fue posible generar la propuesta detallada en este \
     momento. Un asesor revisará su caso y le enviará la propuesta definitiva.";

/// Case complexity as labelled by the model. Unknown labels are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Complexity {
    Low,
    Medium,
    High,
    Other(String),
}

impl Complexity {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "baja" | "low" => Self::Low,
            "media" | "medium" => Self::Medium,
            "alta" | "high" => Self::High,
            _ => Self::Other(label.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Low => "Baja",
            Self::Medium => "Media",
            Self::High => "Alta",
            Self::Other(label) => label,
        }
    }
}

impl Serialize for Complexity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisResult {
    pub complexity: Complexity,
    pub price_adjustment_pct: Decimal,
    pub additional_services: Vec<String>,
    pub proposal_text: String,
}

impl AnalysisResult {
    /// Medium complexity, no surcharge, no extra services.
    pub fn fallback(proposal_text: impl Into<String>) -> Self {
        Self {
            complexity: Complexity::Medium,
            price_adjustment_pct: Decimal::ZERO,
            additional_services: Vec::new(),
            proposal_text: proposal_text.into(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("invalid analysis input: {0}")]
    InvalidInput(String),
    #[error("language model unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("language model response could not be interpreted: {0}")]
    UnparseableResponse(String),
}

impl AnalysisError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "entrada_invalida",
            Self::UpstreamUnavailable(_) => "servicio_no_disponible",
            Self::UnparseableResponse(_) => "respuesta_no_interpretable",
        }
    }

    /// Client-safe description; the variant payload stays in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "La descripción del caso está vacía.",
            Self::UpstreamUnavailable(_) => "El servicio de análisis no está disponible.",
            Self::UnparseableResponse(_) => "La respuesta del análisis no pudo interpretarse.",
        }
    }
}

/// Outcome of analysing a case: a concrete model result, or a default result
/// together with the reason the model result is missing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaseAnalysis {
    Completed(AnalysisResult),
    Degraded { fallback: AnalysisResult, error: AnalysisError },
}

impl CaseAnalysis {
    pub fn degraded(error: AnalysisError, proposal_text: impl Into<String>) -> Self {
        Self::Degraded { fallback: AnalysisResult::fallback(proposal_text), error }
    }

    pub fn result(&self) -> &AnalysisResult {
        match self {
            Self::Completed(result) | Self::Degraded { fallback: result, .. } => result,
        }
    }

    pub fn error(&self) -> Option<&AnalysisError> {
        match self {
            Self::Completed(_) => None,
            Self::Degraded { error, .. } => Some(error),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn price_adjustment_pct(&self) -> Decimal {
        self.result().price_adjustment_pct
    }
}
