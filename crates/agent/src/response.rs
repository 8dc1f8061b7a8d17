//! Strict parsing of the model's free-text reply into an [`AnalysisResult`].
//!
//! The reply is expected to contain one JSON object somewhere in its text. The
//! slice from the first `{` to the last `}` is handed to `serde_json`; nothing
//! in the reply is ever evaluated.

use std::str::FromStr;

use cotizador_core::domain::analysis::{AnalysisError, AnalysisResult, Complexity};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ModelAnalysis {
    #[serde(alias = "complexity")]
    complejidad: String,
    #[serde(alias = "price_adjustment")]
    ajuste_precio: Adjustment,
    #[serde(alias = "additional_services", default)]
    servicios_adicionales: Vec<String>,
    #[serde(alias = "proposal_text")]
    propuesta_texto: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Adjustment {
    Number(f64),
    Text(String),
}

impl Adjustment {
    fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Number(value) => Decimal::from_f64(*value),
            Self::Text(value) => Decimal::from_str(value.trim().trim_end_matches('%').trim()).ok(),
        }
    }
}

pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parses the reply; the adjustment is returned exactly as the model gave it.
pub fn parse_analysis(raw: &str) -> Result<AnalysisResult, AnalysisError> {
    let object = extract_json_object(raw).ok_or_else(|| {
        AnalysisError::UnparseableResponse("reply contains no JSON object".to_string())
    })?;

    let parsed: ModelAnalysis = serde_json::from_str(object)
        .map_err(|error| AnalysisError::UnparseableResponse(error.to_string()))?;

    let price_adjustment_pct = parsed.ajuste_precio.to_decimal().ok_or_else(|| {
        AnalysisError::UnparseableResponse(format!(
            "ajuste_precio is not numeric: {:?}",
            parsed.ajuste_precio
        ))
    })?;

    Ok(AnalysisResult {
        complexity: Complexity::from_label(&parsed.complejidad),
        price_adjustment_pct,
        additional_services: parsed
            .servicios_adicionales
            .into_iter()
            .map(|service| service.trim().to_string())
            .filter(|service| !service.is_empty())
            .collect(),
        proposal_text: parsed.propuesta_texto.trim().to_string(),
    })
}
