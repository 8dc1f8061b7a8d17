use std::sync::Arc;

use cotizador_core::config::LlmConfig;
use cotizador_core::domain::analysis::{
    AnalysisError, CaseAnalysis, PLACEHOLDER_PROPOSAL, UNAVAILABLE_PROPOSAL,
};
use cotizador_core::pricing::clamp_adjustment;
use tracing::{info, warn};

use crate::llm::{CompletionRequest, LlmClient};
use crate::response::parse_analysis;

pub const SYSTEM_PROMPT: &str =
    "Eres un asistente legal que genera cotizaciones profesionales.";

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 500;

pub struct CaseAnalyzer {
    client: Arc<dyn LlmClient>,
    temperature: f32,
    max_tokens: u32,
}

impl CaseAnalyzer {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client, temperature: DEFAULT_TEMPERATURE, max_tokens: DEFAULT_MAX_TOKENS }
    }

    pub fn from_config(client: Arc<dyn LlmClient>, config: &LlmConfig) -> Self {
        Self { client, temperature: config.temperature, max_tokens: config.max_tokens }
    }

    /// Asks the model to assess the case. Never fails: every problem becomes a
    /// [`CaseAnalysis::Degraded`] carrying the reason.
    pub async fn analyze(&self, description: &str, service_type: &str) -> CaseAnalysis {
        if description.trim().is_empty() {
            warn!(
                event_name = "analysis.input.rejected",
                service_type = %service_type,
                "case description is empty, skipping language model"
            );
            return CaseAnalysis::degraded(
                AnalysisError::InvalidInput("case description is empty".to_string()),
                UNAVAILABLE_PROPOSAL,
            );
        }

        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_prompt(description, service_type),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let reply = match self.client.complete(&request).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(
                    event_name = "analysis.upstream.failed",
                    service_type = %service_type,
                    error = %error,
                    "language model call failed, using default analysis"
                );
                return CaseAnalysis::degraded(
                    AnalysisError::UpstreamUnavailable(error.to_string()),
                    UNAVAILABLE_PROPOSAL,
                );
            }
        };

        match parse_analysis(&reply) {
            Ok(mut result) => {
                let proposed = result.price_adjustment_pct;
                result.price_adjustment_pct = clamp_adjustment(proposed);
                if result.price_adjustment_pct != proposed {
                    warn!(
                        event_name = "analysis.adjustment.clamped",
                        proposed = %proposed,
                        applied = %result.price_adjustment_pct,
                        "model proposed an adjustment outside the supported range"
                    );
                }
                info!(
                    event_name = "analysis.completed",
                    service_type = %service_type,
                    complexity = result.complexity.label(),
                    adjustment_pct = %result.price_adjustment_pct,
                    "case analysis completed"
                );
                CaseAnalysis::Completed(result)
            }
            Err(error) => {
                warn!(
                    event_name = "analysis.response.unparseable",
                    service_type = %service_type,
                    error = %error,
                    "language model reply could not be parsed, using default analysis"
                );
                let raw = reply.trim();
                let proposal = if raw.is_empty() { PLACEHOLDER_PROPOSAL } else { raw };
                CaseAnalysis::degraded(error, proposal)
            }
        }
    }
}

pub fn build_prompt(description: &str, service_type: &str) -> String {
    format!(
        r#"Eres un experto en servicios legales. Analiza este caso:

**Tipo de Servicio**: {service_type}
**Descripción del Caso**: {description}

Responde únicamente con un objeto JSON con exactamente estas claves:
1. "complejidad" (Baja/Media/Alta)
2. "ajuste_precio" (0, 25 o 50)
3. "servicios_adicionales" (lista de textos)
4. "propuesta_texto" (2-3 párrafos profesionales)

La propuesta debe incluir:
- Servicios incluidos
- Tiempo estimado
- Condiciones básicas"#
    )
}
