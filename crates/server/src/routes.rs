//! HTTP surface of the quotation service.
//!
//! - `GET  /`                    landing page with the request form
//! - `GET  /api/cotizaciones`    stored quotations, newest first
//! - `POST /generar-cotizacion`  price, analyse and store one quotation
//! - `GET  /static/*`            front-end assets

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use cotizador_core::domain::analysis::CaseAnalysis;
use cotizador_core::domain::quotation::Quotation;
use cotizador_core::errors::{ApplicationError, InterfaceError};
use cotizador_db::repositories::QuotationRepository;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use tera::{Context, Tera};
use tower_http::services::ServeDir;
use tracing::{error, warn};
use uuid::Uuid;

use crate::quotation::{BuiltQuotation, QuotationBuilder, QuotationRequest};

#[derive(Clone)]
pub struct AppState {
    builder: Arc<QuotationBuilder>,
    store: Arc<dyn QuotationRepository>,
    templates: Arc<Tera>,
}

impl AppState {
    pub fn new(
        builder: Arc<QuotationBuilder>,
        store: Arc<dyn QuotationRepository>,
        templates: Arc<Tera>,
    ) -> Self {
        Self { builder, store, templates }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuotationForm {
    #[serde(rename = "nombre_cliente")]
    pub client_name: String,
    #[serde(rename = "email")]
    pub client_email: String,
    #[serde(rename = "tipo_servicio")]
    pub service_type: String,
    #[serde(rename = "descripcion")]
    pub description: String,
}

impl From<QuotationForm> for QuotationRequest {
    fn from(form: QuotationForm) -> Self {
        Self {
            client_name: form.client_name,
            client_email: form.client_email,
            service_type: form.service_type,
            description: form.description,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuotationSummary {
    #[serde(rename = "numero_cotizacion")]
    pub quotation_number: String,
    #[serde(rename = "nombre_cliente")]
    pub client_name: String,
    #[serde(rename = "email")]
    pub client_email: String,
    #[serde(rename = "tipo_servicio")]
    pub service_type: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "precio", serialize_with = "serialize_amount")]
    pub price: Decimal,
    #[serde(rename = "fecha")]
    pub created_at: String,
}

impl From<Quotation> for QuotationSummary {
    fn from(quotation: Quotation) -> Self {
        let created_at = quotation.created_at_label();
        Self {
            quotation_number: quotation.quotation_number.0,
            client_name: quotation.client_name,
            client_email: quotation.client_email,
            service_type: quotation.service_type,
            description: quotation.description,
            price: quotation.price,
            created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysisErrorBody {
    #[serde(rename = "codigo")]
    pub code: &'static str,
    #[serde(rename = "mensaje")]
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AnalysisBody {
    #[serde(rename = "complejidad")]
    pub complexity: String,
    #[serde(rename = "ajuste_precio", serialize_with = "serialize_amount")]
    pub price_adjustment_pct: Decimal,
    #[serde(rename = "servicios_adicionales")]
    pub additional_services: Vec<String>,
    #[serde(rename = "propuesta_texto")]
    pub proposal_text: String,
    #[serde(rename = "estado")]
    pub status: &'static str,
    pub error: Option<AnalysisErrorBody>,
}

impl From<&CaseAnalysis> for AnalysisBody {
    fn from(analysis: &CaseAnalysis) -> Self {
        let result = analysis.result();
        Self {
            complexity: result.complexity.label().to_string(),
            price_adjustment_pct: result.price_adjustment_pct,
            additional_services: result.additional_services.clone(),
            proposal_text: result.proposal_text.clone(),
            status: if analysis.is_degraded() { "degradado" } else { "completo" },
            error: analysis
                .error()
                .map(|error| AnalysisErrorBody { code: error.code(), message: error.user_message() }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuotationReceipt {
    #[serde(rename = "numero_cotizacion")]
    pub quotation_number: String,
    #[serde(rename = "nombre_cliente")]
    pub client_name: String,
    #[serde(rename = "email")]
    pub client_email: String,
    #[serde(rename = "tipo_servicio")]
    pub service_type: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "precio_base", serialize_with = "serialize_amount")]
    pub base_price: Decimal,
    #[serde(rename = "precio_final", serialize_with = "serialize_amount")]
    pub final_price: Decimal,
    #[serde(rename = "fecha")]
    pub created_at: String,
    #[serde(rename = "analisis_ia")]
    pub analysis: AnalysisBody,
}

impl From<BuiltQuotation> for QuotationReceipt {
    fn from(built: BuiltQuotation) -> Self {
        let analysis = AnalysisBody::from(&built.analysis);
        let created_at = built.quotation.created_at_label();
        let quotation = built.quotation;
        Self {
            quotation_number: quotation.quotation_number.0,
            client_name: quotation.client_name,
            client_email: quotation.client_email,
            service_type: quotation.service_type,
            description: quotation.description,
            base_price: built.base_price,
            final_price: quotation.price,
            created_at,
            analysis,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub correlation_id: String,
}

pub struct ApiError(InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Integral amounts go out as JSON integers, fractional ones as floats.
fn serialize_amount<S: Serializer>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    use serde::ser::Error as _;

    if amount.fract().is_zero() {
        if let Some(whole) = amount.to_i64() {
            return serializer.serialize_i64(whole);
        }
    }
    match amount.to_f64() {
        Some(value) => serializer.serialize_f64(value),
        None => Err(S::Error::custom(format!("amount `{amount}` is not representable"))),
    }
}

fn correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Filesystem templates win; the embedded page covers a missing `templates/` dir.
pub fn init_templates() -> Arc<Tera> {
    let mut tera = match Tera::new("templates/**/*") {
        Ok(tera) => tera,
        Err(error) => {
            warn!(
                event_name = "system.templates.fallback",
                correlation_id = "bootstrap",
                error = %error,
                "failed to load templates from filesystem, using embedded templates"
            );
            Tera::default()
        }
    };

    if !tera.get_template_names().any(|name| name == "index.html") {
        register_embedded(&mut tera, "index.html", include_str!("../../../templates/index.html"));
    }

    Arc::new(tera)
}

/// Returns whether `source` parsed and was registered under `name`.
fn register_embedded(tera: &mut Tera, name: &str, source: &str) -> bool {
    match tera.add_raw_template(name, source) {
        Ok(()) => true,
        Err(error) => {
            error!(
                event_name = "system.templates.embedded_invalid",
                correlation_id = "bootstrap",
                template = name,
                error = ?error,
                "embedded template failed to parse"
            );
            false
        }
    }
}

pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/api/cotizaciones", get(list_quotations))
        .route("/generar-cotizacion", post(generate_quotation))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

async fn index_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let services = state
        .builder
        .prices()
        .services()
        .map(|(service, price)| {
            serde_json::json!({ "nombre": service, "precio": price.normalize().to_string() })
        })
        .collect::<Vec<_>>();

    let mut context = Context::new();
    context.insert("services", &services);

    let html = state.templates.render("index.html", &context).map_err(|e| {
        let correlation_id = correlation_id();
        error!(
            event_name = "http.index.template_failed",
            correlation_id = %correlation_id,
            error = ?e,
            "failed to render landing page"
        );
        ApiError(
            ApplicationError::Configuration(format!("landing page template: {e}"))
                .into_interface(correlation_id),
        )
    })?;

    Ok(Html(html))
}

async fn list_quotations(
    State(state): State<AppState>,
) -> Result<Json<Vec<QuotationSummary>>, ApiError> {
    let quotations = state.store.list_all().await.map_err(|e| {
        let correlation_id = correlation_id();
        error!(
            event_name = "http.quotations.list_failed",
            correlation_id = %correlation_id,
            error = %e,
            "failed to list quotations"
        );
        ApiError(ApplicationError::Persistence(e.to_string()).into_interface(correlation_id))
    })?;

    Ok(Json(quotations.into_iter().map(QuotationSummary::from).collect()))
}

async fn generate_quotation(
    State(state): State<AppState>,
    Form(form): Form<QuotationForm>,
) -> Result<Json<QuotationReceipt>, ApiError> {
    let built = state.builder.build(form.into()).await.map_err(|e| {
        let correlation_id = correlation_id();
        error!(
            event_name = "http.quotation.create_failed",
            correlation_id = %correlation_id,
            error = %e,
            "failed to create quotation"
        );
        ApiError(e.into_interface(correlation_id))
    })?;

    Ok(Json(built.into()))
}
