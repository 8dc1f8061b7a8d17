use std::sync::Arc;

use cotizador_agent::{CaseAnalyzer, LlmError, OpenAiClient};
use cotizador_core::config::AppConfig;
use cotizador_db::{connect_with_settings, migrations, DbPool, SqlQuotationRepository};
use thiserror::Error;
use tracing::info;

use crate::quotation::QuotationBuilder;
use crate::routes::{init_templates, AppState};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("language model client could not be built: {0}")]
    LlmClient(#[source] LlmError),
}

/// Wires the service from an already validated configuration.
pub async fn bootstrap(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let client = OpenAiClient::from_config(&config.llm).map_err(BootstrapError::LlmClient)?;
    info!(
        event_name = "system.bootstrap.llm_configured",
        correlation_id = "bootstrap",
        endpoint = client.endpoint(),
        model = %config.llm.model,
        "language model client configured"
    );

    let store = Arc::new(SqlQuotationRepository::new(db_pool.clone()));
    let analyzer = Arc::new(CaseAnalyzer::from_config(Arc::new(client), &config.llm));
    let builder = QuotationBuilder::new(config.pricing.price_table(), analyzer, store.clone());
    let state = AppState::new(Arc::new(builder), store, init_templates());

    Ok(Application { config, db_pool, state })
}

#[cfg(test)]
mod tests {
    use cotizador_core::config::AppConfig;
    use tempfile::TempDir;

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn config(database_url: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = database_url.to_string();
        config.llm.api_key = "sk-test".to_string().into();
        config.llm.base_url = "http://127.0.0.1:9/v1".to_string();
        config
    }

    #[tokio::test]
    async fn bootstrap_creates_database_and_quotation_table() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("database.db");
        let url = format!("sqlite://{}", path.display());

        let app = bootstrap(config(&url)).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'cotizaciones'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 1);
        assert!(path.exists());
        assert_eq!(app.config.llm.base_url, "http://127.0.0.1:9/v1");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_reports_unreachable_database() {
        let dir = TempDir::new().expect("temp dir");
        let url = format!("sqlite://{}", dir.path().join("missing/nested/database.db").display());

        let result = bootstrap(config(&url)).await;

        assert!(matches!(result, Err(BootstrapError::DatabaseConnect(_))));
    }
}
