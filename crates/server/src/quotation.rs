use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDateTime};
use cotizador_agent::CaseAnalyzer;
use cotizador_core::domain::analysis::CaseAnalysis;
use cotizador_core::domain::quotation::{NewQuotation, Quotation, QuotationNumber};
use cotizador_core::errors::ApplicationError;
use cotizador_core::pricing::{adjusted_price, PriceTable};
use cotizador_db::repositories::{QuotationRepository, RepositoryError};
use rust_decimal::Decimal;
use tracing::{info, warn};

const MAX_NUMBER_ATTEMPTS: u32 = 5;

/// Client fields of a quotation request, as submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuotationRequest {
    pub client_name: String,
    pub client_email: String,
    pub service_type: String,
    pub description: String,
}

/// A stored quotation together with the inputs that priced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltQuotation {
    pub quotation: Quotation,
    pub base_price: Decimal,
    pub analysis: CaseAnalysis,
}

pub struct QuotationBuilder {
    prices: PriceTable,
    analyzer: Arc<CaseAnalyzer>,
    store: Arc<dyn QuotationRepository>,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl QuotationBuilder {
    pub fn new(
        prices: PriceTable,
        analyzer: Arc<CaseAnalyzer>,
        store: Arc<dyn QuotationRepository>,
    ) -> Self {
        Self { prices, analyzer, store, clock: local_now }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    pub async fn build(&self, request: QuotationRequest) -> Result<BuiltQuotation, ApplicationError> {
        let base_price = self.prices.base_price(&request.service_type);
        if !self.prices.is_known(&request.service_type) {
            warn!(
                event_name = "quotation.service.unpriced",
                service_type = %request.service_type,
                "service type is not in the price table, base price is zero"
            );
        }

        let analysis = self.analyzer.analyze(&request.description, &request.service_type).await;
        let price = adjusted_price(base_price, analysis.price_adjustment_pct());

        let now = (self.clock)();
        let draft = NewQuotation {
            quotation_number: QuotationNumber::generate(now.year()),
            client_name: request.client_name,
            client_email: request.client_email,
            service_type: request.service_type,
            description: request.description,
            price,
            created_at: now,
        }
        .stamped(now);

        let quotation = self.persist(draft).await?;
        info!(
            event_name = "quotation.created",
            correlation_id = %quotation.quotation_number,
            service_type = %quotation.service_type,
            base_price = %base_price,
            price = %quotation.price,
            analysis_degraded = analysis.is_degraded(),
            "quotation created"
        );

        Ok(BuiltQuotation { quotation, base_price, analysis })
    }

    /// Regenerates the number on collisions and retries other storage failures once.
    async fn persist(&self, mut draft: NewQuotation) -> Result<Quotation, ApplicationError> {
        let mut number_attempts = 1;
        let mut storage_retried = false;

        loop {
            match self.store.append(draft.clone()).await {
                Ok(quotation) => return Ok(quotation),
                Err(RepositoryError::DuplicateQuotationNumber(number)) => {
                    if number_attempts >= MAX_NUMBER_ATTEMPTS {
                        return Err(ApplicationError::QuotationNumberExhausted {
                            attempts: number_attempts,
                        });
                    }
                    number_attempts += 1;
                    warn!(
                        event_name = "quotation.number.collision",
                        correlation_id = %number,
                        attempt = number_attempts,
                        "quotation number already taken, generating another"
                    );
                    let year = draft.created_at.year();
                    draft = draft.with_number(QuotationNumber::generate(year));
                }
                Err(error) if !storage_retried => {
                    storage_retried = true;
                    warn!(
                        event_name = "quotation.store.retry",
                        correlation_id = %draft.quotation_number,
                        error = %error,
                        "storing quotation failed, retrying once"
                    );
                }
                Err(error) => return Err(ApplicationError::Persistence(error.to_string())),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use cotizador_agent::{CaseAnalyzer, CompletionRequest, LlmClient, LlmError};
    use cotizador_core::domain::analysis::{AnalysisError, Complexity};
    use cotizador_core::domain::quotation::{NewQuotation, Quotation, QuotationId};
    use cotizador_core::errors::ApplicationError;
    use cotizador_core::pricing::PriceTable;
    use cotizador_db::repositories::{
        InMemoryQuotationRepository, QuotationRepository, RepositoryError,
    };
    use rust_decimal::Decimal;

    use super::{QuotationBuilder, QuotationRequest};

    /// Replies with a fixed text, or fails when constructed with `None`.
    pub(crate) struct FixedReplyClient {
        reply: Option<String>,
        calls: AtomicUsize,
    }

    impl FixedReplyClient {
        pub(crate) fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self { reply: Some(reply.to_string()), calls: AtomicUsize::new(0) })
        }

        pub(crate) fn failing() -> Arc<Self> {
            Arc::new(Self { reply: None, calls: AtomicUsize::new(0) })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for FixedReplyClient {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .ok_or_else(|| LlmError::Status { status: 503, body: "overloaded".to_string() })
        }
    }

    pub(crate) fn reply_with_adjustment(adjustment: u32) -> String {
        format!(
            r#"{{"complejidad": "Media", "ajuste_precio": {adjustment}, "servicios_adicionales": ["Seguimiento"], "propuesta_texto": "Propuesta."}}"#
        )
    }

    /// Fails the first `failures` appends with a storage error, or duplicates.
    struct FlakyStore {
        inner: InMemoryQuotationRepository,
        failures: Mutex<VecDeque<RepositoryError>>,
        attempts: AtomicUsize,
    }

    impl FlakyStore {
        fn failing_with(failures: Vec<RepositoryError>) -> Arc<Self> {
            Arc::new(Self {
                inner: InMemoryQuotationRepository::default(),
                failures: Mutex::new(failures.into()),
                attempts: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl QuotationRepository for FlakyStore {
        async fn append(&self, quotation: NewQuotation) -> Result<Quotation, RepositoryError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let failure = self.failures.lock().expect("failures lock").pop_front();
            match failure {
                Some(error) => Err(error),
                None => self.inner.append(quotation).await,
            }
        }

        async fn list_all(&self) -> Result<Vec<Quotation>, RepositoryError> {
            self.inner.list_all().await
        }
    }

    fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .and_then(|date| date.and_hms_milli_opt(11, 42, 7, 250))
            .expect("valid timestamp")
    }

    fn builder(client: Arc<dyn LlmClient>, store: Arc<dyn QuotationRepository>) -> QuotationBuilder {
        QuotationBuilder::new(PriceTable::default(), Arc::new(CaseAnalyzer::new(client)), store)
            .with_clock(fixed_clock)
    }

    fn request(service_type: &str, description: &str) -> QuotationRequest {
        QuotationRequest {
            client_name: "Carla Ruiz".to_string(),
            client_email: "carla@example.com".to_string(),
            service_type: service_type.to_string(),
            description: description.to_string(),
        }
    }

    #[tokio::test]
    async fn known_service_without_adjustment_keeps_base_price() {
        let store = Arc::new(InMemoryQuotationRepository::default());
        for (service, base) in PriceTable::default().services() {
            let builder =
                builder(FixedReplyClient::replying(&reply_with_adjustment(0)), store.clone());
            let built = builder.build(request(service, "Caso estándar")).await.expect("build");

            assert_eq!(built.base_price, base);
            assert_eq!(built.quotation.price, base);
        }
    }

    #[tokio::test]
    async fn standard_adjustments_scale_the_final_price() {
        for (adjustment, expected) in [(0, 2000), (25, 2500), (50, 3000)] {
            let builder = builder(
                FixedReplyClient::replying(&reply_with_adjustment(adjustment)),
                Arc::new(InMemoryQuotationRepository::default()),
            );

            let built =
                builder.build(request("Defensa laboral", "Despido")).await.expect("build");

            assert_eq!(built.base_price, Decimal::from(2000));
            assert_eq!(built.quotation.price, Decimal::from(expected));
        }
    }

    #[tokio::test]
    async fn unknown_service_is_priced_at_zero_for_any_adjustment() {
        for adjustment in [0, 25, 50] {
            let builder = builder(
                FixedReplyClient::replying(&reply_with_adjustment(adjustment)),
                Arc::new(InMemoryQuotationRepository::default()),
            );

            let built = builder.build(request("Mediación", "Conflicto vecinal")).await.expect("build");

            assert_eq!(built.base_price, Decimal::ZERO);
            assert_eq!(built.quotation.price, Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn whitespace_description_skips_the_model() {
        let client = FixedReplyClient::replying(&reply_with_adjustment(50));
        let builder = builder(client.clone(), Arc::new(InMemoryQuotationRepository::default()));

        let built = builder.build(request("Defensa laboral", "   ")).await.expect("build");

        assert_eq!(client.calls(), 0);
        assert_eq!(built.analysis.result().complexity, Complexity::Medium);
        assert_eq!(built.analysis.price_adjustment_pct(), Decimal::ZERO);
        assert!(matches!(built.analysis.error(), Some(AnalysisError::InvalidInput(_))));
        assert_eq!(built.quotation.price, Decimal::from(2000));
    }

    #[tokio::test]
    async fn upstream_failure_still_produces_a_stored_quotation() {
        let store = Arc::new(InMemoryQuotationRepository::default());
        let builder = builder(FixedReplyClient::failing(), store.clone());

        let built = builder.build(request("Consultoría tributaria", "IVA")).await.expect("build");

        assert!(built.analysis.is_degraded());
        assert_eq!(built.quotation.price, Decimal::from(800));
        assert_eq!(store.list_all().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn record_is_stamped_and_numbered_for_the_current_year() {
        let builder = builder(
            FixedReplyClient::replying(&reply_with_adjustment(0)),
            Arc::new(InMemoryQuotationRepository::default()),
        );

        let built = builder.build(request("Defensa laboral", "Despido")).await.expect("build");

        assert_eq!(built.quotation.id, QuotationId(1));
        assert_eq!(built.quotation.created_at_label(), "2026-10-18 11:42:07");
        assert!(built.quotation.quotation_number.as_str().starts_with("COT-2026-"));
        assert_eq!(built.quotation.client_name, "Carla Ruiz");
        assert_eq!(built.quotation.description, "Despido");
    }

    #[tokio::test]
    async fn number_collision_regenerates_the_number() {
        let taken = cotizador_core::QuotationNumber("COT-2026-AAAA".to_string());
        let store = FlakyStore::failing_with(vec![RepositoryError::DuplicateQuotationNumber(taken)]);
        let builder = builder(FixedReplyClient::replying(&reply_with_adjustment(0)), store.clone());

        let built = builder.build(request("Defensa laboral", "Despido")).await.expect("build");

        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(store.list_all().await.expect("list"), vec![built.quotation]);
    }

    #[tokio::test]
    async fn persistent_collisions_exhaust_the_number_space() {
        let failures = (0..5)
            .map(|_| {
                RepositoryError::DuplicateQuotationNumber(cotizador_core::QuotationNumber(
                    "COT-2026-AAAA".to_string(),
                ))
            })
            .collect();
        let store = FlakyStore::failing_with(failures);
        let builder = builder(FixedReplyClient::replying(&reply_with_adjustment(0)), store.clone());

        let error = builder.build(request("Defensa laboral", "Despido")).await.expect_err("fail");

        assert_eq!(error, ApplicationError::QuotationNumberExhausted { attempts: 5 });
        assert_eq!(store.attempts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn storage_failure_is_retried_once() {
        let store =
            FlakyStore::failing_with(vec![RepositoryError::Decode("disk hiccup".to_string())]);
        let builder = builder(FixedReplyClient::replying(&reply_with_adjustment(0)), store.clone());

        builder.build(request("Defensa laboral", "Despido")).await.expect("retry succeeds");

        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repeated_storage_failure_surfaces_persistence_error() {
        let store = FlakyStore::failing_with(vec![
            RepositoryError::Decode("disk full".to_string()),
            RepositoryError::Decode("disk full".to_string()),
        ]);
        let builder = builder(FixedReplyClient::replying(&reply_with_adjustment(0)), store.clone());

        let error = builder.build(request("Defensa laboral", "Despido")).await.expect_err("fail");

        assert!(matches!(error, ApplicationError::Persistence(ref message) if message.contains("disk full")));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
        assert!(store.list_all().await.expect("list").is_empty());
    }
}
