use async_trait::async_trait;
use thiserror::Error;

use cotizador_core::domain::quotation::{NewQuotation, Quotation, QuotationNumber};

pub mod memory;
pub mod quotation;

pub use memory::InMemoryQuotationRepository;
pub use quotation::SqlQuotationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("quotation number `{0}` is already taken")]
    DuplicateQuotationNumber(QuotationNumber),
}

/// Append-only store of quotations.
#[async_trait]
pub trait QuotationRepository: Send + Sync {
    /// Inserts one quotation atomically and returns it with its storage id.
    async fn append(&self, quotation: NewQuotation) -> Result<Quotation, RepositoryError>;

    /// All quotations, newest first.
    async fn list_all(&self) -> Result<Vec<Quotation>, RepositoryError>;
}
