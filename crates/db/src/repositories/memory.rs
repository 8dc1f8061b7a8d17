use tokio::sync::RwLock;

use cotizador_core::domain::quotation::{NewQuotation, Quotation, QuotationId};

use super::{QuotationRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryQuotationRepository {
    quotations: RwLock<Vec<Quotation>>,
}

#[async_trait::async_trait]
impl QuotationRepository for InMemoryQuotationRepository {
    async fn append(&self, quotation: NewQuotation) -> Result<Quotation, RepositoryError> {
        let mut quotations = self.quotations.write().await;
        if quotations.iter().any(|stored| stored.quotation_number == quotation.quotation_number) {
            return Err(RepositoryError::DuplicateQuotationNumber(quotation.quotation_number));
        }

        let id = QuotationId(quotations.len() as i64 + 1);
        let stored = quotation.into_stored(id);
        quotations.push(stored.clone());
        Ok(stored)
    }

    async fn list_all(&self) -> Result<Vec<Quotation>, RepositoryError> {
        let quotations = self.quotations.read().await;
        let mut listed = quotations.clone();
        listed.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| right.id.cmp(&left.id))
        });
        Ok(listed)
    }
}
