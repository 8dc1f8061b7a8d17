use chrono::NaiveDateTime;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sqlx::Row;

use cotizador_core::domain::quotation::{
    NewQuotation, Quotation, QuotationId, QuotationNumber, CREATED_AT_FORMAT,
};

use super::{QuotationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlQuotationRepository {
    pool: DbPool,
}

impl SqlQuotationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn row_to_quotation(row: &sqlx::sqlite::SqliteRow) -> Result<Quotation, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let quotation_number: String = row.try_get("numero_cotizacion").map_err(decode_error)?;
    let client_name: String = row.try_get("nombre_cliente").map_err(decode_error)?;
    let client_email: String = row.try_get("email").map_err(decode_error)?;
    let service_type: String = row.try_get("tipo_servicio").map_err(decode_error)?;
    let description: Option<String> = row.try_get("descripcion").map_err(decode_error)?;
    let price: f64 = row.try_get("precio").map_err(decode_error)?;
    let created_at: String = row.try_get("fecha").map_err(decode_error)?;

    let price = Decimal::from_f64(price)
        .map(|value| value.round_dp(2))
        .ok_or_else(|| RepositoryError::Decode(format!("invalid price `{price}` for id {id}")))?;
    let created_at = NaiveDateTime::parse_from_str(&created_at, CREATED_AT_FORMAT).map_err(
        |error| RepositoryError::Decode(format!("invalid fecha `{created_at}` for id {id}: {error}")),
    )?;

    Ok(Quotation {
        id: QuotationId(id),
        quotation_number: QuotationNumber(quotation_number),
        client_name,
        client_email,
        service_type,
        description: description.unwrap_or_default(),
        price,
        created_at,
    })
}

#[async_trait::async_trait]
impl QuotationRepository for SqlQuotationRepository {
    async fn append(&self, quotation: NewQuotation) -> Result<Quotation, RepositoryError> {
        let price = quotation.price.to_f64().ok_or_else(|| {
            RepositoryError::Decode(format!("price `{}` is not representable", quotation.price))
        })?;

        let result = sqlx::query(
            "INSERT INTO cotizaciones
                (numero_cotizacion, nombre_cliente, email, tipo_servicio, descripcion, precio, fecha)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(quotation.quotation_number.as_str())
        .bind(&quotation.client_name)
        .bind(&quotation.client_email)
        .bind(&quotation.service_type)
        .bind(&quotation.description)
        .bind(price)
        .bind(quotation.created_at.format(CREATED_AT_FORMAT).to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(quotation.into_stored(QuotationId(done.last_insert_rowid()))),
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                Err(RepositoryError::DuplicateQuotationNumber(quotation.quotation_number))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn list_all(&self) -> Result<Vec<Quotation>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, numero_cotizacion, nombre_cliente, email, tipo_servicio, descripcion,
                    precio, fecha
             FROM cotizaciones
             ORDER BY fecha DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_quotation).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use rust_decimal::Decimal;

    use cotizador_core::domain::quotation::{NewQuotation, QuotationNumber};

    use super::SqlQuotationRepository;
    use crate::repositories::{QuotationRepository, RepositoryError};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 4)
            .and_then(|date| date.and_hms_opt(10, 0, 0))
            .expect("valid timestamp")
    }

    fn quotation(number: &str, price: Decimal, created_at: NaiveDateTime) -> NewQuotation {
        NewQuotation {
            quotation_number: QuotationNumber(number.to_string()),
            client_name: "María López".to_string(),
            client_email: "maria@example.com".to_string(),
            service_type: "Defensa laboral".to_string(),
            description: "Despido injustificado tras doce años de servicio".to_string(),
            price,
            created_at,
        }
    }

    #[tokio::test]
    async fn append_assigns_increasing_ids() {
        let repo = SqlQuotationRepository::new(setup().await);

        let first = repo
            .append(quotation("COT-2026-0001", Decimal::from(2000), base_time()))
            .await
            .expect("append first");
        let second = repo
            .append(quotation("COT-2026-0002", Decimal::from(2500), base_time()))
            .await
            .expect("append second");

        assert!(second.id > first.id);
        assert_eq!(first.price, Decimal::from(2000));
    }

    #[tokio::test]
    async fn list_all_returns_every_record_newest_first() {
        let repo = SqlQuotationRepository::new(setup().await);
        let offsets = [3_i64, 0, 7, 7, 1];

        for (index, minutes) in offsets.iter().enumerate() {
            repo.append(quotation(
                &format!("COT-2026-{index:04}"),
                Decimal::new(125_050, 2),
                base_time() + Duration::minutes(*minutes),
            ))
            .await
            .expect("append");
        }

        let stored = repo.list_all().await.expect("list");

        assert_eq!(stored.len(), offsets.len());
        assert!(stored.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));
        assert_eq!(stored[0].created_at, base_time() + Duration::minutes(7));
        // same-second records fall back to insertion order, newest first
        assert!(stored[0].id > stored[1].id);
        assert_eq!(stored[0].price, Decimal::new(125_050, 2));
    }

    #[tokio::test]
    async fn stored_record_round_trips_all_fields() {
        let repo = SqlQuotationRepository::new(setup().await);
        let appended = repo
            .append(quotation("COT-2026-ABCD", Decimal::new(187_550, 2), base_time()))
            .await
            .expect("append");

        let stored = repo.list_all().await.expect("list");

        assert_eq!(stored, vec![appended]);
    }

    #[tokio::test]
    async fn duplicate_quotation_numbers_are_rejected() {
        let repo = SqlQuotationRepository::new(setup().await);
        repo.append(quotation("COT-2026-BEEF", Decimal::from(800), base_time()))
            .await
            .expect("append first");

        let error = repo
            .append(quotation("COT-2026-BEEF", Decimal::from(800), base_time()))
            .await
            .expect_err("duplicate number should fail");

        assert!(matches!(
            error,
            RepositoryError::DuplicateQuotationNumber(ref number) if number.as_str() == "COT-2026-BEEF"
        ));
        assert_eq!(repo.list_all().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn list_all_on_empty_store_is_empty() {
        let repo = SqlQuotationRepository::new(setup().await);
        assert!(repo.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn closed_pool_surfaces_database_error() {
        let pool = setup().await;
        pool.close().await;
        let repo = SqlQuotationRepository::new(pool);

        let error = repo.list_all().await.expect_err("closed pool should fail");
        assert!(matches!(error, RepositoryError::Database(_)));
    }
}
