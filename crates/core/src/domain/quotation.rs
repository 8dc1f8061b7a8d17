use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage format of `created_at`; lexicographic order matches chronological order.
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub i64);

/// Client-facing quotation number, `COT-<year>-<4 hex chars>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotationNumber(pub String);

impl QuotationNumber {
    pub const PREFIX: &'static str = "COT";
    const SUFFIX_LEN: usize = 4;

    pub fn generate(year: i32) -> Self {
        let random = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        Self(format!("{}-{year}-{}", Self::PREFIX, &random[..Self::SUFFIX_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuotationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A quotation that has been priced but not yet stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewQuotation {
    pub quotation_number: QuotationNumber,
    pub client_name: String,
    pub client_email: String,
    pub service_type: String,
    pub description: String,
    pub price: Decimal,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quotation {
    pub id: QuotationId,
    pub quotation_number: QuotationNumber,
    pub client_name: String,
    pub client_email: String,
    pub service_type: String,
    pub description: String,
    pub price: Decimal,
    pub created_at: NaiveDateTime,
}

impl NewQuotation {
    /// Truncates `created_at` to whole seconds, the precision the store keeps.
    pub fn stamped(mut self, now: NaiveDateTime) -> Self {
        self.created_at = now.with_nanosecond(0).unwrap_or(now);
        self
    }

    pub fn with_number(mut self, quotation_number: QuotationNumber) -> Self {
        self.quotation_number = quotation_number;
        self
    }

    pub fn into_stored(self, id: QuotationId) -> Quotation {
        Quotation {
            id,
            quotation_number: self.quotation_number,
            client_name: self.client_name,
            client_email: self.client_email,
            service_type: self.service_type,
            description: self.description,
            price: self.price,
            created_at: self.created_at,
        }
    }
}

impl Quotation {
    pub fn created_at_label(&self) -> String {
        self.created_at.format(CREATED_AT_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{NewQuotation, QuotationId, QuotationNumber};

    #[test]
    fn generated_numbers_carry_year_and_short_suffix() {
        let number = QuotationNumber::generate(2026);
        let parts = number.as_str().split('-').collect::<Vec<_>>();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "COT");
        assert_eq!(parts[1], "2026");
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_lowercase()));
    }

    #[test]
    fn stamping_truncates_to_seconds() {
        let now = NaiveDate::from_ymd_opt(2026, 3, 14)
            .and_then(|date| date.and_hms_milli_opt(9, 26, 53, 589))
            .expect("valid timestamp");
        let quotation = NewQuotation {
            quotation_number: QuotationNumber("COT-2026-0A1B".to_string()),
            client_name: "Ana Pérez".to_string(),
            client_email: "ana@example.com".to_string(),
            service_type: "Defensa laboral".to_string(),
            description: "Despido sin causa".to_string(),
            price: Decimal::from(2000),
            created_at: now,
        }
        .stamped(now)
        .into_stored(QuotationId(7));

        assert_eq!(quotation.created_at_label(), "2026-03-14 09:26:53");
        assert_eq!(quotation.id, QuotationId(7));
    }
}
