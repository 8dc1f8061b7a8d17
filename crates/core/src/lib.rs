pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;

pub use domain::analysis::{AnalysisError, AnalysisResult, CaseAnalysis, Complexity};
pub use domain::quotation::{NewQuotation, Quotation, QuotationId, QuotationNumber};
pub use errors::{ApplicationError, InterfaceError};
pub use pricing::PriceTable;
