pub mod analysis;
pub mod quotation;
