pub mod quotation;
pub mod specification;
