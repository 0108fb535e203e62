pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use cpq::extraction::{SpecificationExtractor, DEFAULT_MARKER};
pub use cpq::format::CurrencyFormatter;
pub use cpq::pricing::{DeterministicCalculator, QuotationCalculator};
pub use cpq::response::{ContactLink, ResponseAssembler};
pub use cpq::rules::{RuleSet, RuleSetError};
pub use cpq::{EngineReply, QuotationEngine};
pub use domain::quotation::{CostBreakdown, PricingTraceStep, QuotationResult};
pub use domain::specification::{ProductFamily, ProductSpecification};
pub use errors::{InterfaceError, QuotationError};
