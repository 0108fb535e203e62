pub mod extraction;
pub mod format;
pub mod pricing;
pub mod response;
pub mod rules;

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::quotation::QuotationResult;
use crate::domain::specification::ProductSpecification;
use crate::errors::QuotationError;

use self::{
    extraction::SpecificationExtractor,
    format::CurrencyFormatter,
    pricing::{DeterministicCalculator, QuotationCalculator},
    response::{ContactLink, ResponseAssembler},
    rules::RuleSet,
};

/// What the engine hands back to the conversational layer for one assistant message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineReply {
    /// No marker: the assistant is still interviewing the user.
    Passthrough(String),
    Quotation { result: QuotationResult, text: String },
    /// Marker present but the payload could not be priced.
    Fallback { error: QuotationError, text: String },
}

impl EngineReply {
    pub fn text(&self) -> &str {
        match self {
            Self::Passthrough(text)
            | Self::Quotation { text, .. }
            | Self::Fallback { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Passthrough(text)
            | Self::Quotation { text, .. }
            | Self::Fallback { text, .. } => text,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Passthrough(_) => "passthrough",
            Self::Quotation { .. } => "quotation",
            Self::Fallback { .. } => "fallback",
        }
    }
}

pub struct QuotationEngine<C = DeterministicCalculator> {
    rules: Arc<RuleSet>,
    extractor: SpecificationExtractor,
    calculator: C,
    formatter: CurrencyFormatter,
    assembler: ResponseAssembler,
}

impl QuotationEngine<DeterministicCalculator> {
    pub fn new(
        rules: Arc<RuleSet>,
        extractor: SpecificationExtractor,
        formatter: CurrencyFormatter,
        contact: Option<ContactLink>,
    ) -> Self {
        Self::with_calculator(rules, extractor, DeterministicCalculator, formatter, contact)
    }
}

impl Default for QuotationEngine<DeterministicCalculator> {
    fn default() -> Self {
        Self::new(
            Arc::new(RuleSet::default()),
            SpecificationExtractor::default(),
            CurrencyFormatter::default(),
            None,
        )
    }
}

impl<C> QuotationEngine<C>
where
    C: QuotationCalculator,
{
    pub fn with_calculator(
        rules: Arc<RuleSet>,
        extractor: SpecificationExtractor,
        calculator: C,
        formatter: CurrencyFormatter,
        contact: Option<ContactLink>,
    ) -> Self {
        Self { rules, extractor, calculator, formatter, assembler: ResponseAssembler::new(contact) }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn extractor(&self) -> &SpecificationExtractor {
        &self.extractor
    }

    pub fn assembler(&self) -> &ResponseAssembler {
        &self.assembler
    }

    /// Prices an already validated specification and formats both amounts.
    pub fn quote(&self, spec: &ProductSpecification) -> Result<QuotationResult, QuotationError> {
        let breakdown = self.calculator.calculate(spec, &self.rules)?;

        Ok(QuotationResult {
            family: breakdown.family,
            formatted_cost: self.formatter.format(breakdown.elaboration_cost),
            formatted_price: self.formatter.format(breakdown.suggested_sale_price),
            description: breakdown.description,
            elaboration_cost: breakdown.elaboration_cost,
            suggested_sale_price: breakdown.suggested_sale_price,
            disclaimer_required: breakdown.disclaimer_required,
            trace: breakdown.trace,
        })
    }

    /// Turns one raw assistant message into the text shown to the user. Never fails.
    pub fn respond(&self, raw: &str, correlation_id: &str) -> EngineReply {
        let Some(embedded) = self.extractor.locate(raw) else {
            return EngineReply::Passthrough(raw.to_string());
        };

        let quoted = self
            .extractor
            .parse(embedded.payload)
            .and_then(|specification| self.quote(&specification));

        match quoted {
            Ok(result) => {
                info!(
                    event_name = "quotation.priced",
                    correlation_id = %correlation_id,
                    family = result.family.as_str(),
                    elaboration_cost = %result.elaboration_cost,
                    suggested_sale_price = %result.suggested_sale_price,
                    disclaimer_required = result.disclaimer_required,
                    "quotation priced"
                );
                let text = self.assembler.quotation(embedded.preamble, &result);
                EngineReply::Quotation { result, text }
            }
            Err(error) => {
                warn!(
                    event_name = "quotation.extraction.failed",
                    correlation_id = %correlation_id,
                    reason_code = error.reason_code(),
                    error = %error,
                    "could not price embedded payload, answering with fallback"
                );
                let text = self.assembler.payload_failure(&error);
                EngineReply::Fallback { error, text }
            }
        }
    }
}
