use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::specification::ProductFamily;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

impl PricingTraceStep {
    pub fn new(stage: &str, detail: impl Into<String>, amount: Decimal) -> Self {
        Self { stage: stage.to_string(), detail: detail.into(), amount }
    }
}

/// Unrounded calculator output. Amounts keep full precision until formatting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub family: ProductFamily,
    pub description: String,
    pub elaboration_cost: Decimal,
    pub suggested_sale_price: Decimal,
    pub disclaimer_required: bool,
    pub trace: Vec<PricingTraceStep>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationResult {
    pub family: ProductFamily,
    pub description: String,
    pub elaboration_cost: Decimal,
    pub suggested_sale_price: Decimal,
    pub formatted_cost: String,
    pub formatted_price: String,
    pub disclaimer_required: bool,
    pub trace: Vec<PricingTraceStep>,
}
