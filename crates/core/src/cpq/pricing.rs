use rust_decimal::{Decimal, MathematicalOps};

use crate::cpq::rules::RuleSet;
use crate::domain::quotation::{CostBreakdown, PricingTraceStep};
use crate::domain::specification::{
    Complexity, ExperimentalMaterial, ExperimentalSpec, MoldSpec, MoldSubtype, MoldThickness,
    PanMoldSpec, PanShape, ProductSpecification, RodsOrPlatesSpec, SheetKind, SheetThickness,
};
use crate::errors::QuotationError;

pub trait QuotationCalculator: Send + Sync {
    fn calculate(
        &self,
        spec: &ProductSpecification,
        rules: &RuleSet,
    ) -> Result<CostBreakdown, QuotationError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicCalculator;

impl QuotationCalculator for DeterministicCalculator {
    fn calculate(
        &self,
        spec: &ProductSpecification,
        rules: &RuleSet,
    ) -> Result<CostBreakdown, QuotationError> {
        calculate(spec, rules)
    }
}

/// Prices a specification. Amounts are never rounded here; see `cpq::format`.
pub fn calculate(
    spec: &ProductSpecification,
    rules: &RuleSet,
) -> Result<CostBreakdown, QuotationError> {
    spec.validate()?;

    let mut trace = Vec::new();
    let elaboration_cost = match spec {
        ProductSpecification::Mold(mold) => price_mold(mold, rules, &mut trace)?,
        ProductSpecification::PanMold(pan) => price_pan_mold(pan, rules, &mut trace)?,
        ProductSpecification::RodsOrPlates(sheet) => {
            price_rods_or_plates(sheet, rules, &mut trace)?
        }
        ProductSpecification::Experimental(piece) => {
            price_experimental(piece, rules, &mut trace)?
        }
    };

    let suggested_sale_price = mul(elaboration_cost, rules.sale_margin)?;
    trace.push(PricingTraceStep::new(
        "sale_margin",
        format!("elaboration_cost * {}", rules.sale_margin),
        suggested_sale_price,
    ));

    Ok(CostBreakdown {
        family: spec.family(),
        description: spec.describe(),
        elaboration_cost,
        suggested_sale_price,
        disclaimer_required: matches!(spec, ProductSpecification::Experimental(_)),
        trace,
    })
}

fn price_mold(
    spec: &MoldSpec,
    rules: &RuleSet,
    trace: &mut Vec<PricingTraceStep>,
) -> Result<Decimal, QuotationError> {
    let mold = &rules.mold;

    let base = match spec.subtype {
        MoldSubtype::Removable => mold.removable_base,
        MoldSubtype::Fixed => mold.fixed_base,
    };
    trace.push(PricingTraceStep::new("base", format!("{} mold", spec.subtype.label()), base));

    let area = mul(spec.length, spec.width)?;
    let excess_area = (area - mold.area_threshold).max(Decimal::ZERO);
    let area_adjustment = mul(excess_area, mold.area_rate)?;
    trace.push(PricingTraceStep::new(
        "area_adjustment",
        format!("max(0, {area} - {}) * {}", mold.area_threshold, mold.area_rate),
        area_adjustment,
    ));

    let division_count =
        u64::from(spec.divisions_along_length) + u64::from(spec.divisions_along_width);
    let divisions = mul(Decimal::from(division_count), mold.division_rate)?;
    trace.push(PricingTraceStep::new(
        "divisions",
        format!("{division_count} divisions * {}", mold.division_rate),
        divisions,
    ));

    let mut total = add(add(base, area_adjustment)?, divisions)?;
    if spec.thickness == MoldThickness::Reinforced {
        total = mul(total, mold.reinforced_multiplier)?;
        trace.push(PricingTraceStep::new(
            "thickness",
            format!("reinforced * {}", mold.reinforced_multiplier),
            total,
        ));
    }

    Ok(total)
}

fn price_pan_mold(
    spec: &PanMoldSpec,
    rules: &RuleSet,
    trace: &mut Vec<PricingTraceStep>,
) -> Result<Decimal, QuotationError> {
    let pan = &rules.pan_mold;

    let diameter = match spec.shape {
        PanShape::Round { diameter } => diameter,
        PanShape::Rectangular { length, width } => {
            let equivalent = equivalent_diameter(length, width)?;
            trace.push(PricingTraceStep::new(
                "equivalent_diameter",
                format!("2 * sqrt(({length} * {width}) / pi)"),
                equivalent,
            ));
            equivalent
        }
    };

    let raw = mul(diameter, pan.diameter_rate)? - pan.diameter_offset;
    trace.push(PricingTraceStep::new(
        "base",
        format!("{} * diameter - {}", pan.diameter_rate, pan.diameter_offset),
        raw,
    ));

    let mut base = raw;
    if raw < pan.minimum_price {
        base = pan.minimum_price;
        trace.push(PricingTraceStep::new(
            "minimum_floor",
            format!("raw {raw} below minimum"),
            base,
        ));
    }

    if spec.thickness == SheetThickness::Premium {
        base = mul(base, pan.premium_multiplier)?;
        trace.push(PricingTraceStep::new(
            "thickness",
            format!("premium * {}", pan.premium_multiplier),
            base,
        ));
    }

    Ok(base)
}

/// Diameter of the circle whose area matches a `length` x `width` rectangle.
pub fn equivalent_diameter(length: Decimal, width: Decimal) -> Result<Decimal, QuotationError> {
    let area = mul(length, width)?;
    let radius_squared = area.checked_div(Decimal::PI).ok_or_else(out_of_range)?;
    let radius = radius_squared.sqrt().ok_or_else(out_of_range)?;
    mul(Decimal::from(2), radius)
}

fn price_rods_or_plates(
    spec: &RodsOrPlatesSpec,
    rules: &RuleSet,
    trace: &mut Vec<PricingTraceStep>,
) -> Result<Decimal, QuotationError> {
    let sheet = &rules.rods_or_plates;
    let (fixed, rate) = match spec.kind {
        SheetKind::Rods => (sheet.rods_base, sheet.rods_area_rate),
        SheetKind::Plates => (sheet.plates_base, sheet.plates_area_rate),
    };

    let area = mul(spec.length, spec.width)?;
    let mut base = add(fixed, mul(area, rate)?)?;
    trace.push(PricingTraceStep::new("base", format!("{fixed} + {area} * {rate}"), base));

    if spec.thickness == SheetThickness::Premium {
        base = mul(base, sheet.premium_multiplier)?;
        trace.push(PricingTraceStep::new(
            "thickness",
            format!("premium * {}", sheet.premium_multiplier),
            base,
        ));
    }

    Ok(base)
}

fn price_experimental(
    spec: &ExperimentalSpec,
    rules: &RuleSet,
    trace: &mut Vec<PricingTraceStep>,
) -> Result<Decimal, QuotationError> {
    let experimental = &rules.experimental;

    let (rate, thickness_multiplier) = match spec.material {
        ExperimentalMaterial::Aluminum { thickness } => (
            experimental.aluminum_area_rate,
            (thickness == MoldThickness::Reinforced).then_some(rules.mold.reinforced_multiplier),
        ),
        ExperimentalMaterial::Acrylic { thickness } => (
            experimental.acrylic_area_rate,
            (thickness == SheetThickness::Premium)
                .then_some(rules.rods_or_plates.premium_multiplier),
        ),
    };

    let area = mul(spec.length, spec.width)?;
    let material_cost = mul(area, rate)?;
    trace.push(PricingTraceStep::new("material", format!("{area} * {rate}"), material_cost));

    let factor = match spec.complexity {
        Complexity::Simple => experimental.simple_factor,
        Complexity::Medium => experimental.medium_factor,
        Complexity::Complex => experimental.complex_factor,
    };
    let mut total = mul(material_cost, factor)?;
    trace.push(PricingTraceStep::new(
        "complexity",
        format!("{} * {factor}", spec.complexity.label()),
        total,
    ));

    if let Some(multiplier) = thickness_multiplier {
        total = mul(total, multiplier)?;
        trace.push(PricingTraceStep::new("thickness", format!("heavy * {multiplier}"), total));
    }

    Ok(total)
}

fn mul(lhs: Decimal, rhs: Decimal) -> Result<Decimal, QuotationError> {
    lhs.checked_mul(rhs).ok_or_else(out_of_range)
}

fn add(lhs: Decimal, rhs: Decimal) -> Result<Decimal, QuotationError> {
    lhs.checked_add(rhs).ok_or_else(out_of_range)
}

fn out_of_range() -> QuotationError {
    QuotationError::invalid("dimensions are too large to price")
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{calculate, equivalent_diameter, DeterministicCalculator, QuotationCalculator};
    use crate::cpq::rules::RuleSet;
    use crate::domain::quotation::CostBreakdown;
    use crate::domain::specification::{
        Complexity, ExperimentalMaterial, ExperimentalSpec, MoldSpec, MoldSubtype, MoldThickness,
        PanMoldSpec, PanShape, ProductFamily, ProductSpecification, RodsOrPlatesSpec, SheetKind,
        SheetThickness,
    };
    use crate::errors::QuotationError;

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn mold(
        subtype: MoldSubtype,
        thickness: MoldThickness,
        length: i64,
        width: i64,
        divisions: (u32, u32),
    ) -> ProductSpecification {
        ProductSpecification::Mold(MoldSpec {
            length: dec(length),
            width: dec(width),
            height: dec(5),
            subtype,
            thickness,
            divisions_along_length: divisions.0,
            divisions_along_width: divisions.1,
        })
    }

    fn sheet(kind: SheetKind, thickness: SheetThickness, length: i64, width: i64) -> ProductSpecification {
        ProductSpecification::RodsOrPlates(RodsOrPlatesSpec {
            kind,
            length: dec(length),
            width: dec(width),
            thickness,
        })
    }

    fn experimental(
        material: ExperimentalMaterial,
        complexity: Complexity,
        length: i64,
        width: i64,
    ) -> ProductSpecification {
        ProductSpecification::Experimental(ExperimentalSpec {
            material,
            length: dec(length),
            width: dec(width),
            complexity,
        })
    }

    fn stage(breakdown: &CostBreakdown, name: &str) -> Option<Decimal> {
        breakdown.trace.iter().find(|step| step.stage == name).map(|step| step.amount)
    }

    #[test]
    fn removable_mold_at_threshold_costs_base_price() {
        let spec = mold(MoldSubtype::Removable, MoldThickness::Standard, 30, 20, (0, 0));
        let breakdown = calculate(&spec, &RuleSet::default()).expect("mold should price");

        assert_eq!(breakdown.elaboration_cost, dec(30_000));
        assert_eq!(breakdown.suggested_sale_price, dec(39_000));
        assert_eq!(breakdown.family, ProductFamily::Mold);
        assert!(!breakdown.disclaimer_required);
    }

    #[test]
    fn reinforced_fixed_mold_keeps_fractional_sale_price() {
        let spec = mold(MoldSubtype::Fixed, MoldThickness::Reinforced, 30, 20, (0, 0));
        let breakdown = calculate(&spec, &RuleSet::default()).expect("mold should price");

        assert_eq!(breakdown.elaboration_cost, dec(28_125));
        assert_eq!(breakdown.suggested_sale_price, Decimal::new(365_625, 1));
    }

    #[test]
    fn mold_area_adjustment_is_zero_up_to_threshold() {
        for (length, width) in [(1, 1), (10, 60), (24, 25), (30, 20), (600, 1)] {
            let spec = mold(MoldSubtype::Fixed, MoldThickness::Standard, length, width, (0, 0));
            let breakdown = calculate(&spec, &RuleSet::default()).expect("mold should price");
            assert_eq!(stage(&breakdown, "area_adjustment"), Some(Decimal::ZERO));
            assert_eq!(breakdown.elaboration_cost, dec(22_500));
        }
    }

    #[test]
    fn mold_adds_area_excess_and_divisions() {
        // 40x20 = 800 cm², 200 over the threshold.
        let spec = mold(MoldSubtype::Removable, MoldThickness::Standard, 40, 20, (2, 1));
        let breakdown = calculate(&spec, &RuleSet::default()).expect("mold should price");

        assert_eq!(stage(&breakdown, "area_adjustment"), Some(dec(1_000)));
        assert_eq!(stage(&breakdown, "divisions"), Some(dec(3_750)));
        assert_eq!(breakdown.elaboration_cost, dec(34_750));
    }

    #[test]
    fn reinforced_multiplier_applies_after_divisions() {
        let spec = mold(MoldSubtype::Removable, MoldThickness::Reinforced, 40, 20, (2, 1));
        let breakdown = calculate(&spec, &RuleSet::default()).expect("mold should price");

        assert_eq!(breakdown.elaboration_cost, Decimal::new(434_375, 1));
    }

    #[test]
    fn small_round_pan_mold_is_clamped_to_minimum() {
        let spec = ProductSpecification::PanMold(PanMoldSpec {
            shape: PanShape::Round { diameter: dec(5) },
            thickness: SheetThickness::Standard,
        });
        let breakdown = calculate(&spec, &RuleSet::default()).expect("pan should price");

        assert_eq!(stage(&breakdown, "base"), Some(dec(-1_125)));
        assert_eq!(breakdown.elaboration_cost, dec(2_000));
    }

    #[test]
    fn premium_applies_after_minimum_floor() {
        let spec = ProductSpecification::PanMold(PanMoldSpec {
            shape: PanShape::Round { diameter: dec(5) },
            thickness: SheetThickness::Premium,
        });
        let breakdown = calculate(&spec, &RuleSet::default()).expect("pan should price");

        assert_eq!(breakdown.elaboration_cost, dec(2_800));
    }

    #[test]
    fn rectangular_pan_mold_uses_equivalent_diameter() {
        let diameter = equivalent_diameter(dec(20), dec(20)).expect("diameter");
        assert!((diameter - Decimal::new(22_568, 3)).abs() < Decimal::new(1, 3));

        let spec = ProductSpecification::PanMold(PanMoldSpec {
            shape: PanShape::Rectangular { length: dec(20), width: dec(20) },
            thickness: SheetThickness::Standard,
        });
        let breakdown = calculate(&spec, &RuleSet::default()).expect("pan should price");

        assert!((breakdown.elaboration_cost - Decimal::new(985_474, 2)).abs() < Decimal::new(1, 2));
        assert_eq!(stage(&breakdown, "equivalent_diameter"), Some(diameter));
    }

    #[test]
    fn round_pan_mold_above_minimum() {
        let spec = ProductSpecification::PanMold(PanMoldSpec {
            shape: PanShape::Round { diameter: dec(24) },
            thickness: SheetThickness::Standard,
        });
        let breakdown = calculate(&spec, &RuleSet::default()).expect("pan should price");

        assert_eq!(breakdown.elaboration_cost, dec(10_750));
        assert_eq!(stage(&breakdown, "minimum_floor"), None);
    }

    #[test]
    fn rods_and_plates_use_their_own_formulas() {
        let rules = RuleSet::default();

        let rods = calculate(&sheet(SheetKind::Rods, SheetThickness::Standard, 10, 10), &rules)
            .expect("rods should price");
        assert_eq!(rods.elaboration_cost, dec(2_550));

        let plates = calculate(&sheet(SheetKind::Plates, SheetThickness::Standard, 10, 10), &rules)
            .expect("plates should price");
        assert_eq!(plates.elaboration_cost, dec(1_750));

        let premium = calculate(&sheet(SheetKind::Rods, SheetThickness::Premium, 10, 10), &rules)
            .expect("premium rods should price");
        assert_eq!(premium.elaboration_cost, dec(3_570));
    }

    #[test]
    fn experimental_pieces_always_require_disclaimer() {
        let spec = experimental(
            ExperimentalMaterial::Aluminum { thickness: MoldThickness::Standard },
            Complexity::Complex,
            10,
            10,
        );
        let breakdown = calculate(&spec, &RuleSet::default()).expect("experimental should price");

        assert_eq!(stage(&breakdown, "material"), Some(dec(750)));
        assert_eq!(breakdown.elaboration_cost, dec(1_500));
        assert!(breakdown.disclaimer_required);
    }

    #[test]
    fn experimental_thickness_follows_material_line() {
        let rules = RuleSet::default();

        let aluminum = calculate(
            &experimental(
                ExperimentalMaterial::Aluminum { thickness: MoldThickness::Reinforced },
                Complexity::Simple,
                10,
                10,
            ),
            &rules,
        )
        .expect("aluminum should price");
        assert_eq!(aluminum.elaboration_cost, Decimal::new(9375, 1));

        let acrylic = calculate(
            &experimental(
                ExperimentalMaterial::Acrylic { thickness: SheetThickness::Premium },
                Complexity::Medium,
                10,
                10,
            ),
            &rules,
        )
        .expect("acrylic should price");
        assert_eq!(acrylic.elaboration_cost, dec(840));
    }

    #[test]
    fn sale_price_is_cost_times_margin_for_every_family() {
        let rules = RuleSet::default();
        let specs = [
            mold(MoldSubtype::Fixed, MoldThickness::Reinforced, 33, 21, (1, 3)),
            sheet(SheetKind::Plates, SheetThickness::Premium, 17, 9),
            experimental(
                ExperimentalMaterial::Acrylic { thickness: SheetThickness::Standard },
                Complexity::Medium,
                7,
                13,
            ),
            ProductSpecification::PanMold(PanMoldSpec {
                shape: PanShape::Rectangular { length: dec(31), width: dec(17) },
                thickness: SheetThickness::Premium,
            }),
        ];

        for spec in specs {
            let breakdown = calculate(&spec, &rules).expect("spec should price");
            assert_eq!(breakdown.suggested_sale_price, breakdown.elaboration_cost * rules.sale_margin);
        }
    }

    #[test]
    fn injected_rules_replace_defaults() {
        let mut rules = RuleSet::default();
        rules.rods_or_plates.rods_base = dec(3_000);
        rules.sale_margin = Decimal::new(15, 1);

        let breakdown = DeterministicCalculator
            .calculate(&sheet(SheetKind::Rods, SheetThickness::Standard, 10, 10), &rules)
            .expect("rods should price");

        assert_eq!(breakdown.elaboration_cost, dec(3_050));
        assert_eq!(breakdown.suggested_sale_price, dec(4_575));
    }

    #[test]
    fn non_positive_dimension_yields_no_result() {
        let spec = sheet(SheetKind::Plates, SheetThickness::Standard, 10, 0);
        let error = calculate(&spec, &RuleSet::default()).expect_err("zero width must fail");

        assert!(matches!(error, QuotationError::InvalidSpecification { .. }));
    }

    #[test]
    fn overflowing_dimensions_fail_instead_of_panicking() {
        let spec = ProductSpecification::RodsOrPlates(RodsOrPlatesSpec {
            kind: SheetKind::Plates,
            length: Decimal::MAX,
            width: Decimal::MAX,
            thickness: SheetThickness::Standard,
        });

        assert!(matches!(
            calculate(&spec, &RuleSet::default()),
            Err(QuotationError::InvalidSpecification { .. })
        ));
    }
}
