//! Per-family pricing constants.
//!
//! A `RuleSet` is built once at startup (defaults or an operator-supplied TOML file) and shared
//! read-only by every quotation. Nothing in the pricing path reads ambient globals.

use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleSetError {
    #[error("could not read rules file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse rules: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("rule validation failed: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleSet {
    /// Multiplier from elaboration cost to suggested sale price.
    pub sale_margin: Decimal,
    pub mold: MoldRules,
    pub pan_mold: PanMoldRules,
    pub rods_or_plates: RodsOrPlatesRules,
    pub experimental: ExperimentalRules,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MoldRules {
    pub removable_base: Decimal,
    pub fixed_base: Decimal,
    /// Area in cm² included in the base price.
    pub area_threshold: Decimal,
    /// Price per cm² above the threshold.
    pub area_rate: Decimal,
    pub division_rate: Decimal,
    pub reinforced_multiplier: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PanMoldRules {
    pub diameter_rate: Decimal,
    pub diameter_offset: Decimal,
    pub minimum_price: Decimal,
    pub premium_multiplier: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RodsOrPlatesRules {
    pub rods_base: Decimal,
    pub rods_area_rate: Decimal,
    pub plates_base: Decimal,
    pub plates_area_rate: Decimal,
    pub premium_multiplier: Decimal,
}

/// Experimental pieces reuse the thickness multiplier of their material's catalogue line:
/// aluminum follows `mold.reinforced_multiplier`, acrylic follows
/// `rods_or_plates.premium_multiplier`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentalRules {
    pub aluminum_area_rate: Decimal,
    pub acrylic_area_rate: Decimal,
    pub simple_factor: Decimal,
    pub medium_factor: Decimal,
    pub complex_factor: Decimal,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            sale_margin: Decimal::new(13, 1),
            mold: MoldRules::default(),
            pan_mold: PanMoldRules::default(),
            rods_or_plates: RodsOrPlatesRules::default(),
            experimental: ExperimentalRules::default(),
        }
    }
}

impl Default for MoldRules {
    fn default() -> Self {
        Self {
            removable_base: Decimal::from(30_000),
            fixed_base: Decimal::from(22_500),
            area_threshold: Decimal::from(600),
            area_rate: Decimal::from(5),
            division_rate: Decimal::from(1_250),
            reinforced_multiplier: Decimal::new(125, 2),
        }
    }
}

impl Default for PanMoldRules {
    fn default() -> Self {
        Self {
            diameter_rate: Decimal::from(625),
            diameter_offset: Decimal::from(4_250),
            minimum_price: Decimal::from(2_000),
            premium_multiplier: Decimal::new(14, 1),
        }
    }
}

impl Default for RodsOrPlatesRules {
    fn default() -> Self {
        Self {
            rods_base: Decimal::from(2_500),
            rods_area_rate: Decimal::new(5, 1),
            plates_base: Decimal::from(1_500),
            plates_area_rate: Decimal::new(25, 1),
            premium_multiplier: Decimal::new(14, 1),
        }
    }
}

impl Default for ExperimentalRules {
    fn default() -> Self {
        Self {
            aluminum_area_rate: Decimal::new(75, 1),
            acrylic_area_rate: Decimal::from(4),
            simple_factor: Decimal::ONE,
            medium_factor: Decimal::new(15, 1),
            complex_factor: Decimal::from(2),
        }
    }
}

impl RuleSet {
    pub fn from_toml_str(raw: &str) -> Result<Self, RuleSetError> {
        let rules = toml::from_str::<Self>(raw)?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn load(path: &Path) -> Result<Self, RuleSetError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| RuleSetError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), RuleSetError> {
        positive("sale_margin", self.sale_margin)?;

        positive("mold.removable_base", self.mold.removable_base)?;
        positive("mold.fixed_base", self.mold.fixed_base)?;
        non_negative("mold.area_threshold", self.mold.area_threshold)?;
        non_negative("mold.area_rate", self.mold.area_rate)?;
        non_negative("mold.division_rate", self.mold.division_rate)?;
        positive("mold.reinforced_multiplier", self.mold.reinforced_multiplier)?;

        positive("pan_mold.diameter_rate", self.pan_mold.diameter_rate)?;
        non_negative("pan_mold.diameter_offset", self.pan_mold.diameter_offset)?;
        positive("pan_mold.minimum_price", self.pan_mold.minimum_price)?;
        positive("pan_mold.premium_multiplier", self.pan_mold.premium_multiplier)?;

        positive("rods_or_plates.rods_base", self.rods_or_plates.rods_base)?;
        non_negative("rods_or_plates.rods_area_rate", self.rods_or_plates.rods_area_rate)?;
        positive("rods_or_plates.plates_base", self.rods_or_plates.plates_base)?;
        non_negative("rods_or_plates.plates_area_rate", self.rods_or_plates.plates_area_rate)?;
        positive("rods_or_plates.premium_multiplier", self.rods_or_plates.premium_multiplier)?;

        positive("experimental.aluminum_area_rate", self.experimental.aluminum_area_rate)?;
        positive("experimental.acrylic_area_rate", self.experimental.acrylic_area_rate)?;
        positive("experimental.simple_factor", self.experimental.simple_factor)?;
        positive("experimental.medium_factor", self.experimental.medium_factor)?;
        positive("experimental.complex_factor", self.experimental.complex_factor)?;

        Ok(())
    }
}

fn positive(key: &str, value: Decimal) -> Result<(), RuleSetError> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(RuleSetError::Validation(format!("{key} must be greater than zero")))
    }
}

fn non_negative(key: &str, value: Decimal) -> Result<(), RuleSetError> {
    if value >= Decimal::ZERO {
        Ok(())
    } else {
        Err(RuleSetError::Validation(format!("{key} must not be negative")))
    }
}
