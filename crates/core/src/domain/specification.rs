use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::QuotationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductFamily {
    Mold,
    PanMold,
    RodsOrPlates,
    Experimental,
}

impl ProductFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mold => "mold",
            Self::PanMold => "pan_mold",
            Self::RodsOrPlates => "rods_or_plates",
            Self::Experimental => "experimental",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoldSubtype {
    Fixed,
    Removable,
}

/// Thickness options of the aluminum line (molds, aluminum experimental pieces).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoldThickness {
    Standard,
    Reinforced,
}

/// Thickness options of pan molds and the acrylic line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetThickness {
    Standard,
    Premium,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum PanShape {
    Round { diameter: Decimal },
    Rectangular { length: Decimal, width: Decimal },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetKind {
    Rods,
    Plates,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "material", rename_all = "snake_case")]
pub enum ExperimentalMaterial {
    Aluminum { thickness: MoldThickness },
    Acrylic { thickness: SheetThickness },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoldSpec {
    pub length: Decimal,
    pub width: Decimal,
    pub height: Decimal,
    pub subtype: MoldSubtype,
    pub thickness: MoldThickness,
    pub divisions_along_length: u32,
    pub divisions_along_width: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanMoldSpec {
    pub shape: PanShape,
    pub thickness: SheetThickness,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RodsOrPlatesSpec {
    pub kind: SheetKind,
    pub length: Decimal,
    pub width: Decimal,
    pub thickness: SheetThickness,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentalSpec {
    pub material: ExperimentalMaterial,
    pub length: Decimal,
    pub width: Decimal,
    pub complexity: Complexity,
}

/// A validated product request. Each variant holds exactly the fields its family is priced on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ProductSpecification {
    Mold(MoldSpec),
    PanMold(PanMoldSpec),
    RodsOrPlates(RodsOrPlatesSpec),
    Experimental(ExperimentalSpec),
}

impl ProductSpecification {
    pub fn family(&self) -> ProductFamily {
        match self {
            Self::Mold(_) => ProductFamily::Mold,
            Self::PanMold(_) => ProductFamily::PanMold,
            Self::RodsOrPlates(_) => ProductFamily::RodsOrPlates,
            Self::Experimental(_) => ProductFamily::Experimental,
        }
    }

    /// Checks the numeric invariants that the type system cannot express.
    pub fn validate(&self) -> Result<(), QuotationError> {
        match self {
            Self::Mold(spec) => {
                ensure_positive("length", spec.length)?;
                ensure_positive("width", spec.width)?;
                ensure_positive("height", spec.height)
            }
            Self::PanMold(spec) => match spec.shape {
                PanShape::Round { diameter } => ensure_positive("diameter", diameter),
                PanShape::Rectangular { length, width } => {
                    ensure_positive("length", length)?;
                    ensure_positive("width", width)
                }
            },
            Self::RodsOrPlates(spec) => {
                ensure_positive("length", spec.length)?;
                ensure_positive("width", spec.width)
            }
            Self::Experimental(spec) => {
                ensure_positive("length", spec.length)?;
                ensure_positive("width", spec.width)
            }
        }
    }

    /// Customer-facing product description, also used as the contact-link text.
    pub fn describe(&self) -> String {
        match self {
            Self::Mold(spec) => {
                let divisions = match (spec.divisions_along_length, spec.divisions_along_width) {
                    (0, 0) => "sin divisiones".to_string(),
                    (along_length, along_width) => format!(
                        "{along_length} {} a lo largo y {along_width} a lo ancho",
                        if along_length == 1 { "división" } else { "divisiones" }
                    ),
                };
                format!(
                    "Molde {} de {} x {} x {} cm, espesor {}, {divisions}",
                    spec.subtype.label(),
                    cm(spec.length),
                    cm(spec.width),
                    cm(spec.height),
                    spec.thickness.label(),
                )
            }
            Self::PanMold(spec) => match spec.shape {
                PanShape::Round { diameter } => format!(
                    "Panquequera redonda de {} cm de diámetro, espesor {}",
                    cm(diameter),
                    spec.thickness.label()
                ),
                PanShape::Rectangular { length, width } => format!(
                    "Panquequera rectangular de {} x {} cm, espesor {}",
                    cm(length),
                    cm(width),
                    spec.thickness.label()
                ),
            },
            Self::RodsOrPlates(spec) => format!(
                "{} de acrílico de {} x {} cm, espesor {}",
                spec.kind.label(),
                cm(spec.length),
                cm(spec.width),
                spec.thickness.label()
            ),
            Self::Experimental(spec) => {
                let (material, thickness) = match spec.material {
                    ExperimentalMaterial::Aluminum { thickness } => ("aluminio", thickness.label()),
                    ExperimentalMaterial::Acrylic { thickness } => ("acrílico", thickness.label()),
                };
                format!(
                    "Diseño experimental en {material} de {} x {} cm, espesor {thickness}, complejidad {}",
                    cm(spec.length),
                    cm(spec.width),
                    spec.complexity.label()
                )
            }
        }
    }
}

impl MoldSubtype {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fixed => "fijo",
            Self::Removable => "desmontable",
        }
    }
}

impl MoldThickness {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard => "estándar",
            Self::Reinforced => "reforzado",
        }
    }
}

impl SheetThickness {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard => "estándar",
            Self::Premium => "premium",
        }
    }
}

impl SheetKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rods => "Varillas",
            Self::Plates => "Placa",
        }
    }
}

impl Complexity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Medium => "media",
            Self::Complex => "alta",
        }
    }
}

fn ensure_positive(field: &str, value: Decimal) -> Result<(), QuotationError> {
    if value > Decimal::ZERO {
        return Ok(());
    }
    Err(QuotationError::InvalidSpecification {
        reason: format!("{field} must be greater than zero (got {value})"),
    })
}

fn cm(value: Decimal) -> Decimal {
    value.normalize()
}
