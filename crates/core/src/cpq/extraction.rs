//! Pulls a product specification out of free-form assistant text.
//!
//! The assistant signals a finished interview by writing the marker followed by a JSON object,
//! optionally wrapped in a fenced code block. Everything downstream of this module only sees
//! a validated [`ProductSpecification`] or a [`QuotationError`].

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::specification::{
    Complexity, ExperimentalMaterial, ExperimentalSpec, MoldSpec, MoldSubtype, MoldThickness,
    PanMoldSpec, PanShape, ProductSpecification, RodsOrPlatesSpec, SheetKind, SheetThickness,
};
use crate::errors::QuotationError;

pub const DEFAULT_MARKER: &str = "COTIZACION_JSON:";

/// Marker hit inside raw text: what the assistant said before it, and what follows it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmbeddedPayload<'a> {
    pub preamble: &'a str,
    pub payload: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecificationExtractor {
    marker: String,
}

impl Default for SpecificationExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

impl SpecificationExtractor {
    pub fn new(marker: impl Into<String>) -> Self {
        Self { marker: marker.into() }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Splits `raw` at the first marker occurrence. `None` means plain conversation.
    pub fn locate<'a>(&self, raw: &'a str) -> Option<EmbeddedPayload<'a>> {
        let index = raw.find(&self.marker)?;
        let preamble = trim_dangling_fence(&raw[..index]);
        let payload = &raw[index + self.marker.len()..];
        Some(EmbeddedPayload { preamble, payload })
    }

    /// Returns `Ok(None)` when the marker is absent.
    pub fn extract(&self, raw: &str) -> Result<Option<ProductSpecification>, QuotationError> {
        match self.locate(raw) {
            Some(embedded) => self.parse(embedded.payload).map(Some),
            None => Ok(None),
        }
    }

    pub fn parse(&self, payload: &str) -> Result<ProductSpecification, QuotationError> {
        let object = match first_json_value(strip_fence(payload))? {
            Value::Object(object) => object,
            other => {
                return Err(QuotationError::extraction(format!(
                    "payload must be a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };

        let fields = CanonicalFields::from_object(object)?;
        if !fields.ignored.is_empty() {
            debug!(
                event_name = "quotation.extraction.ignored_fields",
                ignored = ?fields.ignored,
                "payload carried fields outside the alias table"
            );
        }

        let specification = fields.into_specification()?;
        specification.validate()?;
        Ok(specification)
    }
}

fn first_json_value(payload: &str) -> Result<Value, QuotationError> {
    let mut values = serde_json::Deserializer::from_str(payload).into_iter::<Value>();
    match values.next() {
        Some(Ok(value)) => Ok(value),
        Some(Err(error)) => {
            Err(QuotationError::extraction(format!("payload is not valid JSON: {error}")))
        }
        None => Err(QuotationError::extraction("no payload follows the quotation marker")),
    }
}

fn strip_fence(payload: &str) -> &str {
    let trimmed = payload.trim_start();
    let Some(after_ticks) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (`json`, `JSON`, ...) up to the end of the opening line.
    let body = match after_ticks.find('\n') {
        Some(newline) => &after_ticks[newline + 1..],
        None => after_ticks.trim_start_matches(|ch: char| ch.is_ascii_alphabetic()),
    };
    match body.find("```") {
        Some(closing) => &body[..closing],
        None => body,
    }
}

fn trim_dangling_fence(preamble: &str) -> &str {
    let trimmed = preamble.trim_end();
    let without_info = trimmed.trim_end_matches(|ch: char| ch.is_ascii_alphabetic());
    match without_info.strip_suffix("```") {
        Some(rest) => rest.trim_end(),
        None => trimmed,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Field {
    Family,
    Length,
    Width,
    Height,
    Diameter,
    Subtype,
    Thickness,
    DivisionsAlongLength,
    DivisionsAlongWidth,
    Shape,
    Kind,
    Material,
    Complexity,
    Dimensions,
}

impl Field {
    fn name(&self) -> &'static str {
        match self {
            Self::Family => "family",
            Self::Length => "length",
            Self::Width => "width",
            Self::Height => "height",
            Self::Diameter => "diameter",
            Self::Subtype => "subtype",
            Self::Thickness => "thickness",
            Self::DivisionsAlongLength => "divisionsAlongLength",
            Self::DivisionsAlongWidth => "divisionsAlongWidth",
            Self::Shape => "shape",
            Self::Kind => "kind",
            Self::Material => "material",
            Self::Complexity => "complexity",
            Self::Dimensions => "dimensions",
        }
    }
}

/// Every accepted spelling, after `normalize_token`, mapped to its canonical field.
const FIELD_ALIASES: &[(&str, Field)] = &[
    ("tipo", Field::Family),
    ("producto", Field::Family),
    ("familia", Field::Family),
    ("categoria", Field::Family),
    ("family", Field::Family),
    ("product", Field::Family),
    ("type", Field::Family),
    ("l", Field::Length),
    ("largo", Field::Length),
    ("longitud", Field::Length),
    ("length", Field::Length),
    ("a", Field::Width),
    ("ancho", Field::Width),
    ("anchura", Field::Width),
    ("w", Field::Width),
    ("width", Field::Width),
    ("h", Field::Height),
    ("alto", Field::Height),
    ("altura", Field::Height),
    ("height", Field::Height),
    ("d", Field::Diameter),
    ("diametro", Field::Diameter),
    ("diam", Field::Diameter),
    ("diameter", Field::Diameter),
    ("subtipo", Field::Subtype),
    ("modalidad", Field::Subtype),
    ("montaje", Field::Subtype),
    ("tipomolde", Field::Subtype),
    ("subtype", Field::Subtype),
    ("espesor", Field::Thickness),
    ("grosor", Field::Thickness),
    ("calibre", Field::Thickness),
    ("thickness", Field::Thickness),
    ("divisioneslargo", Field::DivisionsAlongLength),
    ("divisionesalolargo", Field::DivisionsAlongLength),
    ("divlargo", Field::DivisionsAlongLength),
    ("divisionsalonglength", Field::DivisionsAlongLength),
    ("divisionslength", Field::DivisionsAlongLength),
    ("divisionesancho", Field::DivisionsAlongWidth),
    ("divisionesaloancho", Field::DivisionsAlongWidth),
    ("divancho", Field::DivisionsAlongWidth),
    ("divisionsalongwidth", Field::DivisionsAlongWidth),
    ("divisionswidth", Field::DivisionsAlongWidth),
    ("forma", Field::Shape),
    ("shape", Field::Shape),
    ("clase", Field::Kind),
    ("formato", Field::Kind),
    ("kind", Field::Kind),
    ("material", Field::Material),
    ("complejidad", Field::Complexity),
    ("dificultad", Field::Complexity),
    ("complexity", Field::Complexity),
    ("medidas", Field::Dimensions),
    ("dimensiones", Field::Dimensions),
    ("dimensions", Field::Dimensions),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FamilyTag {
    Mold,
    PanMold,
    Rods,
    Plates,
    RodsOrPlates,
    Experimental,
}

const FAMILY_TAGS: &[(&str, FamilyTag)] = &[
    ("molde", FamilyTag::Mold),
    ("moldes", FamilyTag::Mold),
    ("moldebrownie", FamilyTag::Mold),
    ("moldebrownies", FamilyTag::Mold),
    ("mold", FamilyTag::Mold),
    ("panquequera", FamilyTag::PanMold),
    ("panquequeras", FamilyTag::PanMold),
    ("panmold", FamilyTag::PanMold),
    ("varillas", FamilyTag::Rods),
    ("varilla", FamilyTag::Rods),
    ("rods", FamilyTag::Rods),
    ("placas", FamilyTag::Plates),
    ("placa", FamilyTag::Plates),
    ("plates", FamilyTag::Plates),
    ("varillasplacas", FamilyTag::RodsOrPlates),
    ("varillasoplacas", FamilyTag::RodsOrPlates),
    ("rodsorplates", FamilyTag::RodsOrPlates),
    ("experimental", FamilyTag::Experimental),
    ("otro", FamilyTag::Experimental),
    ("otros", FamilyTag::Experimental),
    ("otroproducto", FamilyTag::Experimental),
    ("other", FamilyTag::Experimental),
];

const SUBTYPES: &[(&str, MoldSubtype)] = &[
    ("fijo", MoldSubtype::Fixed),
    ("fija", MoldSubtype::Fixed),
    ("fixed", MoldSubtype::Fixed),
    ("desmontable", MoldSubtype::Removable),
    ("desarmable", MoldSubtype::Removable),
    ("removible", MoldSubtype::Removable),
    ("removable", MoldSubtype::Removable),
];

const MOLD_THICKNESSES: &[(&str, MoldThickness)] = &[
    ("estandar", MoldThickness::Standard),
    ("standard", MoldThickness::Standard),
    ("normal", MoldThickness::Standard),
    ("1", MoldThickness::Standard),
    ("reforzado", MoldThickness::Reinforced),
    ("reforzada", MoldThickness::Reinforced),
    ("reinforced", MoldThickness::Reinforced),
    ("grueso", MoldThickness::Reinforced),
    ("2", MoldThickness::Reinforced),
];

const SHEET_THICKNESSES: &[(&str, SheetThickness)] = &[
    ("estandar", SheetThickness::Standard),
    ("standard", SheetThickness::Standard),
    ("normal", SheetThickness::Standard),
    ("1", SheetThickness::Standard),
    ("premium", SheetThickness::Premium),
    ("grueso", SheetThickness::Premium),
    ("gruesa", SheetThickness::Premium),
    ("2", SheetThickness::Premium),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ShapeTag {
    Round,
    Rectangular,
}

const SHAPES: &[(&str, ShapeTag)] = &[
    ("redonda", ShapeTag::Round),
    ("redondo", ShapeTag::Round),
    ("circular", ShapeTag::Round),
    ("round", ShapeTag::Round),
    ("rectangular", ShapeTag::Rectangular),
    ("rectangulo", ShapeTag::Rectangular),
    ("cuadrada", ShapeTag::Rectangular),
    ("cuadrado", ShapeTag::Rectangular),
    ("square", ShapeTag::Rectangular),
];

const KINDS: &[(&str, SheetKind)] = &[
    ("varillas", SheetKind::Rods),
    ("varilla", SheetKind::Rods),
    ("rods", SheetKind::Rods),
    ("placas", SheetKind::Plates),
    ("placa", SheetKind::Plates),
    ("plates", SheetKind::Plates),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MaterialTag {
    Aluminum,
    Acrylic,
}

const MATERIALS: &[(&str, MaterialTag)] = &[
    ("aluminio", MaterialTag::Aluminum),
    ("aluminum", MaterialTag::Aluminum),
    ("aluminium", MaterialTag::Aluminum),
    ("acrilico", MaterialTag::Acrylic),
    ("acrylic", MaterialTag::Acrylic),
];

const COMPLEXITIES: &[(&str, Complexity)] = &[
    ("simple", Complexity::Simple),
    ("baja", Complexity::Simple),
    ("basica", Complexity::Simple),
    ("low", Complexity::Simple),
    ("media", Complexity::Medium),
    ("medio", Complexity::Medium),
    ("intermedia", Complexity::Medium),
    ("medium", Complexity::Medium),
    ("compleja", Complexity::Complex),
    ("complejo", Complexity::Complex),
    ("alta", Complexity::Complex),
    ("complex", Complexity::Complex),
    ("high", Complexity::Complex),
];

#[derive(Debug, Default)]
struct CanonicalFields {
    values: BTreeMap<Field, Value>,
    ignored: Vec<String>,
}

impl CanonicalFields {
    fn from_object(object: Map<String, Value>) -> Result<Self, QuotationError> {
        let mut fields = Self::default();
        fields.absorb(object, true)?;
        Ok(fields)
    }

    fn absorb(&mut self, object: Map<String, Value>, top_level: bool) -> Result<(), QuotationError> {
        for (key, value) in object {
            match canonical_field(&key) {
                Some(Field::Dimensions) if top_level => match value {
                    Value::Object(inner) => self.absorb(inner, false)?,
                    other => {
                        return Err(QuotationError::extraction(format!(
                            "`{key}` must be an object of measurements, got {}",
                            json_kind(&other)
                        )))
                    }
                },
                Some(Field::Dimensions) | None => self.ignored.push(key),
                Some(Field::Family) if names_subtype(&value) => {
                    self.insert(Field::Subtype, value)?
                }
                Some(field) => self.insert(field, value)?,
            }
        }
        Ok(())
    }

    fn insert(&mut self, field: Field, value: Value) -> Result<(), QuotationError> {
        if value.is_null() {
            return Ok(());
        }
        match self.values.get(&field) {
            Some(existing) if !same_value(existing, &value) => {
                Err(QuotationError::extraction(format!(
                    "conflicting values for `{}`: {existing} and {value}",
                    field.name()
                )))
            }
            Some(_) => Ok(()),
            None => {
                self.values.insert(field, value);
                Ok(())
            }
        }
    }

    fn into_specification(self) -> Result<ProductSpecification, QuotationError> {
        let family = self.family()?;
        let specification = match family {
            FamilyTag::Mold => ProductSpecification::Mold(MoldSpec {
                length: self.number(Field::Length)?,
                width: self.number(Field::Width)?,
                height: self.number(Field::Height)?,
                subtype: self.choice(Field::Subtype, SUBTYPES, "fixed|removable")?,
                thickness: self.choice(Field::Thickness, MOLD_THICKNESSES, "standard|reinforced")?,
                divisions_along_length: self.count(Field::DivisionsAlongLength)?,
                divisions_along_width: self.count(Field::DivisionsAlongWidth)?,
            }),
            FamilyTag::PanMold => {
                let shape = match self.choice(Field::Shape, SHAPES, "round|rectangular")? {
                    ShapeTag::Round => PanShape::Round { diameter: self.number(Field::Diameter)? },
                    ShapeTag::Rectangular => PanShape::Rectangular {
                        length: self.number(Field::Length)?,
                        width: self.number(Field::Width)?,
                    },
                };
                ProductSpecification::PanMold(PanMoldSpec {
                    shape,
                    thickness: self.choice(Field::Thickness, SHEET_THICKNESSES, "standard|premium")?,
                })
            }
            FamilyTag::Rods | FamilyTag::Plates | FamilyTag::RodsOrPlates => {
                let kind = self.sheet_kind(family)?;
                ProductSpecification::RodsOrPlates(RodsOrPlatesSpec {
                    kind,
                    length: self.number(Field::Length)?,
                    width: self.number(Field::Width)?,
                    thickness: self.choice(Field::Thickness, SHEET_THICKNESSES, "standard|premium")?,
                })
            }
            FamilyTag::Experimental => {
                let material = match self.choice(Field::Material, MATERIALS, "aluminum|acrylic")? {
                    MaterialTag::Aluminum => ExperimentalMaterial::Aluminum {
                        thickness: self.choice(
                            Field::Thickness,
                            MOLD_THICKNESSES,
                            "standard|reinforced (aluminum)",
                        )?,
                    },
                    MaterialTag::Acrylic => ExperimentalMaterial::Acrylic {
                        thickness: self.choice(
                            Field::Thickness,
                            SHEET_THICKNESSES,
                            "standard|premium (acrylic)",
                        )?,
                    },
                };
                ProductSpecification::Experimental(ExperimentalSpec {
                    material,
                    length: self.number(Field::Length)?,
                    width: self.number(Field::Width)?,
                    complexity: self.choice(
                        Field::Complexity,
                        COMPLEXITIES,
                        "simple|medium|complex",
                    )?,
                })
            }
        };
        Ok(specification)
    }

    fn family(&self) -> Result<FamilyTag, QuotationError> {
        let value = self.values.get(&Field::Family).ok_or_else(|| {
            QuotationError::extraction("payload does not declare a product family")
        })?;
        let Value::String(raw) = value else {
            return Err(QuotationError::extraction(format!(
                "product family must be a string, got {}",
                json_kind(value)
            )));
        };
        lookup(FAMILY_TAGS, &normalize_token(raw)).ok_or_else(|| {
            QuotationError::extraction(format!("unrecognized product family `{raw}`"))
        })
    }

    fn sheet_kind(&self, family: FamilyTag) -> Result<SheetKind, QuotationError> {
        let implied = match family {
            FamilyTag::Rods => Some(SheetKind::Rods),
            FamilyTag::Plates => Some(SheetKind::Plates),
            _ => None,
        };
        let declared = if self.values.contains_key(&Field::Kind) {
            Some(self.choice(Field::Kind, KINDS, "rods|plates")?)
        } else {
            None
        };

        match (implied, declared) {
            (Some(implied), Some(declared)) if implied != declared => {
                Err(QuotationError::extraction(format!(
                    "product family says {implied:?} but kind says {declared:?}"
                )))
            }
            (Some(kind), _) | (None, Some(kind)) => Ok(kind),
            (None, None) => Err(missing(Field::Kind)),
        }
    }

    fn required(&self, field: Field) -> Result<&Value, QuotationError> {
        self.values.get(&field).ok_or_else(|| missing(field))
    }

    fn number(&self, field: Field) -> Result<Decimal, QuotationError> {
        let value = self.required(field)?;
        coerce_decimal(value).ok_or_else(|| {
            QuotationError::extraction(format!("`{}` must be a number, got {value}", field.name()))
        })
    }

    fn count(&self, field: Field) -> Result<u32, QuotationError> {
        let value = self.number(field)?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(QuotationError::invalid(format!(
                "{} must not be negative (got {value})",
                field.name()
            )));
        }
        if value.fract() != Decimal::ZERO {
            return Err(QuotationError::invalid(format!(
                "{} must be a whole number (got {value})",
                field.name()
            )));
        }
        value.to_u32().ok_or_else(|| {
            QuotationError::invalid(format!("{} is out of range (got {value})", field.name()))
        })
    }

    fn choice<T: Copy>(
        &self,
        field: Field,
        options: &[(&str, T)],
        expected: &str,
    ) -> Result<T, QuotationError> {
        let value = self.required(field)?;
        let token = match value {
            Value::String(raw) => normalize_token(raw),
            Value::Number(_) => coerce_decimal(value)
                .map(|number| number.normalize().to_string())
                .unwrap_or_default(),
            other => {
                return Err(QuotationError::extraction(format!(
                    "`{}` must be text, got {}",
                    field.name(),
                    json_kind(other)
                )))
            }
        };

        lookup(options, &token).ok_or_else(|| {
            QuotationError::invalid(format!("{} `{value}` is not one of {expected}", field.name()))
        })
    }
}

/// `"tipo": "desmontable"` describes the mold subtype rather than the product family.
fn names_subtype(value: &Value) -> bool {
    match value {
        Value::String(raw) => {
            let token = normalize_token(raw);
            lookup(FAMILY_TAGS, &token).is_none() && lookup(SUBTYPES, &token).is_some()
        }
        _ => false,
    }
}

/// Two spellings of one field agree when they coerce to the same number or token.
fn same_value(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    if let (Some(left), Some(right)) = (coerce_decimal(left), coerce_decimal(right)) {
        return left == right;
    }
    match (left, right) {
        (Value::String(left), Value::String(right)) => {
            normalize_token(left) == normalize_token(right)
        }
        _ => false,
    }
}

fn missing(field: Field) -> QuotationError {
    QuotationError::extraction(format!("missing required field `{}`", field.name()))
}

fn canonical_field(key: &str) -> Option<Field> {
    lookup(FIELD_ALIASES, &normalize_token(key))
}

fn lookup<T: Copy>(table: &[(&str, T)], token: &str) -> Option<T> {
    table.iter().find(|(alias, _)| *alias == token).map(|(_, value)| *value)
}

/// Lower-cases, folds Spanish accents and drops separators: `Diámetro` -> `diametro`,
/// `divisiones_largo` -> `divisioneslargo`, `divisionsAlongLength` -> `divisionsalonglength`.
fn normalize_token(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_lowercase)
        .map(|ch| match ch {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .filter(|ch| ch.is_ascii_alphanumeric())
        .collect()
}

fn coerce_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => parse_decimal(&number.to_string()),
        Value::String(text) => parse_decimal(&clean_numeric_text(text)),
        _ => None,
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    text.parse::<Decimal>().ok().or_else(|| Decimal::from_scientific(text).ok())
}

/// `" 30,5 cm "` -> `"30.5"`.
fn clean_numeric_text(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let without_unit = ["centímetros", "centimetros", "cms", "cm"]
        .iter()
        .find_map(|unit| lowered.strip_suffix(*unit))
        .unwrap_or(&lowered);
    without_unit.trim().replace(',', ".")
}
