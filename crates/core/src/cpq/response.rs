//! Customer-facing reply templates.
//!
//! The assembler only lays out values it is given; amounts arrive pre-formatted.

use std::collections::HashMap;

use serde::Serialize;
use tera::{Context, Tera};
use tracing::error;

use crate::domain::quotation::QuotationResult;
use crate::errors::QuotationError;

pub const EXPERIMENTAL_DISCLAIMER: &str = "⚠️ Este es un diseño experimental, la cotización es una referencia. Consúltanos para confirmar el valor.";

const QUOTATION_TEMPLATE: &str = "quotation.txt";
const PAYLOAD_FAILURE_TEMPLATE: &str = "payload_failure.txt";
const SERVICE_UNAVAILABLE_TEXT: &str = "Lo siento, el asistente de cotizaciones no está disponible en este momento. Inténtalo de nuevo en unos minutos.";
const HELP_REQUEST_TEXT: &str = "Hola, necesito ayuda con una cotización";

const QUOTATION_SOURCE: &str = "\
{% if preamble %}{{ preamble }}

{% endif %}¡Listo! Aquí tienes el presupuesto para tu producto: ✨

Especificaciones: {{ description }}

Costo de Elaboración: {{ formatted_cost }}
Precio Venta Sugerido: {{ formatted_price }}
{% if disclaimer %}
{{ disclaimer }}
{% endif %}{% if contact_base %}
Si está todo bien, o si quieres cotizar otro producto, escríbenos: {{ contact_base }}?text={{ description | urlencode_component }}
{% endif %}";

const PAYLOAD_FAILURE_SOURCE: &str = "\
Lo siento 😔, no pude calcular tu cotización con los datos entregados.\
{% if contact_base %} Escríbenos directamente y te ayudamos: {{ contact_base }}?text={{ help_text | urlencode_component }}\
{% else %} Por favor contáctanos directamente para ayudarte.{% endif %}";

/// `<scheme>://<target>`, e.g. `https://wa.me/56900000000`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContactLink {
    pub scheme: String,
    pub target: String,
}

impl ContactLink {
    pub fn new(scheme: impl Into<String>, target: impl Into<String>) -> Self {
        Self { scheme: scheme.into(), target: target.into() }
    }

    pub fn base(&self) -> String {
        format!("{}://{}", self.scheme, self.target)
    }

    pub fn with_text(&self, text: &str) -> String {
        format!("{}?text={}", self.base(), percent_encode(text))
    }
}

pub struct ResponseAssembler {
    templates: Tera,
    contact: Option<ContactLink>,
}

#[derive(Serialize)]
struct QuotationView<'a> {
    preamble: &'a str,
    description: &'a str,
    formatted_cost: &'a str,
    formatted_price: &'a str,
    disclaimer: Option<&'static str>,
    contact_base: Option<String>,
}

impl ResponseAssembler {
    pub fn new(contact: Option<ContactLink>) -> Self {
        let mut templates = Tera::default();
        templates.register_filter("urlencode_component", urlencode_component_filter);

        let registered = templates.add_raw_templates(vec![
            (QUOTATION_TEMPLATE, QUOTATION_SOURCE),
            (PAYLOAD_FAILURE_TEMPLATE, PAYLOAD_FAILURE_SOURCE),
        ]);
        if let Err(template_error) = registered {
            error!(
                event_name = "quotation.response.template_invalid",
                error = %template_error,
                "reply templates failed to compile, plain-text rendering will be used"
            );
        }

        Self { templates, contact }
    }

    pub fn contact(&self) -> Option<&ContactLink> {
        self.contact.as_ref()
    }

    /// Renders the priced reply, prefixed by whatever the assistant said before the payload.
    pub fn quotation(&self, preamble: &str, result: &QuotationResult) -> String {
        let view = QuotationView {
            preamble: preamble.trim(),
            description: &result.description,
            formatted_cost: &result.formatted_cost,
            formatted_price: &result.formatted_price,
            disclaimer: result.disclaimer_required.then_some(EXPERIMENTAL_DISCLAIMER),
            contact_base: self.contact.as_ref().map(ContactLink::base),
        };

        self.render(QUOTATION_TEMPLATE, &view).unwrap_or_else(|| self.plain_quotation(&view))
    }

    /// Apology shown when the payload could not be turned into a quotation.
    pub fn payload_failure(&self, failure: &QuotationError) -> String {
        let mut context = Context::new();
        context.insert("contact_base", &self.contact.as_ref().map(ContactLink::base));
        context.insert("help_text", HELP_REQUEST_TEXT);
        context.insert("reason_code", failure.reason_code());

        match self.templates.render(PAYLOAD_FAILURE_TEMPLATE, &context) {
            Ok(text) => text,
            Err(render_error) => {
                log_render_failure(PAYLOAD_FAILURE_TEMPLATE, &render_error);
                match &self.contact {
                    Some(contact) => format!(
                        "Lo siento, no pude calcular tu cotización con los datos entregados. Escríbenos directamente y te ayudamos: {}",
                        contact.with_text(HELP_REQUEST_TEXT)
                    ),
                    None => "Lo siento, no pude calcular tu cotización con los datos entregados. Por favor contáctanos directamente para ayudarte.".to_string(),
                }
            }
        }
    }

    pub fn service_unavailable(&self) -> String {
        SERVICE_UNAVAILABLE_TEXT.to_string()
    }

    fn render(&self, template: &str, view: &QuotationView<'_>) -> Option<String> {
        let context = Context::from_serialize(view)
            .map_err(|context_error| log_render_failure(template, &context_error))
            .ok()?;
        self.templates
            .render(template, &context)
            .map_err(|render_error| log_render_failure(template, &render_error))
            .ok()
    }

    fn plain_quotation(&self, view: &QuotationView<'_>) -> String {
        let mut lines = Vec::new();
        if !view.preamble.is_empty() {
            lines.push(view.preamble.to_string());
            lines.push(String::new());
        }
        lines.push("¡Listo! Aquí tienes el presupuesto para tu producto: ✨".to_string());
        lines.push(String::new());
        lines.push(format!("Especificaciones: {}", view.description));
        lines.push(String::new());
        lines.push(format!("Costo de Elaboración: {}", view.formatted_cost));
        lines.push(format!("Precio Venta Sugerido: {}", view.formatted_price));
        if let Some(disclaimer) = view.disclaimer {
            lines.push(String::new());
            lines.push(disclaimer.to_string());
        }
        if let Some(contact) = &self.contact {
            lines.push(String::new());
            lines.push(format!(
                "Si está todo bien, o si quieres cotizar otro producto, escríbenos: {}",
                contact.with_text(view.description)
            ));
        }
        lines.join("\n")
    }
}

fn log_render_failure(template: &str, failure: &tera::Error) {
    error!(
        event_name = "quotation.response.render_failed",
        template = %template,
        error = %failure,
        "reply template failed to render, using plain-text layout"
    );
}

/// Tera filter: percent-encodes a string as a URL query component.
fn urlencode_component_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let text = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("urlencode_component filter expects a string input"))?;
    Ok(tera::Value::String(percent_encode(text)))
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
pub fn percent_encode(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len() * 3);
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(char::from(byte))
            }
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}
