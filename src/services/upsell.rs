use serde_json::Value;

use crate::config::settings::OfferSettings;
use ia_service::OracleExtraction;

const DEFAULT_FIRST_NAME: &str = "cliente";
const DEFAULT_ORDER_ID: &str = "seu pedido";

/// Texto padrão da oferta. Placeholders: {nome}, {pedido}, {cupom}, {site}
pub const DEFAULT_TEMPLATE: &str = "Olá *{nome}*, seu pedido *{pedido}* foi confirmado! 💚

Que bom ter você com a gente 😍 Separamos um *presente especial* para quem quer levar mais peças:

Inclua *mais itens no seu pedido* com um *super desconto* e eles seguem *no mesmo frete* 🎁

Use o *cupom {cupom}* ao finalizar. Vale em todo o site, *sem limite de itens* e só *até o fim do dia*.

👉 {site}";

const FIRST_NAME_POINTERS: &[&str] = &[
    "/customer/first_name",
    "/customer/data/first_name",
    "/resource/customer/data/first_name",
];

/// Nome completo: usa só a primeira palavra
const FULL_NAME_POINTERS: &[&str] = &["/customer/name", "/resource/customer/data/name"];

const ORDER_ID_POINTERS: &[&str] = &["/order_id", "/resource/id", "/resource/order_id", "/resource/number"];

/// Mensagem de upsell pronta para envio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsellMessage {
    pub first_name: String,
    pub order_id: String,
    pub text: String,
}

impl UpsellMessage {
    pub fn from_document(document: &Value, offer: &OfferSettings) -> Self {
        Self::build(document, None, offer)
    }

    /// Campos do documento têm prioridade; o oráculo só completa lacunas
    pub fn from_document_with_hints(document: &Value, hints: &OracleExtraction, offer: &OfferSettings) -> Self {
        Self::build(document, Some(hints), offer)
    }

    fn build(document: &Value, hints: Option<&OracleExtraction>, offer: &OfferSettings) -> Self {
        let first_name = extract_first_name(document)
            .or_else(|| hints.and_then(|h| h.first_name.clone()))
            .unwrap_or_else(|| DEFAULT_FIRST_NAME.to_string());

        let order_id = extract_order_id(document)
            .or_else(|| hints.and_then(|h| h.order_id.clone()))
            .unwrap_or_else(|| DEFAULT_ORDER_ID.to_string());

        let template = offer.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
        let text = render(template, &first_name, &order_id, offer);

        Self {
            first_name,
            order_id,
            text,
        }
    }
}

/// Substitui os placeholders numa passada só: valores inseridos nunca são
/// reinterpretados como placeholders. Chaves desconhecidas ficam como estão.
fn render(template: &str, first_name: &str, order_id: &str, offer: &OfferSettings) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let value = tail.find('}').and_then(|end| {
            let replacement = match &tail[1..end] {
                "nome" => first_name,
                "pedido" => order_id,
                "cupom" => offer.coupon.as_str(),
                "site" => offer.site.as_str(),
                _ => return None,
            };
            Some((replacement, end))
        });

        match value {
            Some((replacement, end)) => {
                out.push_str(replacement);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);

    out.trim().to_string()
}

fn non_empty_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn extract_first_name(document: &Value) -> Option<String> {
    FIRST_NAME_POINTERS
        .iter()
        .find_map(|p| document.pointer(p).and_then(non_empty_text))
        .or_else(|| {
            FULL_NAME_POINTERS.iter().find_map(|p| {
                let full = document.pointer(p).and_then(non_empty_text)?;
                full.split_whitespace().next().map(str::to_string)
            })
        })
}

fn extract_order_id(document: &Value) -> Option<String> {
    ORDER_ID_POINTERS
        .iter()
        .find_map(|p| document.pointer(p).and_then(non_empty_text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_yampi_payload() {
        let doc = json!({
            "event": "order.paid",
            "resource": {
                "id": 123456,
                "customer": { "data": { "first_name": "Joana", "name": "Joana Silva" } }
            }
        });

        let message = UpsellMessage::from_document(&doc, &OfferSettings::default());
        assert_eq!(message.first_name, "Joana");
        assert_eq!(message.order_id, "123456");
        assert!(message.text.starts_with("Olá *Joana*, seu pedido *123456*"));
        assert!(message.text.contains("cupom FLZ30"));
        assert!(message.text.ends_with("www.aquafitbrasil.com"));
    }

    #[test]
    fn test_defaults_when_fields_missing() {
        let message = UpsellMessage::from_document(&json!({}), &OfferSettings::default());
        assert_eq!(message.first_name, "cliente");
        assert_eq!(message.order_id, "seu pedido");
    }

    #[test]
    fn test_first_word_of_full_name() {
        let doc = json!({ "customer": { "name": "  Maria   das Dores " }, "order_id": "A-77" });
        let message = UpsellMessage::from_document(&doc, &OfferSettings::default());
        assert_eq!(message.first_name, "Maria");
        assert_eq!(message.order_id, "A-77");
    }

    #[test]
    fn test_hints_fill_gaps_only() {
        let hints = OracleExtraction {
            phone: None,
            first_name: Some("Ana".to_string()),
            order_id: Some("999".to_string()),
        };
        let doc = json!({ "order_id": 42 });

        let message = UpsellMessage::from_document_with_hints(&doc, &hints, &OfferSettings::default());
        assert_eq!(message.first_name, "Ana");
        assert_eq!(message.order_id, "42");
    }

    #[test]
    fn test_custom_template() {
        let offer = OfferSettings {
            template: Some("Oi {nome}! Pedido {pedido}. Cupom {cupom} em {site}".to_string()),
            coupon: "VOLTA10".to_string(),
            site: "loja.example".to_string(),
            ..OfferSettings::default()
        };
        let doc = json!({ "customer": { "first_name": "Rui" }, "resource": { "number": 5 } });

        let message = UpsellMessage::from_document(&doc, &offer);
        assert_eq!(message.text, "Oi Rui! Pedido 5. Cupom VOLTA10 em loja.example");
    }

    #[test]
    fn test_placeholders_inside_values_are_kept_literal() {
        let offer = OfferSettings {
            template: Some("Oi {nome}! Pedido {pedido}. Cupom {cupom} {desconhecido}".to_string()),
            coupon: "VOLTA10".to_string(),
            ..OfferSettings::default()
        };
        let doc = json!({ "customer": { "first_name": "{cupom}" }, "order_id": "{site}" });

        let message = UpsellMessage::from_document(&doc, &offer);
        assert_eq!(message.text, "Oi {cupom}! Pedido {site}. Cupom VOLTA10 {desconhecido}");
    }
}
