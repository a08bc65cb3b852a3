/// Phone Resolver: encontra o telefone do cliente em qualquer JSON de webhook
///
/// Estratégias, da mais precisa para a mais solta:
/// 1. Campos conhecidos (JSON pointers), incluindo `phone=` de links do WhatsApp
/// 2. Junção DDD + número quando o payload separa os dois
/// 3. Telefone brasileiro com máscara (`+55`, parênteses ou separadores)
///    no documento serializado
/// 4. Qualquer sequência de 10 ou 11 dígitos
/// 5. Varredura profunda de todas as strings
///
/// Uma estratégia só "ganha" se algum candidato dela normalizar; senão a
/// próxima é tentada. Nunca entra em pânico, qualquer falha vira `None`.
///
/// Exemplo:
/// ```
/// use serde_json::json;
/// use yampi_upsell_bot::services::PhoneResolver;
///
/// let resolver = PhoneResolver::default();
/// let doc = json!({"phone": "988887777", "area_code": "11"});
/// assert_eq!(resolver.resolve(&doc).unwrap().as_str(), "5511988887777");
/// ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::settings::PhoneSettings;
use crate::utils::logging::log_phone_resolved;
use crate::utils::phone::{normalize, to_digits, CanonicalPhone, NormalizationPolicy};

/// Telefone brasileiro com máscara: +55, DDD entre parênteses, prefixo e sufixo
static BR_PHONE_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)((?:\+?55[\s.-]*)?\(?\d{2}\)?[\s.-]*\d{4,5}[\s.-]*\d{4})(?:\D|$)").ok()
});

static DIGIT_RUN_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?:^|\D)(\d{10,11})(?:\D|$)").ok());

/// Mínimo de dígitos seguidos para um campo conhecido valer como telefone
const MIN_FIELD_DIGITS: usize = 8;

const DEFAULT_FIELD_PROBES: &[(&str, ProbeKind)] = &[
    ("/customer/phone/full_number", ProbeKind::Value),
    ("/customer/phone/number", ProbeKind::Value),
    ("/customer/phone", ProbeKind::Value),
    ("/customer/data/phone/full_number", ProbeKind::Value),
    ("/customer/data/phone/number", ProbeKind::Value),
    ("/customer_phone", ProbeKind::Value),
    ("/spreadsheet/data/customer_phone", ProbeKind::Value),
    ("/tracking_data/phone", ProbeKind::Value),
    ("/whatsapp_link", ProbeKind::PhoneQueryParam),
    ("/resource/customer/data/phone/full_number", ProbeKind::Value),
    ("/resource/customer/data/phone/number", ProbeKind::Value),
    ("/resource/customer/data/phone", ProbeKind::Value),
    ("/resource/customer/phone", ProbeKind::Value),
    ("/resource/tracking_data/phone", ProbeKind::Value),
    ("/resource/whatsapp_link", ProbeKind::PhoneQueryParam),
    ("/phone", ProbeKind::Value),
];

const DEFAULT_AREA_CODE_PROBES: &[&str] = &[
    "/customer/phone/area_code",
    "/customer/data/phone/area_code",
    "/resource/customer/data/phone/area_code",
    "/resource/customer/phone/area_code",
    "/area_code",
];

/// Fragmento do documento que parece um telefone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneCandidate {
    pub raw: String,
    /// Onde foi encontrado (só diagnóstico)
    pub source: String,
    /// DDD exposto separadamente no documento
    pub area_code: Option<String>,
}

impl PhoneCandidate {
    pub fn new(raw: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            source: source.into(),
            area_code: None,
        }
    }

    pub fn with_area_code(mut self, area_code: Option<String>) -> Self {
        self.area_code = area_code;
        self
    }

    /// DDD + número, quando o candidato é só o número do assinante
    pub fn stitched_digits(&self) -> Option<String> {
        let area_code = self.area_code.as_deref()?;
        let digits = to_digits(&self.raw);
        (8..=9)
            .contains(&digits.len())
            .then(|| format!("{}{}", area_code, digits))
    }
}

/// Estratégia de busca de candidato
pub trait CandidateFinder: Send + Sync {
    fn name(&self) -> &'static str;

    fn find(&self, document: &Value) -> Option<PhoneCandidate>;

    /// Todos os candidatos, na ordem em que devem ser tentados
    fn find_all(&self, document: &Value) -> Vec<PhoneCandidate> {
        self.find(document).into_iter().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// O próprio valor (string ou número)
    Value,
    /// Parâmetro `phone=` de uma URL
    PhoneQueryParam,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProbe {
    pub pointer: String,
    pub kind: ProbeKind,
}

impl FieldProbe {
    /// Aceita JSON pointer (`/a/b`) ou caminho com pontos (`a.b`)
    pub fn new(path: &str, kind: ProbeKind) -> Self {
        let pointer = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path.replace('.', "/"))
        };
        Self { pointer, kind }
    }

    fn read(&self, document: &Value) -> Option<String> {
        let text = scalar_text(document.pointer(&self.pointer)?)?;
        match self.kind {
            ProbeKind::Value => Some(text),
            ProbeKind::PhoneQueryParam => phone_query_param(&text),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Lê o `phone=` de links tipo `https://wa.me/?phone=5511...&text=...`
fn phone_query_param(link: &str) -> Option<String> {
    let query = link.split_once('?').map(|(_, q)| q).unwrap_or(link);
    query
        .split(['&', '#'])
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "phone")
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
}

/// `min` dígitos seguidos, tolerando separadores comuns de telefone
fn has_digit_run(text: &str, min: usize) -> bool {
    let mut run = 0;
    for c in text.chars() {
        if c.is_ascii_digit() {
            run += 1;
            if run >= min {
                return true;
            }
        } else if !matches!(c, ' ' | '-' | '.' | '(' | ')' | '+' | '/') {
            run = 0;
        }
    }
    false
}

/// Estratégia 1: campos conhecidos, na ordem de confiabilidade
pub struct FieldProbeFinder {
    probes: Vec<FieldProbe>,
    area_code_probes: Vec<String>,
}

impl FieldProbeFinder {
    pub fn new(probes: Vec<FieldProbe>, area_code_probes: Vec<String>) -> Self {
        Self {
            probes,
            area_code_probes,
        }
    }

    /// Campos extras vêm antes dos padrões
    pub fn with_extra_paths(extra_paths: &[String]) -> Self {
        let mut probes: Vec<FieldProbe> = extra_paths
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| {
                let kind = if p.ends_with("link") {
                    ProbeKind::PhoneQueryParam
                } else {
                    ProbeKind::Value
                };
                FieldProbe::new(p, kind)
            })
            .collect();
        probes.extend(
            DEFAULT_FIELD_PROBES
                .iter()
                .map(|(pointer, kind)| FieldProbe::new(pointer, *kind)),
        );

        Self::new(
            probes,
            DEFAULT_AREA_CODE_PROBES.iter().map(|p| p.to_string()).collect(),
        )
    }

    fn area_code(&self, document: &Value) -> Option<String> {
        self.area_code_probes.iter().find_map(|pointer| {
            let digits = to_digits(&scalar_text(document.pointer(pointer)?)?);
            (!digits.is_empty()).then_some(digits)
        })
    }
}

impl Default for FieldProbeFinder {
    fn default() -> Self {
        Self::with_extra_paths(&[])
    }
}

impl CandidateFinder for FieldProbeFinder {
    fn name(&self) -> &'static str {
        "field_probe"
    }

    fn find(&self, document: &Value) -> Option<PhoneCandidate> {
        let (probe, raw) = self.probes.iter().find_map(|probe| {
            let text = probe.read(document)?;
            has_digit_run(&text, MIN_FIELD_DIGITS).then(|| (probe, text))
        })?;

        Some(PhoneCandidate::new(raw, probe.pointer.clone()).with_area_code(self.area_code(document)))
    }
}

/// Estratégia 3: telefone com máscara brasileira em qualquer lugar do documento
#[derive(Debug, Default)]
pub struct BrazilianPatternFinder;

impl CandidateFinder for BrazilianPatternFinder {
    fn name(&self) -> &'static str {
        "br_pattern"
    }

    fn find(&self, document: &Value) -> Option<PhoneCandidate> {
        self.find_all(document).into_iter().next()
    }

    /// Só trechos com máscara; sequências nuas ficam para o `DigitRunFinder`
    fn find_all(&self, document: &Value) -> Vec<PhoneCandidate> {
        let (Some(re), Ok(text)) = (BR_PHONE_RE.as_ref(), serde_json::to_string(document)) else {
            return Vec::new();
        };
        re.captures_iter(&text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|raw| !raw.bytes().all(|b| b.is_ascii_digit()) && to_digits(raw).len() >= 10)
            .map(|raw| PhoneCandidate::new(raw, "documento serializado"))
            .collect()
    }
}

/// Estratégia 4: sequência solta de 10 ou 11 dígitos (DDD + número)
#[derive(Debug, Default)]
pub struct DigitRunFinder;

impl CandidateFinder for DigitRunFinder {
    fn name(&self) -> &'static str {
        "digit_run"
    }

    fn find(&self, document: &Value) -> Option<PhoneCandidate> {
        self.find_all(document).into_iter().next()
    }

    fn find_all(&self, document: &Value) -> Vec<PhoneCandidate> {
        let (Some(re), Ok(text)) = (DIGIT_RUN_RE.as_ref(), serde_json::to_string(document)) else {
            return Vec::new();
        };
        re.captures_iter(&text)
            .filter_map(|caps| caps.get(1))
            .map(|m| PhoneCandidate::new(m.as_str(), "sequência de dígitos"))
            .collect()
    }
}

/// Estratégia 5: primeira string com 10 a 13 dígitos, em profundidade
///
/// Percorre com pilha explícita para aguentar documentos muito aninhados.
#[derive(Debug, Default)]
pub struct DeepStringFinder;

impl CandidateFinder for DeepStringFinder {
    fn name(&self) -> &'static str {
        "deep_scan"
    }

    fn find(&self, document: &Value) -> Option<PhoneCandidate> {
        let mut stack: Vec<(&Value, String)> = vec![(document, String::new())];

        while let Some((value, path)) = stack.pop() {
            match value {
                Value::String(s) => {
                    if (10..=13).contains(&to_digits(s).len()) {
                        let source = if path.is_empty() { "/".to_string() } else { path };
                        return Some(PhoneCandidate::new(s.clone(), source));
                    }
                }
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate().rev() {
                        stack.push((item, format!("{}/{}", path, index)));
                    }
                }
                Value::Object(map) => {
                    let children: Vec<_> = map.iter().collect();
                    for (key, item) in children.into_iter().rev() {
                        stack.push((item, format!("{}/{}", path, key)));
                    }
                }
                _ => {}
            }
        }

        None
    }
}

/// Pipeline de estratégias + normalização
pub struct PhoneResolver {
    finders: Vec<Box<dyn CandidateFinder>>,
    policy: NormalizationPolicy,
}

impl PhoneResolver {
    pub fn new(policy: NormalizationPolicy) -> Self {
        Self::with_extra_paths(policy, &[])
    }

    pub fn from_settings(settings: &PhoneSettings) -> Self {
        Self::with_extra_paths(settings.policy(), &settings.extra_field_paths)
    }

    fn with_extra_paths(policy: NormalizationPolicy, extra_paths: &[String]) -> Self {
        Self::with_finders(
            vec![
                Box::new(FieldProbeFinder::with_extra_paths(extra_paths)),
                Box::new(BrazilianPatternFinder),
                Box::new(DigitRunFinder),
                Box::new(DeepStringFinder),
            ],
            policy,
        )
    }

    /// Ordem das estratégias = ordem do vetor
    pub fn with_finders(finders: Vec<Box<dyn CandidateFinder>>, policy: NormalizationPolicy) -> Self {
        Self { finders, policy }
    }

    pub fn strategies(&self) -> Vec<&'static str> {
        self.finders.iter().map(|f| f.name()).collect()
    }

    pub fn resolve(&self, document: &Value) -> Option<CanonicalPhone> {
        for finder in &self.finders {
            for candidate in finder.find_all(document) {
                match self.normalize_found(&candidate) {
                    Some(phone) => {
                        log_phone_resolved(finder.name(), &candidate.source, &phone);
                        return Some(phone);
                    }
                    None => tracing::debug!(
                        "Candidato '{}' de {} ({}) não normalizou",
                        candidate.raw,
                        finder.name(),
                        candidate.source
                    ),
                }
            }
        }

        tracing::debug!("Nenhuma estratégia encontrou telefone válido");
        None
    }

    /// Normaliza candidatos vindos de fora do documento (ex.: oráculo de IA)
    pub fn normalize_candidate(&self, raw: &str) -> Option<CanonicalPhone> {
        normalize(raw, &self.policy)
    }

    fn normalize_found(&self, candidate: &PhoneCandidate) -> Option<CanonicalPhone> {
        match candidate.stitched_digits() {
            Some(stitched) => normalize(&stitched, &self.policy),
            None => normalize(&candidate.raw, &self.policy),
        }
    }
}

impl Default for PhoneResolver {
    fn default() -> Self {
        Self::new(NormalizationPolicy::default())
    }
}
