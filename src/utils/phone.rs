//! Normalização de telefones brasileiros
//!
//! Todo telefone que sai daqui é `55` + DDD (2 dígitos) + número (8 ou 9
//! dígitos), só dígitos: `^55\d{10,11}$`. Qualquer coisa fora disso é
//! rejeitada (`None`), nunca "consertada" no chute.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Código do Brasil
pub const COUNTRY_CODE: &str = "55";

/// Remove tudo que não for dígito ASCII
///
/// # Exemplos
/// ```
/// use yampi_upsell_bot::utils::phone::to_digits;
///
/// assert_eq!(to_digits("+55 (11) 98888-7777"), "5511988887777");
/// assert_eq!(to_digits("sem número"), "");
/// ```
pub fn to_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Regras ajustáveis da normalização
///
/// Fixo vs. celular (10 vs. 11 dígitos nacionais) e a detecção de `55`
/// duplicado variam entre integrações; por isso são configuráveis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationPolicy {
    /// Aceita fixo (DDD + 8 dígitos)
    pub accept_fixed_line: bool,
    /// Remove zeros à esquerda (prefixo de tronco `0`, discagem `00`)
    pub strip_trunk_zero: bool,
    /// Colapsa `5555...` quando o resultado passaria de 13 dígitos
    pub collapse_duplicate_country_code: bool,
}

impl Default for NormalizationPolicy {
    fn default() -> Self {
        Self {
            accept_fixed_line: true,
            strip_trunk_zero: true,
            collapse_duplicate_country_code: true,
        }
    }
}

/// Telefone canônico (`55` + DDD + número)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CanonicalPhone(String);

impl CanonicalPhone {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identificador de destino no transporte (`5511988887777@c.us`)
    pub fn to_jid(&self, suffix: &str) -> wpp::Jid {
        wpp::Jid::new(self.0.clone(), suffix)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalPhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_canonical(digits: &str) -> bool {
    let national = match digits.strip_prefix(COUNTRY_CODE) {
        Some(rest) => rest,
        None => return false,
    };

    (10..=11).contains(&national.len()) && national.bytes().all(|b| b.is_ascii_digit())
}

/// Normaliza um candidato bruto para `CanonicalPhone`
///
/// # Exemplos
/// ```
/// use yampi_upsell_bot::utils::phone::{normalize, NormalizationPolicy};
///
/// let policy = NormalizationPolicy::default();
/// assert_eq!(normalize("(11) 98888-7777", &policy).unwrap().as_str(), "5511988887777");
/// assert!(normalize("98888-7777", &policy).is_none());
/// ```
pub fn normalize(raw: &str, policy: &NormalizationPolicy) -> Option<CanonicalPhone> {
    let mut digits = to_digits(raw);

    if policy.strip_trunk_zero {
        let zeros = digits.len() - digits.trim_start_matches('0').len();
        digits.drain(..zeros);
    }

    if digits.is_empty() {
        return None;
    }

    let duplicated = format!("{}{}", COUNTRY_CODE, COUNTRY_CODE);
    if policy.collapse_duplicate_country_code {
        while digits.len() > 13 && digits.starts_with(&duplicated) {
            digits.drain(..COUNTRY_CODE.len());
        }
    }

    let candidate = match digits.len() {
        12 | 13 if digits.starts_with(COUNTRY_CODE) => digits,
        10 | 11 => format!("{}{}", COUNTRY_CODE, digits),
        12 | 13 => {
            tracing::warn!(
                "Telefone ambíguo ({} dígitos sem código 55), descartado: {}",
                digits.len(),
                digits
            );
            return None;
        }
        _ => return None,
    };

    if candidate.len() == 12 && !policy.accept_fixed_line {
        return None;
    }

    is_canonical(&candidate).then(|| CanonicalPhone(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn norm(raw: &str) -> Option<String> {
        normalize(raw, &NormalizationPolicy::default()).map(CanonicalPhone::into_string)
    }

    #[test]
    fn test_accepts_numbers_with_country_code() {
        assert_eq!(norm("+55 11 98888-7777").as_deref(), Some("5511988887777"));
        assert_eq!(norm("55 (31) 3222-1100").as_deref(), Some("553132221100"));
    }

    #[test]
    fn test_prepends_country_code_to_national_numbers() {
        assert_eq!(norm("(11) 98888-7777").as_deref(), Some("5511988887777"));
        assert_eq!(norm("3132221100").as_deref(), Some("553132221100"));
        // DDD 55 (RS) sem código do país
        assert_eq!(norm("55 99123-4567").as_deref(), Some("5555991234567"));
    }

    #[test]
    fn test_drops_trunk_zero() {
        assert_eq!(norm("0 11 98888-7777").as_deref(), Some("5511988887777"));
        assert_eq!(norm("00 55 11 98888-7777").as_deref(), Some("5511988887777"));
    }

    #[test]
    fn test_collapses_duplicated_country_code() {
        assert_eq!(norm("+55 55 11 98888-7777").as_deref(), Some("5511988887777"));
        assert_eq!(norm("555555 11 98888-7777").as_deref(), Some("5511988887777"));
    }

    #[test]
    fn test_rejects_short_and_ambiguous_numbers() {
        assert_eq!(norm("12345678"), None);
        assert_eq!(norm("988887777"), None);
        assert_eq!(norm(""), None);
        assert_eq!(norm("abc"), None);
        // 13 dígitos com outro código de país
        assert_eq!(norm("1415555123456"), None);
    }

    #[test]
    fn test_canonical_numbers_pass_through_unchanged() {
        // Só o formato conta: DDD começando com zero continua canônico
        assert_eq!(norm("5501198888777").as_deref(), Some("5501198888777"));
        assert_eq!(norm("550119888877").as_deref(), Some("550119888877"));
    }

    #[test]
    fn test_fixed_line_policy() {
        let mobile_only = NormalizationPolicy {
            accept_fixed_line: false,
            ..NormalizationPolicy::default()
        };

        assert!(normalize("3132221100", &mobile_only).is_none());
        assert!(normalize("553132221100", &mobile_only).is_none());
        assert!(normalize("31998444969", &mobile_only).is_some());
    }

    #[test]
    fn test_duplicate_collapse_can_be_disabled() {
        let strict = NormalizationPolicy {
            collapse_duplicate_country_code: false,
            ..NormalizationPolicy::default()
        };

        assert!(normalize("+55 55 11 98888-7777", &strict).is_none());
    }

    #[test]
    fn test_normalization_is_idempotent_on_canonical_numbers() {
        let mut rng = rand::thread_rng();
        let policy = NormalizationPolicy::default();

        for _ in 0..500 {
            let area: u32 = rng.gen_range(0..=99);
            let subscriber_len = if rng.gen_bool(0.5) { 8 } else { 9 };
            let subscriber: String = (0..subscriber_len)
                .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
                .collect();
            let canonical = format!("55{:02}{}", area, subscriber);

            let once = normalize(&canonical, &policy).expect("canônico deve ser aceito");
            assert_eq!(once.as_str(), canonical);
            assert_eq!(normalize(once.as_str(), &policy), Some(once));
        }
    }

    #[test]
    fn test_canonical_to_jid() {
        let phone = normalize("+55 (31) 99844-4969", &NormalizationPolicy::default()).unwrap();
        assert_eq!(phone.to_jid("c.us").to_string(), "5531998444969@c.us");
    }
}
