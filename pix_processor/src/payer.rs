use pix_common::helpers::digits_only;

use crate::data_objects::{Identification, Payer, DEFAULT_CPF};

const DEFAULT_NAME: &str = "Cliente";

/// Whatever the storefront told us about the customer. All fields are optional.
#[derive(Debug, Clone, Default)]
pub struct PayerHints {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub cpf: Option<String>,
}

/// Builds the payer block for a charge.
///
/// The processor insists on a payer e-mail for PIX charges, but customers are never asked for one. When no real
/// address is supplied, one is derived from the customer's first name and phone number, e.g.
/// `joao.11987654321@<domain>`. If there are no phone digits, the last 9 digits of `now_millis` are used instead.
pub fn synthesize_payer(hints: &PayerHints, email_domain: &str, now_millis: i64) -> Payer {
    let cleaned = fold_diacritics(hints.name.as_deref().unwrap_or_default());
    let mut parts = cleaned.split_whitespace();
    let first_name = parts.next().unwrap_or_default().to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    let last_name = if rest.is_empty() { DEFAULT_NAME.to_string() } else { rest };

    let mut phone_digits = digits_only(hints.phone.as_deref().unwrap_or_default());
    if phone_digits.is_empty() {
        let millis = now_millis.unsigned_abs().to_string();
        phone_digits = millis[millis.len().saturating_sub(9)..].to_string();
    }
    let mut local_part =
        first_name.to_lowercase().chars().filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit()).collect::<String>();
    if local_part.is_empty() {
        local_part = DEFAULT_NAME.to_lowercase();
    }
    let email = match hints.email.as_deref().map(str::trim) {
        Some(e) if !e.is_empty() => e.to_string(),
        _ => format!("{local_part}.{phone_digits}@{email_domain}"),
    };

    let cpf = digits_only(hints.cpf.as_deref().unwrap_or_default());
    let number = if cpf.is_empty() { DEFAULT_CPF.to_string() } else { cpf };
    let first_name = if first_name.is_empty() { DEFAULT_NAME.to_string() } else { first_name };
    Payer { first_name, last_name, email, identification: Identification { id_type: "CPF".into(), number } }
}

/// Strips the accents that show up in Portuguese names, e.g. "João Conceição" -> "Joao Conceicao".
pub fn fold_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ý' | 'ÿ' => 'y',
            'Ý' => 'Y',
            c => c,
        })
        .collect()
}
