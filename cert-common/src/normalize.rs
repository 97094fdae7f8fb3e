//! Normalization of backend records at the network boundary.
//!
//! The backend is fed from spreadsheets whose column names drifted over time, so the same
//! field can arrive under several keys, as a string or as a number. Everything past this
//! module only ever sees the canonical field.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

pub const FULL_NAME: &[&str] = &[
    "NOMBRE COMPLETO DEL CLIENTE",
    "NOMBRE COMPLETO",
    "NOMBRES",
    "nombres",
    "nombre_completo",
];
pub const SUBJECT_KEY: &[&str] = &["DNI DEL CLIENTE", "DNI", "dni"];
pub const PHONE: &[&str] = &["CELULAR DEL CLIENTE", "TELEFONO", "telefono"];
pub const EMAIL: &[&str] = &["CORREO DEL CLIENTE", "EMAIL", "email"];
pub const CODE: &[&str] = &["codigo", "CODIGO"];
pub const FIRST_NAMES: &[&str] = &["nombres", "NOMBRES"];
pub const LAST_NAMES: &[&str] = &["apellidos", "APELLIDOS"];
pub const COURSE: &[&str] = &["curso", "CURSO", "P. CERTIFICADO"];
pub const ISSUE_DATE: &[&str] = &[
    "fecha_emision",
    "FECHA EMISION",
    "FECHA EMISIÓN",
    "F. EMISIÓN",
];
pub const HOURS: &[&str] = &["horas", "HORAS"];
pub const STATUS: &[&str] = &["estado", "ESTADO"];

/// Renders a scalar as text. Strings are trimmed, integers lose any `.0`, nulls and
/// containers have no text.
pub fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    Some(text)
}

/// First non-empty text among `aliases`, in priority order.
pub fn first_text(record: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|key| record.get(*key))
        .filter_map(as_text)
        .find(|text| !text.is_empty())
}

/// Like [`first_text`], defaulting to the empty string.
pub fn text_or_empty(record: &Map<String, Value>, aliases: &[&str]) -> String {
    first_text(record, aliases).unwrap_or_default()
}

/// Serde helper accepting a string, a number or null where a string is expected.
pub fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_text(&value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn first_alias_wins() {
        let rec = record(json!({
            "nombres": "Ana",
            "NOMBRE COMPLETO DEL CLIENTE": "Ana María Quispe",
        }));
        assert_eq!(
            first_text(&rec, FULL_NAME).as_deref(),
            Some("Ana María Quispe")
        );
    }

    #[test]
    fn empty_aliases_fall_through() {
        let rec = record(json!({
            "DNI DEL CLIENTE": "",
            "DNI": null,
            "dni": 12345678,
        }));
        assert_eq!(first_text(&rec, SUBJECT_KEY).as_deref(), Some("12345678"));
    }

    #[test]
    fn numbers_render_without_fraction() {
        assert_eq!(as_text(&json!(120)).as_deref(), Some("120"));
        assert_eq!(as_text(&json!(120.0)).as_deref(), Some("120"));
        assert_eq!(as_text(&json!(1.5)).as_deref(), Some("1.5"));
        assert_eq!(as_text(&json!("  40 ")).as_deref(), Some("40"));
        assert_eq!(as_text(&json!(null)), None);
    }

    #[test]
    fn missing_everything_is_empty() {
        let rec = record(json!({"otra": "cosa"}));
        assert_eq!(first_text(&rec, PHONE), None);
        assert_eq!(text_or_empty(&rec, PHONE), "");
    }
}
