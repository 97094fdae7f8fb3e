use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalize::{self, first_text, lenient_text, text_or_empty};

/// A course mention: the reference option a certificate is issued against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    #[serde(deserialize_with = "lenient_text")]
    pub nro: String,
    #[serde(rename = "especialidad", default, deserialize_with = "lenient_text")]
    pub specialty: String,
    /// Course name as printed on the certificate.
    #[serde(rename = "p_certificado", default, deserialize_with = "lenient_text")]
    pub certificate_title: String,
    #[serde(rename = "mencion", default, deserialize_with = "lenient_text")]
    pub mention: String,
    #[serde(rename = "horas", default, deserialize_with = "lenient_text")]
    pub hours: String,
    #[serde(rename = "f_inicio", default, deserialize_with = "lenient_text")]
    pub start_date: String,
    #[serde(rename = "f_termino", default, deserialize_with = "lenient_text")]
    pub end_date: String,
    #[serde(rename = "f_emision", default, deserialize_with = "lenient_text")]
    pub issue_date: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MentionList {
    #[serde(default)]
    pub menciones: Vec<Mention>,
}

/// The person a certificate is issued to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct Subject {
    pub subject_key: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl From<Map<String, Value>> for Subject {
    fn from(record: Map<String, Value>) -> Self {
        Subject {
            subject_key: text_or_empty(&record, normalize::SUBJECT_KEY),
            full_name: text_or_empty(&record, normalize::FULL_NAME),
            phone: first_text(&record, normalize::PHONE),
            email: first_text(&record, normalize::EMAIL),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CertificateStatus {
    #[default]
    Valid,
    Annulled,
    Other(String),
}

impl CertificateStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CertificateStatus::Valid => "VALIDO",
            CertificateStatus::Annulled => "ANULADO",
            CertificateStatus::Other(other) => other,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, CertificateStatus::Valid)
    }
}

impl From<&str> for CertificateStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "" | "VALIDO" | "VÁLIDO" => CertificateStatus::Valid,
            "ANULADO" => CertificateStatus::Annulled,
            _ => CertificateStatus::Other(value.trim().to_string()),
        }
    }
}

impl Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for CertificateStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A certificate as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct Certificate {
    pub code: String,
    pub first_names: String,
    pub last_names: String,
    pub subject_key: Option<String>,
    pub course: String,
    pub issue_date: String,
    pub hours: Option<String>,
    pub status: CertificateStatus,
    pub pdf_url: Option<String>,
    pub verify_url: Option<String>,
}

impl From<Map<String, Value>> for Certificate {
    fn from(record: Map<String, Value>) -> Self {
        let mut first_names = text_or_empty(&record, normalize::FIRST_NAMES);
        let mut last_names = text_or_empty(&record, normalize::LAST_NAMES);
        if first_names.is_empty() && last_names.is_empty() {
            // Rows from the QR sheet only carry a single full-name column
            if let Some(full_name) = first_text(&record, normalize::FULL_NAME) {
                match full_name.split_once(' ') {
                    Some((first, rest)) => {
                        first_names = first.to_string();
                        last_names = rest.trim().to_string();
                    }
                    None => first_names = full_name,
                }
            }
        }

        Certificate {
            code: text_or_empty(&record, normalize::CODE),
            first_names,
            last_names,
            subject_key: first_text(&record, normalize::SUBJECT_KEY),
            course: text_or_empty(&record, normalize::COURSE),
            issue_date: text_or_empty(&record, normalize::ISSUE_DATE),
            hours: first_text(&record, normalize::HOURS),
            status: CertificateStatus::from(text_or_empty(&record, normalize::STATUS).as_str()),
            pdf_url: first_text(&record, &["pdf_url"]),
            verify_url: first_text(&record, &["verify_url"]),
        }
    }
}

impl Certificate {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_names, self.last_names)
            .trim()
            .to_string()
    }

    /// Case-insensitive match on code, names and course, as used by the panel's search box.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        [
            &self.code,
            &self.first_names,
            &self.last_names,
            &self.course,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&term))
    }
}

/// Filters a certificate listing by a free-text search term.
pub fn filter_certificates<'a>(
    certificates: &'a [Certificate],
    term: &str,
) -> Vec<&'a Certificate> {
    certificates.iter().filter(|c| c.matches(term)).collect()
}

/// Backend answer for single-certificate endpoints (`found` plus the certificate fields).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct Lookup {
    pub certificate: Option<Certificate>,
}

impl From<Map<String, Value>> for Lookup {
    fn from(record: Map<String, Value>) -> Self {
        let found = record
            .get("found")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        Lookup {
            certificate: found.then(|| Certificate::from(record)),
        }
    }
}

/// Body of a certificate creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateCertificate {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "nombres")]
    pub first_names: String,
    #[serde(rename = "apellidos")]
    pub last_names: String,
    #[serde(rename = "dni")]
    pub subject_key: Option<String>,
    #[serde(rename = "curso")]
    pub course: String,
    #[serde(rename = "fecha_emision")]
    pub issue_date: String,
    #[serde(rename = "horas")]
    pub hours: Option<String>,
    #[serde(rename = "estado")]
    pub status: CertificateStatus,
    #[serde(rename = "nombre_completo", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnnulRequest<'a> {
    #[serde(rename = "motivo")]
    pub reason: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SearchRequest<'a> {
    #[serde(rename = "codigo")]
    pub code: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: String,
    pub role: String,
    pub email: String,
}
