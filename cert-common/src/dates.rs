use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

fn long_form() -> &'static Regex {
    static LONG_FORM: OnceLock<Regex> = OnceLock::new();
    // "11 de julio del 2025", "3 de marzo de 2024"
    LONG_FORM.get_or_init(|| {
        Regex::new(r"(?i)(\d{1,2})\s+de\s+(\w+)\s+del?\s+(\d{4})").expect("date regex is valid")
    })
}

/// Parses an issue date as written in the mentions sheet, either ISO or in Spanish long form.
pub fn parse_issue_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }

    let caps = long_form().captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month_name = caps[2].to_lowercase();
    // "setiembre" is the common Peruvian spelling
    let month_name = if month_name == "setiembre" {
        "septiembre".to_string()
    } else {
        month_name
    };
    let month = MONTHS.iter().position(|m| *m == month_name)? as u32 + 1;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// ISO rendering of [`parse_issue_date`], or `None` if the text is not a date.
pub fn normalize_issue_date(text: &str) -> Option<String> {
    parse_issue_date(text).map(|date| date.format("%Y-%m-%d").to_string())
}

pub fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}
