use anyhow::{anyhow, Result};
use serde::Deserialize;

pub const MAX_TITLE_LEN: usize = 120;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_WINNERS: i64 = 100;
pub const MAX_FIELD_LEN: usize = 64;

/// A form value the web app may send either as a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.trim().to_string(),
        }
    }
}

pub fn validate_title(title: Option<&str>) -> Result<String> {
    let title = title.map(str::trim).unwrap_or_default();

    if title.is_empty() {
        return Err(anyhow!("Title cannot be empty"));
    }

    if title.chars().count() > MAX_TITLE_LEN {
        return Err(anyhow!("Title cannot be longer than {} characters", MAX_TITLE_LEN));
    }

    if title.contains('\n') || title.contains('\r') {
        return Err(anyhow!("Title cannot contain line breaks"));
    }

    Ok(title.to_string())
}

/// Blank descriptions are stored as absent.
pub fn validate_description(description: Option<&str>) -> Result<Option<String>> {
    match description.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(anyhow!(
            "Description cannot be longer than {} characters",
            MAX_DESCRIPTION_LEN
        )),
        Some(d) => Ok(Some(d.to_string())),
        None => Ok(None),
    }
}

/// Defaults to a single winner.
pub fn validate_winners_count(count: Option<i64>) -> Result<i64> {
    let count = count.unwrap_or(1);

    if count < 1 {
        return Err(anyhow!("Number of winners must be at least 1"));
    }

    if count > MAX_WINNERS {
        return Err(anyhow!("Number of winners cannot exceed {}", MAX_WINNERS));
    }

    Ok(count)
}

/// Prize descriptions in place order; there cannot be more prizes than places.
pub fn validate_prizes(prizes: &[String], winners_count: i64) -> Result<Vec<String>> {
    let prizes: Vec<String> = prizes.iter().map(|p| p.trim().to_string()).collect();

    if prizes.iter().any(String::is_empty) {
        return Err(anyhow!("Prize descriptions cannot be empty"));
    }

    if prizes.len() as i64 > winners_count {
        return Err(anyhow!(
            "{} prizes given but only {} winner place(s)",
            prizes.len(),
            winners_count
        ));
    }

    Ok(prizes)
}

pub fn validate_user_id(user_id: Option<i64>) -> Result<i64> {
    match user_id {
        None => Err(anyhow!("user_id is required")),
        // Telegram user ids are always positive
        Some(id) if id <= 0 => Err(anyhow!("Invalid user_id {}", id)),
        Some(id) => Ok(id),
    }
}

/// Required, non-empty, reasonably short free-text field.
pub fn validate_required_field(name: &str, value: Option<&FieldValue>) -> Result<String> {
    let value = value.map(FieldValue::as_text).unwrap_or_default();

    if value.is_empty() {
        return Err(anyhow!("{} is required", name));
    }

    if value.chars().count() > MAX_FIELD_LEN {
        return Err(anyhow!("{} cannot be longer than {} characters", name, MAX_FIELD_LEN));
    }

    Ok(value)
}

/// Optional whole number sent either as a JSON number or as text.
pub fn parse_optional_int(name: &str, value: Option<&FieldValue>) -> Result<Option<i64>> {
    match value.map(FieldValue::as_text).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a whole number", name)),
        None => Ok(None),
    }
}

pub fn validate_age(value: Option<&FieldValue>) -> Result<i64> {
    let raw = validate_required_field("age", value)?;
    let age: i64 = raw.parse().map_err(|_| anyhow!("age must be a whole number"))?;

    if !(1..=120).contains(&age) {
        return Err(anyhow!("age must be between 1 and 120"));
    }

    Ok(age)
}
