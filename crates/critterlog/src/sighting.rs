//! Core sighting types for critterlog.
//!
//! This module defines the record stored for every logged wildlife
//! observation, and the loosely-typed candidate that the API accepts before
//! the server coerces it into a [`Sighting`].

use chrono::{DateTime, Local, TimeZone};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Format of the `created_at` timestamp (local server time, second precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Characters removed by the note/category trim, matching the original
/// frontend's expectations (space, tab, LF, CR, NUL, vertical tab).
const TRIM_CHARS: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0B'];

/// The kind of animal that was seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Category {
    /// Fish.
    Fish,
    /// Deer.
    Deer,
    /// Anything else.
    #[default]
    Other,
}

impl Category {
    /// Normalize free-form input into the closed set of categories.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace;
    /// anything unrecognized becomes [`Category::Other`].
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        match raw.trim_matches(TRIM_CHARS).to_lowercase().as_str() {
            "fish" => Self::Fish,
            "deer" => Self::Deer,
            _ => Self::Other,
        }
    }

    /// The wire name of this category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fish => "fish",
            Self::Deer => "deer",
            Self::Other => "other",
        }
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        Self::normalize(&raw)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logged wildlife observation.
///
/// The serialized field names are the on-disk and on-the-wire names; they
/// predate this crate and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    /// Latitude in decimal degrees.
    #[serde(rename = "lat", deserialize_with = "stored_coordinate")]
    pub latitude: f64,

    /// Longitude in decimal degrees.
    #[serde(rename = "lng", deserialize_with = "stored_coordinate")]
    pub longitude: f64,

    /// What was seen. Older records lack this field and read as `other`, as
    /// do records where it is null or not a string.
    #[serde(default, deserialize_with = "stored_category")]
    pub category: Category,

    /// Free-text note, already HTML-escaped.
    #[serde(default, deserialize_with = "stored_text")]
    pub note: String,

    /// When the sighting was logged (`YYYY-MM-DD HH:MM:SS`, server local time).
    ///
    /// Doubles as the record's key for deletion.
    #[serde(rename = "time", default, deserialize_with = "stored_text")]
    pub created_at: String,
}

impl Sighting {
    /// The identity key used by delete-by-key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.created_at
    }

    /// Check whether this sighting carries the given key.
    #[must_use]
    pub fn matches_key(&self, key: &str) -> bool {
        self.created_at == key
    }

    /// Parse `created_at` back into a local timestamp, if well-formed.
    #[must_use]
    pub fn created_at_local(&self) -> Option<DateTime<Local>> {
        let naive =
            chrono::NaiveDateTime::parse_from_str(&self.created_at, TIMESTAMP_FORMAT).ok()?;
        Local.from_local_datetime(&naive).earliest()
    }
}

/// An unvalidated sighting as submitted by a client.
///
/// Fields are kept as raw JSON values so coercion can follow the lenient
/// rules the frontend relies on (numeric strings for coordinates, any casing
/// for the category).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSighting {
    /// Raw latitude.
    #[serde(default)]
    pub lat: Option<Value>,
    /// Raw longitude.
    #[serde(default)]
    pub lng: Option<Value>,
    /// Raw category.
    #[serde(default)]
    pub category: Option<Value>,
    /// Raw note.
    #[serde(default)]
    pub note: Option<Value>,
}

impl NewSighting {
    /// Build a candidate from already-typed values.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            lat: Some(Value::from(latitude)),
            lng: Some(Value::from(longitude)),
            category: None,
            note: None,
        }
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(Value::String(category.into()));
        self
    }

    /// Set the note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(Value::String(note.into()));
        self
    }

    /// Validate and coerce this candidate into a stored [`Sighting`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a coordinate is missing or cannot be
    /// read as a finite number.
    pub fn into_sighting(self, created_at: DateTime<Local>) -> Result<Sighting> {
        let (Some(lat), Some(lng)) = (non_null(self.lat), non_null(self.lng)) else {
            return Err(Error::validation("Missing coordinates."));
        };

        let latitude = coerce_coordinate("lat", &lat)?;
        let longitude = coerce_coordinate("lng", &lng)?;

        let category = match self.category {
            Some(Value::String(raw)) => Category::normalize(&raw),
            _ => Category::Other,
        };

        let note = match self.note {
            Some(Value::String(raw)) => escape_html(raw.trim_matches(TRIM_CHARS)),
            _ => String::new(),
        };

        Ok(Sighting {
            latitude,
            longitude,
            category,
            note,
            created_at: format_timestamp(created_at),
        })
    }
}

/// Format a timestamp the way `created_at` is stored.
#[must_use]
pub fn format_timestamp<Tz: TimeZone>(at: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Escape the five HTML-significant characters.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

fn non_null(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

/// Coerce a submitted coordinate the way a loose numeric cast would: numbers
/// pass through, booleans become 1 or 0, and strings contribute their leading
/// numeric prefix (0 when there is none).
fn coerce_coordinate(field: &str, value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(leading_float(s)),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(Error::validation(format!("Invalid {field} value."))),
    }
}

/// Parse the longest numeric prefix of `raw`, after leading whitespace.
fn leading_float(raw: &str) -> f64 {
    let s = raw.trim_start_matches([' ', '\t', '\n', '\r', '\x0B', '\x0C']);
    let bytes = s.as_bytes();
    let digits_in = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = digits_in(end);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits_in(end + 1);
        if frac_digits > 0 || int_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return 0.0;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_digits = digits_in(end + 1 + sign);
        if exp_digits > 0 {
            end += 1 + sign + exp_digits;
        }
    }
    s[..end].parse().unwrap_or(0.0)
}

fn stored_coordinate<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| de::Error::custom(format!("not a coordinate: {value}")))
}

fn stored_category<'de, D>(deserializer: D) -> std::result::Result<Category, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(raw) => Category::normalize(&raw),
        _ => Category::Other,
    })
}

fn stored_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fixed_time() -> DateTime<Local> {
        let naive = NaiveDate::from_ymd_opt(2024, 11, 2)
            .unwrap()
            .and_hms_opt(6, 45, 12)
            .unwrap();
        Local.from_local_datetime(&naive).earliest().unwrap()
    }

    #[test]
    fn test_category_normalize() {
        assert_eq!(Category::normalize("FISH "), Category::Fish);
        assert_eq!(Category::normalize("\tDeer\n"), Category::Deer);
        assert_eq!(Category::normalize("other"), Category::Other);
        assert_eq!(Category::normalize("bear"), Category::Other);
        assert_eq!(Category::normalize(""), Category::Other);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::Fish.to_string(), "fish");
        assert_eq!(Category::Deer.to_string(), "deer");
        assert_eq!(Category::Other.to_string(), "other");
    }

    #[test]
    fn test_category_deserialize_unknown_is_other() {
        let cat: Category = serde_json::from_str("\"moose\"").unwrap();
        assert_eq!(cat, Category::Other);
        let cat: Category = serde_json::from_str("\"Deer\"").unwrap();
        assert_eq!(cat, Category::Deer);
    }

    #[test]
    fn test_into_sighting_concrete_scenario() {
        let sighting = NewSighting::new(46.43, -95.63)
            .with_category("deer")
            .with_note("3 bucks")
            .into_sighting(fixed_time())
            .unwrap();

        assert_eq!(sighting.latitude, 46.43);
        assert_eq!(sighting.longitude, -95.63);
        assert_eq!(sighting.category, Category::Deer);
        assert_eq!(sighting.note, "3 bucks");
        assert_eq!(sighting.created_at, "2024-11-02 06:45:12");
    }

    #[test]
    fn test_into_sighting_missing_coordinates() {
        let candidate = NewSighting {
            lat: Some(Value::from(1.0)),
            ..NewSighting::default()
        };
        let err = candidate.into_sighting(fixed_time()).unwrap_err();
        assert_eq!(err.to_string(), "Missing coordinates.");

        let candidate = NewSighting {
            lat: Some(Value::Null),
            lng: Some(Value::from(1.0)),
            ..NewSighting::default()
        };
        assert!(candidate.into_sighting(fixed_time()).is_err());
    }

    #[test]
    fn test_into_sighting_numeric_strings() {
        let candidate = NewSighting {
            lat: Some(Value::from(" 46.5 ")),
            lng: Some(Value::from("-95")),
            ..NewSighting::default()
        };
        let sighting = candidate.into_sighting(fixed_time()).unwrap();
        assert_eq!(sighting.latitude, 46.5);
        assert_eq!(sighting.longitude, -95.0);
    }

    #[test]
    fn test_into_sighting_loose_coordinates() {
        let coerce = |lat: Value| {
            NewSighting {
                lat: Some(lat),
                lng: Some(Value::from(1.0)),
                ..NewSighting::default()
            }
            .into_sighting(fixed_time())
            .unwrap()
            .latitude
        };
        assert_eq!(coerce(Value::from("north")), 0.0);
        assert_eq!(coerce(Value::from("")), 0.0);
        assert_eq!(coerce(Value::from("46.5abc")), 46.5);
        assert_eq!(coerce(Value::from("  -12")), -12.0);
        assert_eq!(coerce(Value::from("1e2x")), 100.0);
        assert_eq!(coerce(Value::from(".5")), 0.5);
        assert_eq!(coerce(Value::from("7.")), 7.0);
        assert_eq!(coerce(Value::from("-")), 0.0);
        assert_eq!(coerce(Value::Bool(true)), 1.0);
        assert_eq!(coerce(Value::Bool(false)), 0.0);
    }

    #[test]
    fn test_into_sighting_uncoercible_coordinate() {
        let candidate = NewSighting {
            lat: Some(Value::from(1.0)),
            lng: Some(serde_json::json!([1, 2])),
            ..NewSighting::default()
        };
        let err = candidate.into_sighting(fixed_time()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid lng value.");

        let candidate = NewSighting {
            lat: Some(Value::from("1e999")),
            lng: Some(Value::from(1.0)),
            ..NewSighting::default()
        };
        let err = candidate.into_sighting(fixed_time()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid lat value.");
    }

    #[test]
    fn test_stored_record_with_loose_fields() {
        let sighting: Sighting = serde_json::from_str(
            r#"{"lat":"46.5","lng":-95,"category":null,"note":null,"time":20241102}"#,
        )
        .unwrap();
        assert_eq!(sighting.latitude, 46.5);
        assert_eq!(sighting.longitude, -95.0);
        assert_eq!(sighting.category, Category::Other);
        assert_eq!(sighting.note, "");
        assert_eq!(sighting.created_at, "20241102");

        let sighting: Sighting =
            serde_json::from_str(r#"{"lat":1,"lng":2,"category":["deer"],"note":{"a":1}}"#)
                .unwrap();
        assert_eq!(sighting.category, Category::Other);
        assert_eq!(sighting.note, "");
        assert_eq!(sighting.created_at, "");
    }

    #[test]
    fn test_stored_record_needs_coordinates() {
        assert!(serde_json::from_str::<Sighting>(r#"{"lat":1,"note":"x"}"#).is_err());
        assert!(serde_json::from_str::<Sighting>(r#"{"lat":null,"lng":2}"#).is_err());
        assert!(serde_json::from_str::<Sighting>(r#"{"lat":"north","lng":2}"#).is_err());
        assert!(serde_json::from_str::<Sighting>(r#"{"lat":"inf","lng":2}"#).is_err());
    }

    #[test]
    fn test_into_sighting_category_defaults() {
        let absent = NewSighting::new(1.0, 2.0).into_sighting(fixed_time()).unwrap();
        assert_eq!(absent.category, Category::Other);

        let invalid = NewSighting::new(1.0, 2.0)
            .with_category("bear")
            .into_sighting(fixed_time())
            .unwrap();
        assert_eq!(invalid.category, Category::Other);

        let shouting = NewSighting::new(1.0, 2.0)
            .with_category("FISH ")
            .into_sighting(fixed_time())
            .unwrap();
        assert_eq!(shouting.category, Category::Fish);

        let not_a_string = NewSighting {
            category: Some(Value::from(7)),
            ..NewSighting::new(1.0, 2.0)
        };
        assert_eq!(
            not_a_string.into_sighting(fixed_time()).unwrap().category,
            Category::Other
        );
    }

    #[test]
    fn test_into_sighting_note_is_trimmed_and_escaped() {
        let sighting = NewSighting::new(1.0, 2.0)
            .with_note("  <b>Tom & Jerry's \"pond\"</b>\n")
            .into_sighting(fixed_time())
            .unwrap();
        assert_eq!(
            sighting.note,
            "&lt;b&gt;Tom &amp; Jerry&#039;s &quot;pond&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_escape_html_passthrough() {
        assert_eq!(escape_html("plain text"), "plain text");
        assert_eq!(escape_html(""), "");
    }

    #[test]
    fn test_sighting_serialization_uses_wire_names() {
        let sighting = Sighting {
            latitude: 46.43,
            longitude: -95.63,
            category: Category::Deer,
            note: "3 bucks".to_string(),
            created_at: "2024-11-02 06:45:12".to_string(),
        };
        let json = serde_json::to_value(&sighting).unwrap();
        assert_eq!(json["lat"], 46.43);
        assert_eq!(json["lng"], -95.63);
        assert_eq!(json["category"], "deer");
        assert_eq!(json["note"], "3 bucks");
        assert_eq!(json["time"], "2024-11-02 06:45:12");
    }

    #[test]
    fn test_sighting_key() {
        let sighting = NewSighting::new(1.0, 2.0).into_sighting(fixed_time()).unwrap();
        assert_eq!(sighting.key(), "2024-11-02 06:45:12");
        assert!(sighting.matches_key("2024-11-02 06:45:12"));
        assert!(!sighting.matches_key("2024-11-02 06:45:13"));
    }

    #[test]
    fn test_created_at_local() {
        let sighting = NewSighting::new(1.0, 2.0).into_sighting(fixed_time()).unwrap();
        assert_eq!(sighting.created_at_local(), Some(fixed_time()));

        let legacy = Sighting {
            created_at: String::new(),
            ..sighting
        };
        assert!(legacy.created_at_local().is_none());
    }
}
