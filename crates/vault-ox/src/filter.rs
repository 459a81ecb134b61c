//! Facet filters for the file list: raw form input, the typed criteria derived
//! from it, and the `myFiles` variables derived from those.

use bon::Builder;
use serde::Serialize;
use vault_ox_common::Timestamp;

use crate::graphql::Variables;

/// Filter form exactly as typed. Blank fields mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
pub struct FilterInput {
    #[builder(default, into)]
    pub name_like: String,
    /// One MIME type or a comma separated list
    #[builder(default, into)]
    pub mime: String,
    #[builder(default, into)]
    pub size_min: String,
    #[builder(default, into)]
    pub size_max: String,
    /// RFC 3339 or `YYYY-MM-DD`
    #[builder(default, into)]
    pub date_from: String,
    #[builder(default, into)]
    pub date_to: String,
    /// Comma separated
    #[builder(default, into)]
    pub tags: String,
}

/// Typed filter. `None` is no constraint; never an empty string or list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub name_like: Option<String>,
    pub mime_types: Option<Vec<String>>,
    pub size_min: Option<u32>,
    pub size_max: Option<u32>,
    pub date_from: Option<Timestamp>,
    pub date_to: Option<Timestamp>,
    pub tags: Option<Vec<String>>,
}

impl FilterCriteria {
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }
}

impl From<&FilterInput> for FilterCriteria {
    fn from(input: &FilterInput) -> Self {
        Self {
            name_like: non_blank(&input.name_like),
            mime_types: split_list(&input.mime),
            size_min: parse_size("sizeMin", &input.size_min),
            size_max: parse_size("sizeMax", &input.size_max),
            date_from: parse_date("dateFrom", &input.date_from, Timestamp::parse_user_input),
            date_to: parse_date("dateTo", &input.date_to, Timestamp::parse_user_input_end_of_day),
            tags: split_list(&input.tags),
        }
    }
}

impl From<FilterInput> for FilterCriteria {
    fn from(input: FilterInput) -> Self {
        Self::from(&input)
    }
}

/// Trimmed value, or `None` when blank
fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Comma separated list without blank entries; `None` when nothing is left
fn split_list(raw: &str) -> Option<Vec<String>> {
    let items: Vec<String> = raw
        .split(',')
        .filter_map(non_blank)
        .collect();
    (!items.is_empty()).then_some(items)
}

/// Largest bound the backend's 32-bit `Int` accepts
const MAX_SIZE_BOUND: u32 = i32::MAX.unsigned_abs();

/// Byte bound; anything that is not an integer in `0..=i32::MAX` is no constraint
fn parse_size(field: &str, raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u32>() {
        Ok(value) if value <= MAX_SIZE_BOUND => Some(value),
        Ok(value) => {
            log::debug!("ignoring {field}={value}: above {MAX_SIZE_BOUND}");
            None
        }
        Err(e) => {
            log::debug!("ignoring {field}={trimmed:?}: {e}");
            None
        }
    }
}

/// Date bound; unparseable input is no constraint. A bare date is expanded by `parse`.
fn parse_date(field: &str, raw: &str, parse: fn(&str) -> Option<Timestamp>) -> Option<Timestamp> {
    let parsed = parse(raw);
    if parsed.is_none() && !raw.trim().is_empty() {
        log::debug!("ignoring {field}={:?}: not a date", raw.trim());
    }
    parsed
}

/// Variables of the `myFiles` query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyFilesVariables {
    pub limit: u32,
    pub offset: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_like: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_max: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl MyFilesVariables {
    #[must_use]
    pub fn new(criteria: FilterCriteria, limit: u32, offset: u32) -> Self {
        Self {
            limit,
            offset,
            name_like: criteria.name_like,
            mime_types: criteria.mime_types,
            size_min: criteria.size_min,
            size_max: criteria.size_max,
            date_from: criteria.date_from,
            date_to: criteria.date_to,
            tags: criteria.tags,
        }
    }

    #[must_use]
    pub fn into_variables(self) -> Variables {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Variables::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn all_blank_input_has_no_constraints() {
        let input = FilterInput::builder()
            .name_like("")
            .mime("  ")
            .size_min("")
            .size_max(" ")
            .date_from("")
            .date_to("")
            .tags(" , ,")
            .build();
        let criteria = FilterCriteria::from(&input);
        assert!(criteria.is_unconstrained());

        let vars = MyFilesVariables::new(criteria, 50, 0).into_variables();
        assert_eq!(Value::Object(vars), json!({"limit": 50, "offset": 0}));
    }

    #[test]
    fn default_input_is_unconstrained() {
        assert!(FilterCriteria::from(FilterInput::default()).is_unconstrained());
    }

    #[test]
    fn non_numeric_size_is_no_constraint_not_zero() {
        let criteria = FilterCriteria::from(&FilterInput::builder().size_min("abc").size_max("-5").build());
        assert_eq!(criteria.size_min, None);
        assert_eq!(criteria.size_max, None);

        let vars = MyFilesVariables::new(criteria, 50, 0).into_variables();
        assert!(vars.get("sizeMin").is_none());
        assert!(vars.get("sizeMax").is_none());
    }

    #[test]
    fn size_beyond_wire_int_is_no_constraint() {
        let criteria = FilterCriteria::from(
            &FilterInput::builder()
                .size_min("5000000000")
                .size_max("2147483648")
                .build(),
        );
        assert_eq!(criteria.size_min, None);
        assert_eq!(criteria.size_max, None);

        let criteria = FilterCriteria::from(&FilterInput::builder().size_max("2147483647").build());
        assert_eq!(criteria.size_max, Some(2_147_483_647));
    }

    #[test]
    fn date_only_upper_bound_includes_the_whole_day() {
        let input = FilterInput::builder()
            .date_from("2025-02-01")
            .date_to("2025-02-01")
            .build();
        let vars = MyFilesVariables::new(FilterCriteria::from(&input), 50, 0).into_variables();
        assert_eq!(vars["dateFrom"], json!("2025-02-01T00:00:00Z"));
        assert_eq!(vars["dateTo"], json!("2025-02-01T23:59:59Z"));

        let created = Timestamp::parse_rfc3339("2025-02-01T10:00:00Z").expect("rfc3339");
        let upper = FilterCriteria::from(&input).date_to.expect("parsed");
        assert!(created.inner() <= upper.inner());
    }

    #[test]
    fn populated_input_maps_to_every_variable() {
        let input = FilterInput::builder()
            .name_like(" report ")
            .mime("image/png, application/pdf")
            .size_min("1024")
            .size_max("1048576")
            .date_from("2025-01-01")
            .date_to("2025-02-01T12:00:00Z")
            .tags("work,  tax ")
            .build();
        let vars = MyFilesVariables::new(FilterCriteria::from(&input), 20, 40).into_variables();
        assert_eq!(
            Value::Object(vars),
            json!({
                "limit": 20,
                "offset": 40,
                "nameLike": "report",
                "mimeTypes": ["image/png", "application/pdf"],
                "sizeMin": 1024,
                "sizeMax": 1_048_576,
                "dateFrom": "2025-01-01T00:00:00Z",
                "dateTo": "2025-02-01T12:00:00Z",
                "tags": ["work", "tax"]
            })
        );
    }

    #[test]
    fn bad_dates_are_dropped() {
        let criteria = FilterCriteria::from(&FilterInput::builder().date_from("last week").build());
        assert!(criteria.date_from.is_none());
    }
}
