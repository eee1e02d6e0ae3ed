//! Structural checks for gateway payloads.
//!
//! Services are loosely typed: numeric fields sometimes arrive as strings,
//! and field names have drifted between revisions. These functions accept
//! the shapes the services are known to produce and reject everything else.

use index_claims_models::{GrowingSeason, IndexThresholds, MAX_PERIOD, PolicyRecord};
use serde_json::Value;

use crate::{DataService, GatewayError};

/// Field names accepted for the index reading, in priority order.
const INDEX_FIELDS: &[&str] = &["ndvi_value", "ndvi", "value"];

/// Why a single roster entry was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// The entry is not a JSON object.
    #[error("roster entry is not an object")]
    NotAnObject,

    /// A required field is absent or null.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A required field is present but not numeric.
    #[error("field `{field}` is not numeric: {value}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// The offending value, as JSON.
        value: String,
    },
}

/// Parses the roster payload, dropping (and logging) entries that fail
/// validation.
///
/// # Errors
///
/// Returns [`GatewayError::Malformed`] if the payload is not a JSON array.
pub fn parse_roster(body: &Value) -> Result<Vec<PolicyRecord>, GatewayError> {
    let entries = body.as_array().ok_or_else(|| GatewayError::Malformed {
        service: DataService::PolicyRoster,
        message: format!("expected a list of policies, got {}", type_name(body)),
    })?;

    let mut records = Vec::with_capacity(entries.len());
    let mut dropped = 0usize;

    for (i, entry) in entries.iter().enumerate() {
        match parse_policy_record(entry) {
            Ok(record) => records.push(record),
            Err(e) => {
                dropped += 1;
                let policy_id = entry.get("policy_id").map(ToString::to_string);
                log::warn!("Dropping roster entry {i} (policy_id={policy_id:?}): {e}");
            }
        }
    }

    if dropped > 0 {
        log::info!(
            "Roster: {} usable entries, {dropped} dropped",
            records.len()
        );
    }

    Ok(records)
}

/// Parses one roster entry into a [`PolicyRecord`].
///
/// # Errors
///
/// Returns [`RecordError`] if the entry is not an object or any required
/// field is missing or non-numeric.
pub fn parse_policy_record(entry: &Value) -> Result<PolicyRecord, RecordError> {
    if !entry.is_object() {
        return Err(RecordError::NotAnObject);
    }

    Ok(PolicyRecord {
        policy_id: int_field(entry, "policy_id")?,
        customer_id: int_field(entry, "customer_id")?,
        company_id: int_field(entry, "company_id")?,
        zone_id: int_field(entry, "cps_zone")?,
        grid_id: int_field(entry, "grid")?,
        period: i32::try_from(int_field(entry, "period")?).map_err(|_| {
            RecordError::InvalidField {
                field: "period",
                value: entry["period"].to_string(),
            }
        })?,
        product_type: int_field(entry, "product_type")?,
        sum_insured: float_field(entry, "period_sum_insured")?,
    })
}

/// Parses a zone/period configuration payload.
///
/// # Errors
///
/// Returns [`GatewayError::Malformed`] if either threshold is missing or
/// not numeric.
pub fn parse_thresholds(body: &Value) -> Result<IndexThresholds, GatewayError> {
    let malformed = |e: RecordError| GatewayError::Malformed {
        service: DataService::ZoneConfig,
        message: e.to_string(),
    };

    Ok(IndexThresholds {
        trigger: float_field(body, "trigger_point").map_err(malformed)?,
        exit: float_field(body, "exit_point").map_err(malformed)?,
    })
}

/// Extracts the index value from an index reading payload.
///
/// # Errors
///
/// Returns [`GatewayError::Malformed`] if no known numeric field is present.
pub fn parse_index(body: &Value) -> Result<f64, GatewayError> {
    INDEX_FIELDS
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_f64))
        .filter(|v| v.is_finite())
        .ok_or_else(|| GatewayError::Malformed {
            service: DataService::IndexReading,
            message: format!("no numeric index field in {body}"),
        })
}

/// Parses a growing season payload.
///
/// Accepts `[]` (no season), `[start, end]`, or
/// `{"start_period": .., "end_period": ..}`.
///
/// # Errors
///
/// Returns [`GatewayError::Malformed`] for any other shape or for periods
/// outside `1..=36`.
pub fn parse_growing_season(body: &Value) -> Result<Option<GrowingSeason>, GatewayError> {
    let malformed = |message: String| GatewayError::Malformed {
        service: DataService::GrowingSeason,
        message,
    };

    let (start, end) = match body {
        Value::Array(items) if items.is_empty() => return Ok(None),
        Value::Array(items) if items.len() == 2 => (
            items[0].as_i64().ok_or_else(|| malformed(format!("bad start {}", items[0])))?,
            items[1].as_i64().ok_or_else(|| malformed(format!("bad end {}", items[1])))?,
        ),
        Value::Object(_) => (
            int_field(body, "start_period").map_err(|e| malformed(e.to_string()))?,
            int_field(body, "end_period").map_err(|e| malformed(e.to_string()))?,
        ),
        other => return Err(malformed(format!("unexpected season payload {other}"))),
    };

    let to_period = |v: i64| i32::try_from(v).ok().filter(|p| (1..=MAX_PERIOD).contains(p));
    match (to_period(start), to_period(end)) {
        (Some(start), Some(end)) => Ok(Some(GrowingSeason::new(start, end))),
        _ => Err(malformed(format!(
            "season {start}..={end} outside 1..={MAX_PERIOD}"
        ))),
    }
}

/// Reads an integer field that may be encoded as a number (including a
/// whole float such as `5.0`) or a numeric string.
#[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
fn int_field(obj: &Value, field: &'static str) -> Result<i64, RecordError> {
    let value = required(obj, field)?;
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| RecordError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// Reads a float field that may be encoded as a number or a numeric string.
fn float_field(obj: &Value, field: &'static str) -> Result<f64, RecordError> {
    let value = required(obj, field)?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|f| f.is_finite())
        .ok_or_else(|| RecordError::InvalidField {
            field,
            value: value.to_string(),
        })
}

fn required<'a>(obj: &'a Value, field: &'static str) -> Result<&'a Value, RecordError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(RecordError::MissingField(field)),
        Some(v) => Ok(v),
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roster_entry() -> Value {
        json!({
            "policy_id": 101,
            "customer_id": 7,
            "company_id": 3,
            "cps_zone": 12,
            "grid": 4410,
            "period": 5,
            "product_type": 1,
            "period_sum_insured": 10000.0
        })
    }

    #[test]
    fn parses_complete_record() {
        let record = parse_policy_record(&roster_entry()).unwrap();
        assert_eq!(record.policy_id, 101);
        assert_eq!(record.zone_id, 12);
        assert_eq!(record.grid_id, 4410);
        assert_eq!(record.period, 5);
        assert!((record.sum_insured - 10000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn accepts_numeric_strings() {
        let mut entry = roster_entry();
        entry["grid"] = json!("4410");
        entry["period_sum_insured"] = json!(" 2500.50 ");
        let record = parse_policy_record(&entry).unwrap();
        assert_eq!(record.grid_id, 4410);
        assert!((record.sum_insured - 2500.5).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_missing_and_non_numeric_fields() {
        let mut entry = roster_entry();
        entry.as_object_mut().unwrap().remove("cps_zone");
        assert_eq!(
            parse_policy_record(&entry),
            Err(RecordError::MissingField("cps_zone"))
        );

        let mut entry = roster_entry();
        entry["period"] = json!("fifth");
        assert!(matches!(
            parse_policy_record(&entry),
            Err(RecordError::InvalidField { field: "period", .. })
        ));

        let mut entry = roster_entry();
        entry["customer_id"] = Value::Null;
        assert_eq!(
            parse_policy_record(&entry),
            Err(RecordError::MissingField("customer_id"))
        );
    }

    #[test]
    fn roster_drops_bad_entries_and_keeps_the_rest() {
        let mut broken = roster_entry();
        broken.as_object_mut().unwrap().remove("period_sum_insured");
        let body = json!([roster_entry(), broken, "garbage"]);

        let records = parse_roster(&body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].policy_id, 101);
    }

    #[test]
    fn roster_must_be_a_list() {
        let err = parse_roster(&json!({"policies": []})).unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(err.service(), DataService::PolicyRoster);
    }

    #[test]
    fn parses_thresholds() {
        let t = parse_thresholds(&json!({"trigger_point": 0.15, "exit_point": 0.05})).unwrap();
        assert!((t.trigger - 0.15).abs() < f64::EPSILON);
        assert!((t.exit - 0.05).abs() < f64::EPSILON);

        let err = parse_thresholds(&json!({"trigger_point": 0.15})).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn parses_index_from_known_fields() {
        assert!((parse_index(&json!({"ndvi_value": 0.42})).unwrap() - 0.42).abs() < f64::EPSILON);
        assert!((parse_index(&json!({"ndvi": 0.3})).unwrap() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn index_without_numeric_field_is_malformed() {
        assert!(parse_index(&json!({"ndvi_value": "n/a"})).unwrap_err().is_malformed());
        assert!(parse_index(&json!({})).unwrap_err().is_malformed());
    }

    #[test]
    fn parses_growing_season_shapes() {
        assert_eq!(parse_growing_season(&json!([])).unwrap(), None);
        assert_eq!(
            parse_growing_season(&json!([1, 10])).unwrap(),
            Some(GrowingSeason::new(1, 10))
        );
        assert_eq!(
            parse_growing_season(&json!({"start_period": 33, "end_period": 4})).unwrap(),
            Some(GrowingSeason::new(33, 4))
        );
    }

    #[test]
    fn rejects_bad_growing_season() {
        assert!(parse_growing_season(&json!([1, 2, 3])).is_err());
        assert!(parse_growing_season(&json!([0, 40])).is_err());
        assert!(parse_growing_season(&json!("1-10")).is_err());
    }
}
