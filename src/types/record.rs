//! The telemetry snapshot surfaced to observers

use serde::{Deserialize, Serialize};

use super::FieldValue;

/// Latest decoded telemetry of the user aircraft.
///
/// Instances are immutable; every accepted reply produces a new record that
/// replaces the previous one as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TelemetryRecord {
    /// Aircraft title, at most 256 bytes on the wire
    pub title: String,
    /// Latitude, degrees
    pub latitude: f64,
    /// Longitude, degrees
    pub longitude: f64,
    /// True heading, degrees
    pub true_heading: f64,
    /// Ground altitude, meters
    pub ground_altitude: f64,
}

impl TelemetryRecord {
    /// Build a record from values decoded in telemetry-definition order.
    pub fn from_values(values: Vec<FieldValue>) -> crate::Result<Self> {
        let [title, latitude, longitude, true_heading, ground_altitude]: [FieldValue; 5] =
            values.try_into().map_err(|values: Vec<FieldValue>| {
                crate::SimError::decode_error(
                    "telemetry record",
                    format!("expected 5 fields, got {}", values.len()),
                )
            })?;

        Ok(Self {
            title: text("title", title)?,
            latitude: float("latitude", latitude)?,
            longitude: float("longitude", longitude)?,
            true_heading: float("true_heading", true_heading)?,
            ground_altitude: float("ground_altitude", ground_altitude)?,
        })
    }
}

fn text(field: &str, value: FieldValue) -> crate::Result<String> {
    match value {
        FieldValue::Text(s) => Ok(s),
        other => Err(mismatch(field, "Text", &other)),
    }
}

fn float(field: &str, value: FieldValue) -> crate::Result<f64> {
    match value {
        FieldValue::Float64(v) => Ok(v),
        other => Err(mismatch(field, "Float64", &other)),
    }
}

fn mismatch(field: &str, expected: &str, got: &FieldValue) -> crate::SimError {
    crate::SimError::decode_error(
        "telemetry record",
        format!("field '{}' expected {}, got {:?}", field, expected, got),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_ordered_values() {
        let record = TelemetryRecord::from_values(vec![
            FieldValue::Text("Cessna 172".into()),
            FieldValue::Float64(47.0),
            FieldValue::Float64(-122.0),
            FieldValue::Float64(90.0),
            FieldValue::Float64(500.0),
        ])
        .unwrap();

        assert_eq!(record.title, "Cessna 172");
        assert_eq!(record.longitude, -122.0);
        assert_eq!(record.ground_altitude, 500.0);
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = TelemetryRecord::from_values(vec![FieldValue::Text("x".into())]).unwrap_err();
        assert!(err.to_string().contains("expected 5 fields"));
    }

    #[test]
    fn rejects_wrong_field_type() {
        let err = TelemetryRecord::from_values(vec![
            FieldValue::Float64(1.0),
            FieldValue::Float64(47.0),
            FieldValue::Float64(-122.0),
            FieldValue::Float64(90.0),
            FieldValue::Float64(500.0),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("'title'"));
    }
}
