//! Data definition layout and registration

use std::collections::HashSet;
use tracing::{debug, trace};

use crate::host::HostSession;
use crate::types::{DataDefinitionId, DataType, FieldValue, TELEMETRY_DEFINITION, TelemetryRecord};
use crate::{Result, SimError};

/// One simulation variable in a data definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Simulation variable name as the host knows it
    pub name: &'static str,
    /// Unit the host converts the value to; `None` for strings
    pub unit: Option<&'static str>,
    /// Packed wire type
    pub data_type: DataType,
}

/// Fields of the telemetry record, in packing order.
pub const TELEMETRY_FIELDS: [FieldDefinition; 5] = [
    FieldDefinition { name: "Title", unit: None, data_type: DataType::String256 },
    FieldDefinition { name: "Plane Latitude", unit: Some("degrees"), data_type: DataType::Float64 },
    FieldDefinition { name: "Plane Longitude", unit: Some("degrees"), data_type: DataType::Float64 },
    FieldDefinition {
        name: "Plane Heading Degrees True",
        unit: Some("degrees"),
        data_type: DataType::Float64,
    },
    FieldDefinition { name: "Ground Altitude", unit: Some("meters"), data_type: DataType::Float64 },
];

/// A field together with its byte offset in the packed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub field: FieldDefinition,
    pub offset: usize,
}

/// An ordered, packed (no padding) data definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDefinition {
    id: DataDefinitionId,
    fields: Vec<FieldLayout>,
    record_size: usize,
}

impl DataDefinition {
    /// Create a definition and validate it.
    pub fn new(id: DataDefinitionId, fields: &[FieldDefinition]) -> Result<Self> {
        let definition = Self::layout(id, fields);
        definition.validate()?;
        Ok(definition)
    }

    /// The telemetry record definition.
    pub fn telemetry() -> Self {
        Self::layout(TELEMETRY_DEFINITION, &TELEMETRY_FIELDS)
    }

    fn layout(id: DataDefinitionId, fields: &[FieldDefinition]) -> Self {
        let mut offset = 0;
        let fields = fields
            .iter()
            .map(|field| {
                let layout = FieldLayout { field: *field, offset };
                offset += field.data_type.size();
                layout
            })
            .collect();
        Self { id, fields, record_size: offset }
    }

    /// Validate the definition for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(SimError::config_error(format!("data definition {} has no fields", self.id)));
        }

        let mut seen = HashSet::new();
        for FieldLayout { field, .. } in &self.fields {
            if field.name.trim().is_empty() {
                return Err(SimError::config_error(format!(
                    "data definition {} has a field without a name",
                    self.id
                )));
            }
            if !seen.insert(field.name) {
                return Err(SimError::config_error(format!(
                    "field '{}' appears twice in data definition {}",
                    field.name, self.id
                )));
            }
            match (field.data_type.is_string(), field.unit) {
                (true, Some(unit)) => {
                    return Err(SimError::config_error(format!(
                        "string field '{}' cannot have unit '{}'",
                        field.name, unit
                    )));
                }
                (false, None) => {
                    return Err(SimError::config_error(format!(
                        "numeric field '{}' needs a unit",
                        field.name
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    pub fn id(&self) -> DataDefinitionId {
        self.id
    }

    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    /// Size in bytes of one packed record.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Decode every field of one packed record.
    pub fn decode(&self, payload: &[u8]) -> Result<Vec<FieldValue>> {
        if payload.len() < self.record_size {
            return Err(SimError::decode_error(
                "reply payload",
                format!(
                    "definition {} needs {} bytes, got {}",
                    self.id,
                    self.record_size,
                    payload.len()
                ),
            ));
        }

        self.fields.iter().map(|layout| layout.field.data_type.read(payload, layout.offset)).collect()
    }

    /// Decode one packed record into a [`TelemetryRecord`].
    pub fn decode_record(&self, payload: &[u8]) -> Result<TelemetryRecord> {
        TelemetryRecord::from_values(self.decode(payload)?)
    }
}

/// Register `definition` with the session, one field at a time, in order.
///
/// Not retried: the first failing field fails the whole registration.
pub fn define_schema<S>(session: &mut S, definition: &DataDefinition) -> Result<DataDefinitionId>
where
    S: HostSession + ?Sized,
{
    for layout in definition.fields() {
        let field = &layout.field;
        trace!(definition = %definition.id(), field = field.name, "Adding field to data definition");
        session.add_to_data_definition(definition.id(), field).map_err(|e| {
            SimError::connection_failed_with_source(
                format!("failed to register field '{}'", field.name),
                Box::new(e),
            )
        })?;
    }

    debug!(
        definition = %definition.id(),
        fields = definition.fields().len(),
        record_size = definition.record_size(),
        "Data definition registered"
    );
    Ok(definition.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SimObjectType;
    use crate::types::RequestId;

    #[derive(Default)]
    struct FieldSink {
        added: Vec<(DataDefinitionId, &'static str)>,
        fail_on: Option<&'static str>,
    }

    impl HostSession for FieldSink {
        fn add_to_data_definition(
            &mut self,
            definition: DataDefinitionId,
            field: &FieldDefinition,
        ) -> Result<()> {
            if self.fail_on == Some(field.name) {
                return Err(SimError::connection_failed("rejected"));
            }
            self.added.push((definition, field.name));
            Ok(())
        }

        fn request_data_on_sim_object_type(
            &mut self,
            _request: RequestId,
            _definition: DataDefinitionId,
            _radius_meters: u32,
            _object_type: SimObjectType,
        ) -> Result<()> {
            Ok(())
        }

        fn receive_next(&mut self) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }

        fn close(self) -> Result<()> {
            Ok(())
        }
    }

    fn packed(title: &str, values: [f64; 4]) -> Vec<u8> {
        let mut payload = vec![0u8; 256];
        payload[..title.len()].copy_from_slice(title.as_bytes());
        for v in values {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        payload
    }

    #[test]
    fn telemetry_layout_is_packed() {
        let definition = DataDefinition::telemetry();
        let offsets: Vec<usize> = definition.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 256, 264, 272, 280]);
        assert_eq!(definition.record_size(), 288);
        assert_eq!(definition.id(), TELEMETRY_DEFINITION);
    }

    #[test]
    fn telemetry_definition_is_valid() {
        DataDefinition::new(TELEMETRY_DEFINITION, &TELEMETRY_FIELDS).unwrap();
    }

    #[test]
    fn rejects_duplicate_and_mis_united_fields() {
        let dup = [TELEMETRY_FIELDS[1], TELEMETRY_FIELDS[1]];
        assert!(DataDefinition::new(DataDefinitionId(1), &dup).is_err());

        let unitless = [FieldDefinition { name: "Airspeed", unit: None, data_type: DataType::Float64 }];
        assert!(DataDefinition::new(DataDefinitionId(1), &unitless).is_err());

        let string_unit =
            [FieldDefinition { name: "Atc Id", unit: Some("knots"), data_type: DataType::String32 }];
        assert!(DataDefinition::new(DataDefinitionId(1), &string_unit).is_err());

        assert!(DataDefinition::new(DataDefinitionId(1), &[]).is_err());
    }

    #[test]
    fn decodes_record_payload() {
        let definition = DataDefinition::telemetry();
        let record = definition
            .decode_record(&packed("Cessna 172", [47.0, -122.0, 90.0, 500.0]))
            .unwrap();

        assert_eq!(
            record,
            TelemetryRecord {
                title: "Cessna 172".into(),
                latitude: 47.0,
                longitude: -122.0,
                true_heading: 90.0,
                ground_altitude: 500.0,
            }
        );
    }

    #[test]
    fn short_payload_is_rejected() {
        let definition = DataDefinition::telemetry();
        let mut payload = packed("A320", [1.0, 2.0, 3.0, 4.0]);
        payload.truncate(287);
        assert!(matches!(definition.decode(&payload), Err(SimError::Decode { .. })));
    }

    #[test]
    fn registers_fields_in_order() {
        let mut sink = FieldSink::default();
        let id = define_schema(&mut sink, &DataDefinition::telemetry()).unwrap();

        assert_eq!(id, TELEMETRY_DEFINITION);
        let names: Vec<&str> = sink.added.iter().map(|(_, name)| *name).collect();
        assert_eq!(
            names,
            vec![
                "Title",
                "Plane Latitude",
                "Plane Longitude",
                "Plane Heading Degrees True",
                "Ground Altitude"
            ]
        );
        assert!(sink.added.iter().all(|(def, _)| *def == TELEMETRY_DEFINITION));
    }

    #[test]
    fn registration_stops_at_first_failure() {
        let mut sink = FieldSink { fail_on: Some("Plane Longitude"), ..Default::default() };
        let err = define_schema(&mut sink, &DataDefinition::telemetry()).unwrap_err();

        assert!(matches!(err, SimError::Connection { .. }));
        assert!(err.to_string().contains("Plane Longitude"));
        assert_eq!(sink.added.len(), 2);
    }
}
