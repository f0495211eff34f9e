//! Telemetry field model.
//!
//! Fields are collected by a [`crate::collab::TelemetrySession`]; this module only defines what a
//! field looks like so sessions can serialize them however they report.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldType {
    App,
    Session,
    Performance,
    UserFeedback,
    UserConfig,
    UserSystem,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Uint(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub kind: FieldType,
    pub name: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(kind: FieldType, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            kind,
            name: name.into(),
            value: value.into(),
        }
    }
}

// Performance fields recorded when a session shuts down.
pub const SHUTDOWN_EMULATION_SPEED: &str = "Shutdown_EmulationSpeed";
pub const SHUTDOWN_FRAMERATE: &str = "Shutdown_Framerate";
pub const SHUTDOWN_FRAMETIME: &str = "Shutdown_Frametime";
pub const MEAN_FRAMETIME_MS: &str = "Mean_Frametime_MS";

/// Value reported for [`MEAN_FRAMETIME_MS`].
pub const MEAN_FRAMETIME_MS_VALUE: f64 = 20.0;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fields_serialize_flat() {
        let field = Field::new(FieldType::Performance, SHUTDOWN_FRAMERATE, 59.5);
        assert_eq!(
            serde_json::to_string(&field).unwrap(),
            r#"{"kind":"Performance","name":"Shutdown_Framerate","value":59.5}"#
        );
    }
}
