//! Schema validation for inbound `WebSocket` payloads.
//!
//! Two schemas are checked here, each by an explicit function returning a
//! tagged result: the decoded value, or a non-empty ordered list of
//! human-readable problems.
//!
//! - [`validate_telemetry`] -- a vehicle position report
//!   (`{"busId", "lat", "lng", "route"}`)
//! - [`validate_bounds`] -- a viewer viewport update
//!   (`{"msgType": "newBounds", "data": {...}}`)
//!
//! A payload that is not JSON, or whose root is not an object, yields a
//! single generic error and no field is inspected. Otherwise every field
//! is checked and all problems are reported together. Inside the bounds
//! schema a non-object `data` stops the checks of its four nested fields
//! but not the `msgType` check.

use std::fmt;

use buswatch_types::{Bus, WindowBounds};
use serde_json::{Map, Value};

/// Error reported for an unparseable payload.
pub const INVALID_JSON: &str = "invalid JSON";

/// Error reported when the payload root is not a JSON object.
pub const NOT_AN_OBJECT: &str = "not an object";

/// The only `msgType` a viewer may send.
pub const NEW_BOUNDS: &str = "newBounds";

/// A non-empty, ordered list of validation problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    fn single(message: &str) -> Self {
        Self(vec![message.to_owned()])
    }

    /// The problems, in the order they were detected.
    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// Consume the list, e.g. to build an `Errors` reply.
    pub fn into_messages(self) -> Vec<String> {
        self.0
    }

    /// Number of problems (always at least one).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: an error list is never empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate a vehicle telemetry report.
///
/// Requires `busId` (non-empty string), `lat` and `lng` (numbers) and
/// `route` (string). Unknown keys are ignored.
pub fn validate_telemetry(payload: &[u8]) -> Result<Bus, ValidationErrors> {
    let root = parse_object(payload)?;
    let mut errors = Vec::new();

    let bus_id = match root.get("busId") {
        None => {
            errors.push(String::from("busId is required"));
            None
        }
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(_) => {
            errors.push(String::from("busId must be a non-empty string"));
            None
        }
    };
    let lat = require_number(&root, "lat", "lat", &mut errors);
    let lng = require_number(&root, "lng", "lng", &mut errors);
    let route = match root.get("route") {
        None => {
            errors.push(String::from("route is required"));
            None
        }
        Some(Value::String(route)) => Some(route.clone()),
        Some(_) => {
            errors.push(String::from("route must be a string"));
            None
        }
    };

    match (bus_id, lat, lng, route) {
        (Some(bus_id), Some(lat), Some(lng), Some(route)) if errors.is_empty() => Ok(Bus {
            bus_id,
            lat,
            lng,
            route,
        }),
        _ => Err(ValidationErrors(errors)),
    }
}

/// Validate a viewer's `newBounds` message.
///
/// Problems with `msgType` and with `data` are independent and are
/// reported together.
pub fn validate_bounds(payload: &[u8]) -> Result<WindowBounds, ValidationErrors> {
    let root = parse_object(payload)?;
    let mut errors = Vec::new();

    match root.get("msgType") {
        None => errors.push(String::from("msgType is required")),
        Some(Value::String(kind)) if kind == NEW_BOUNDS => {}
        Some(_) => errors.push(format!("msgType must be \"{NEW_BOUNDS}\"")),
    }

    let bounds = match root.get("data") {
        None => {
            errors.push(String::from("data is required"));
            None
        }
        Some(Value::Object(data)) => {
            let south = require_number(data, "south_lat", "data.south_lat", &mut errors);
            let north = require_number(data, "north_lat", "data.north_lat", &mut errors);
            let west = require_number(data, "west_lng", "data.west_lng", &mut errors);
            let east = require_number(data, "east_lng", "data.east_lng", &mut errors);
            match (south, north, west, east) {
                (Some(south), Some(north), Some(west), Some(east)) => {
                    Some(WindowBounds::new(south, north, west, east))
                }
                _ => None,
            }
        }
        Some(_) => {
            errors.push(String::from("data must be an object"));
            None
        }
    };

    match bounds {
        Some(bounds) if errors.is_empty() => Ok(bounds),
        _ => Err(ValidationErrors(errors)),
    }
}

/// Parse the payload and require an object root.
fn parse_object(payload: &[u8]) -> Result<Map<String, Value>, ValidationErrors> {
    let Ok(value) = serde_json::from_slice::<Value>(payload) else {
        return Err(ValidationErrors::single(INVALID_JSON));
    };
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ValidationErrors::single(NOT_AN_OBJECT)),
    }
}

/// Read a numeric field, recording a problem under `label` when it is
/// absent or not a number.
fn require_number(
    object: &Map<String, Value>,
    key: &str,
    label: &str,
    errors: &mut Vec<String>,
) -> Option<f64> {
    match object.get(key) {
        None => {
            errors.push(format!("{label} is required"));
            None
        }
        Some(value) => {
            let number = value.as_f64();
            if number.is_none() {
                errors.push(format!("{label} must be a number"));
            }
            number
        }
    }
}
