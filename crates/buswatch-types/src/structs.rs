//! Domain structs shared by the server and the simulator.
//!
//! Covers [`Bus`] (one position report, also the registry cell),
//! [`WindowBounds`] (a viewer's viewport) and [`Route`] (an immutable
//! polyline a simulated bus drives along).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

/// Last known position of one vehicle.
///
/// Serialized with the camel-case `busId` key the ingest protocol uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    /// Unique vehicle identifier; the registry key.
    #[serde(rename = "busId")]
    pub bus_id: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Name of the route the vehicle is driving.
    pub route: String,
}

// ---------------------------------------------------------------------------
// WindowBounds
// ---------------------------------------------------------------------------

/// Latitude/longitude rectangle used to filter broadcasts for one viewer.
///
/// The protocol intends `south_lat <= north_lat` and `west_lng <= east_lng`
/// but neither is enforced: an inverted box is accepted and simply matches
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowBounds {
    /// Southern edge (minimum latitude).
    pub south_lat: f64,
    /// Northern edge (maximum latitude).
    pub north_lat: f64,
    /// Western edge (minimum longitude).
    pub west_lng: f64,
    /// Eastern edge (maximum longitude).
    pub east_lng: f64,
}

impl WindowBounds {
    /// Build a box from its four edges.
    pub const fn new(south_lat: f64, north_lat: f64, west_lng: f64, east_lng: f64) -> Self {
        Self {
            south_lat,
            north_lat,
            west_lng,
            east_lng,
        }
    }

    /// The initial viewport of a freshly accepted viewer. All four edges
    /// are NaN, and every comparison against NaN is false, so the box
    /// contains no position at all until the viewer reports real bounds.
    pub const fn degenerate() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    }

    /// Whether the point lies inside the box, edges inclusive.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        self.south_lat <= lat && lat <= self.north_lat && self.west_lng <= lng && lng <= self.east_lng
    }

    /// Whether the bus's reported position lies inside the box.
    pub fn contains_bus(&self, bus: &Bus) -> bool {
        self.contains(bus.lat, bus.lng)
    }
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// Errors raised when constructing a [`Route`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// The route has no coordinates to drive along.
    #[error("route {name:?} has no coordinates")]
    Empty {
        /// Name of the offending route.
        name: String,
    },
}

/// On-disk shape of a route file. Extra keys (stop names, colours, ...) are
/// ignored.
#[derive(Deserialize)]
struct RawRoute {
    name: String,
    coordinates: Vec<(f64, f64)>,
}

impl TryFrom<RawRoute> for Route {
    type Error = RouteError;

    fn try_from(raw: RawRoute) -> Result<Self, Self::Error> {
        Self::new(raw.name, raw.coordinates)
    }
}

/// A named polyline of `(lat, lng)` points. Immutable once built and never
/// empty.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawRoute")]
pub struct Route {
    name: String,
    coordinates: Vec<(f64, f64)>,
}

impl Route {
    /// Build a route, rejecting an empty coordinate list.
    pub fn new(name: impl Into<String>, coordinates: Vec<(f64, f64)>) -> Result<Self, RouteError> {
        let name = name.into();
        if coordinates.is_empty() {
            return Err(RouteError::Empty { name });
        }
        Ok(Self { name, coordinates })
    }

    /// Route name, reported as `route` in every telemetry message.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered `(lat, lng)` points. Never empty.
    pub fn coordinates(&self) -> &[(f64, f64)] {
        &self.coordinates
    }

    /// Number of points on the route (at least one).
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}
