//! Simulated bus fleet for Buswatch.
//!
//! Every simulated bus drives one route forever, emitting a telemetry
//! report after each step. Thousands of buses share a small, fixed pool of
//! outbound `WebSocket` connections:
//!
//! ```text
//! RouteSource --> SimulatorAgent (many) --> bounded queue (one per connection)
//!             --> sender task --> WebSocket --> ingest endpoint
//! ```
//!
//! A full queue suspends the buses feeding it, which is the only
//! backpressure in the system: nothing is dropped. An admission semaphore
//! caps how many buses drive at once.

pub mod agent;
pub mod assignment;
pub mod error;
pub mod fleet;
pub mod multiplexer;
pub mod routes;

pub use agent::{LapEnd, SimulatorAgent, generate_bus_id};
pub use assignment::{AssignmentPolicy, RoundRobin, UniformRandom, policy_for};
pub use error::SimulatorError;
pub use fleet::Fleet;
pub use multiplexer::{ConnectionMultiplexer, QueueClosed, QueueHandle, SenderReport};
pub use routes::{RouteDirectory, RouteSource};
