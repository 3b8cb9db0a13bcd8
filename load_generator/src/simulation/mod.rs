pub mod config;
pub mod driver;
pub mod store;

pub use config::{ConfigDelta, Field, LimitsForm, SimulationConfig};
pub use driver::{ObservationSink, Observation, Simulator};
pub use store::ConfigStore;
