pub mod calendar;
pub mod config;
pub mod error;
pub mod rng;
pub mod types;

pub use calendar::{Quantity, TimeUnit};
pub use config::SimulationConfig;
pub use rng::EntityRng;
