pub mod js;
pub mod errors;
pub mod config;

pub use config::PumpConfig;
pub use errors::to_observer_error;
