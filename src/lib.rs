pub mod clock;
pub mod config;
pub mod credentials;
pub mod state;
pub mod store;
pub mod telemetry;
