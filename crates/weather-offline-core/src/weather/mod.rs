//! Weather-data source used by the app.
//!
//! Lookups take a city name or a latitude/longitude pair and either return a
//! `WeatherRecord` or fail with a `WeatherError` that tells "not found" apart
//! from network trouble.

pub mod client;
pub mod error;
pub mod models;

pub use client::WeatherClient;
pub use error::WeatherError;
pub use models::{Condition, LocationQuery, MainReadings, SysInfo, WeatherRecord, Wind};
