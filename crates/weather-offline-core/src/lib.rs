//! Core library for weather-offline.
//!
//! Keeps a small weather app usable with a degraded network:
//!
//! - `worker`: the offline worker (install, activate, request routing)
//! - `cache`: named cache containers, in memory or on disk
//! - `http`: request/response snapshots and the `Fetcher` seam
//! - `weather`: client for the weather-data provider
//! - `config`: worker constants and application settings

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod weather;
pub mod worker;

pub use cache::{CacheStorage, DiskCacheStorage, MemoryCacheStorage};
pub use config::{AppConfig, WorkerConfig};
pub use error::{CacheError, FetchError, WorkerError};
pub use http::{Fetcher, HttpFetcher, OfflineFetcher, Request, Response};
pub use weather::{LocationQuery, WeatherClient, WeatherError, WeatherRecord};
pub use worker::{spawn_worker, OfflineWorker, Registration, WorkerHandle, WorkerState};
