//! Shelter Query - filtered queries, cached aggregations and keyset pagination
//! over a document store of animal shelter outcome records.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod pagination;
pub mod service;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use error::{Result, ShelterError};
pub use service::ShelterService;
pub use tasks::spawn_cleanup_task;
