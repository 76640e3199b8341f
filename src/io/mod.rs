//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `http_client` - Retrying JSON HTTP client for the backend proxy
//! - `scheduler_api` - `BookingApi` trait and its HTTP implementation
//! - `local_storage` - JSON key-value file used for the cart and auth token

pub mod http_client;
pub mod local_storage;
pub mod scheduler_api;

// Re-export commonly used types
pub use http_client::{HttpClient, RetryPolicy};
pub use local_storage::{LocalStorage, SharedStorage};
pub use scheduler_api::{BookingApi, HttpSchedulerApi};
