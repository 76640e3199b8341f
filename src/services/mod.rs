//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `booking_flow` - Booking wizard controller driving the scheduling API
//! - `cart_store` - Cart persisted in local storage
//! - `auth_session` - Auth token persisted in local storage

pub mod auth_session;
pub mod booking_flow;
pub mod cart_store;

// Re-export commonly used types
pub use auth_session::AuthSession;
pub use booking_flow::{BookingFlow, Clock, InitialSelection, LoadOutcome, LoadRequest, LoadTicket};
pub use cart_store::CartStore;
