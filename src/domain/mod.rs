//! Domain models - core booking types and the wizard state machine
//!
//! This module contains the canonical data types used throughout the system:
//! - `types` - services, staff, slots, client info, booking payload/result
//! - `step` - wizard steps and the configurable step sequence
//! - `wizard` - wizard state, the action reducer and derived values
//! - `cart` - shopping cart model
//! - `error` - booking error taxonomy
//! - `validation` - payload and contact checks

pub mod cart;
pub mod error;
pub mod step;
pub mod types;
pub mod validation;
pub mod wizard;

// Re-export commonly used types at module level
pub use error::{BookingError, Field};
pub use step::{BookingStep, StepSequence};
pub use wizard::{Action, WizardState};
