//! Domain core of the clinic client: treatment progress, session validation
//! and role changes. No I/O lives here.

pub mod error;
pub mod failure;
pub mod format;
pub mod model;
pub mod role_change;
pub mod time;
pub mod validation;

pub use error::Error;
pub use failure::{Failure, FailureKind};
pub use role_change::{ConfirmationPrompt, RoleChangeError, RoleChangeGuard, RoleChangeState};
pub use time::Clock;
pub use validation::{FieldErrors, SessionField, SessionValidator};
