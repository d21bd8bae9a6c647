//! idsfeed-schema: Connection-classification events
//!
//! Strict internal representation of classifier output, plus the boundary
//! validator that turns loosely typed wire JSON into it.

pub mod error;
pub mod event;
pub mod validate;

pub use error::{ErrorKind, ValidationError};
pub use event::{Classification, ConnectionEvent, TrafficSource};
pub use validate::{Validator, DEFAULT_CONFIDENCE};
