//! IAM authentication
//!
//! Obtains short-lived auth tokens and installs them in place of a static
//! password.

mod authorize;
mod token;

pub use authorize::authorize;
pub use token::{RdsTokenIssuer, TokenIssuer};
