//! # Iris Test
//!
//! Test support for Iris: a scriptable mock transporter, a mock
//! authenticator and canned schema/service definitions matching the
//! shapes used throughout the test suites.

#![doc(html_root_url = "https://docs.rs/iris-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod defs;
mod mock_authenticator;
mod mock_transporter;

pub use defs::{entries_definitions, entry_items, entry_schema_def, user_schema_def};
pub use mock_authenticator::MockAuthenticator;
pub use mock_transporter::MockTransporter;
