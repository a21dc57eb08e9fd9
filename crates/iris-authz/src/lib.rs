//! # Iris Authorization Engine
//!
//! Pure evaluation of schema access rules against a caller identity.
//!
//! Two levels of authorization are provided:
//!
//! - **Action-level** ([`authorize_action`]): decides whether an action
//!   may touch its requested data types at all. Failures attach a
//!   `noaccess` response with a [`AuthReason`] code.
//! - **Item-level** ([`authorize_data_to_service`],
//!   [`authorize_data_from_service`]): decides per data item, filtering
//!   out refused items and annotating the aggregate outcome. This level
//!   never fails the pipeline; it filters and annotates.
//!
//! A `root` identity bypasses both levels.

#![doc(html_root_url = "https://docs.rs/iris-authz/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod action;
mod data;

pub use action::{authorize_action, AuthReason};
pub use data::{authorize_data_from_service, authorize_data_to_service};

use iris_core::Schema;
use std::collections::HashMap;

/// Read-only schema index handed to the engine.
pub type Schemas = HashMap<String, Schema>;
