//! Terminal response statuses.
//!
//! [`Status`] is the primary control value of a dispatch: once a
//! [`Response`](crate::Response) holds a status, the pipeline
//! short-circuits further processing for that leg.

use serde::{Deserialize, Serialize};

/// Terminal status values for a [`Response`](crate::Response).
///
/// All variants are terminal: the absence of a status (modelled as
/// `Option<Status>` on the response) means "no outcome yet", and the
/// dispatcher guarantees that the final response returned to the caller
/// always carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The request succeeded.
    Ok,
    /// The action was handed off to a queue service for deferred execution.
    Queued,
    /// Nothing to do. Not an error.
    Noaction,
    /// The requested resource was not found.
    Notfound,
    /// Authorization was refused. Carries a `reason` code on the response.
    Noaccess,
    /// Malformed action or no matching endpoint.
    Badrequest,
    /// Authentication against the service failed.
    Autherror,
    /// The upstream service replied with something unusable.
    Badresponse,
    /// The request timed out (reported by a transporter).
    Timeout,
    /// Catch-all failure. Carries an `origin` tag identifying the stage.
    Error,
}

impl Status {
    /// Returns the wire-level name of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Queued => "queued",
            Self::Noaction => "noaction",
            Self::Notfound => "notfound",
            Self::Noaccess => "noaccess",
            Self::Badrequest => "badrequest",
            Self::Autherror => "autherror",
            Self::Badresponse => "badresponse",
            Self::Timeout => "timeout",
            Self::Error => "error",
        }
    }

    /// Returns `true` for statuses that represent a successful outcome.
    ///
    /// `Queued` counts as success: the action was accepted for deferred
    /// execution.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::Queued)
    }

    /// Returns `true` for statuses that represent a failure.
    ///
    /// `Notfound` and `Noaction` are not failures: they are valid
    /// business outcomes.
    #[must_use]
    pub const fn is_error(self) -> bool {
        !matches!(self, Self::Ok | Self::Queued | Self::Noaction | Self::Notfound)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
