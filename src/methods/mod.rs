//! HTTP Method Routing
//!
//! Maps request verbs to per-verb handlers. Handlers are registered
//! explicitly per verb; HEAD falls back to the GET handler when no HEAD
//! handler is registered. A verb without a handler is rejected with the
//! list of verbs that would have been accepted, ready for an `allow` header.

pub mod table;

pub use table::{MethodTable, MethodTableBuilder};

use std::fmt;
use std::str::FromStr;

/// HTTP verbs a handler can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl Method {
    /// All verbs in table order
    pub const ALL: [Method; 5] = [
        Method::Get,
        Method::Head,
        Method::Post,
        Method::Put,
        Method::Delete,
    ];

    /// Wire representation of the verb
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Whether requests with this verb are expected to carry a body
    pub fn has_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for verbs outside the supported set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown method: {}", self.0)
    }
}

impl std::error::Error for UnknownMethod {}

impl FromStr for Method {
    type Err = UnknownMethod;

    /// Method names are case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// A request verb had no registered handler (HTTP 405)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodNotAllowed {
    /// Verbs the table does accept, in table order
    pub allowed: Vec<Method>,
}

impl MethodNotAllowed {
    pub const STATUS: u32 = 405;

    /// Value for the `allow` response header, e.g. `GET, HEAD`
    pub fn allow_header(&self) -> String {
        join_methods(&self.allowed)
    }

    pub fn status(&self) -> u32 {
        Self::STATUS
    }
}

impl fmt::Display for MethodNotAllowed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Allow: {}", self.allow_header())
    }
}

impl std::error::Error for MethodNotAllowed {}

pub(crate) fn join_methods(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
