use axum::Router;
use std::fmt;

use crate::app::AppContext;

/// A self-contained group of HTTP routes that can be mounted independently.
///
/// Groups carry their own paths (`/api/books/...`); bootstrap merges them
/// into the application router and never inspects their contents.
pub trait RouteGroup: Send {
    fn name(&self) -> &str;

    /// Build the group's router. A failure leaves the rest of the
    /// application serving.
    fn routes(&self, ctx: &AppContext) -> Result<Router, RouteGroupError>;

    /// Create-if-missing DDL this group needs before serving.
    fn schema(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteGroupError {
    /// The group is not linked into this build.
    Unavailable(String),
    /// The group is present but could not assemble its routes.
    Invalid(String),
}

impl fmt::Display for RouteGroupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteGroupError::Unavailable(msg) => write!(f, "Route group unavailable: {}", msg),
            RouteGroupError::Invalid(msg) => write!(f, "Route group invalid: {}", msg),
        }
    }
}

impl std::error::Error for RouteGroupError {}

/// Result of attempting to mount one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRegistration {
    pub name: String,
    pub outcome: Result<(), RouteGroupError>,
}

impl GroupRegistration {
    pub fn is_loaded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Names of the standard collaborator groups, in mount order.
pub const COLLABORATOR_GROUPS: [&str; 4] = ["auth", "books", "issuance", "reports"];

/// A collaborator slot with no implementation linked into this build.
pub struct Unlinked {
    name: &'static str,
}

impl Unlinked {
    pub fn new(name: &'static str) -> Unlinked {
        Unlinked { name }
    }
}

impl RouteGroup for Unlinked {
    fn name(&self) -> &str {
        self.name
    }

    fn routes(&self, _ctx: &AppContext) -> Result<Router, RouteGroupError> {
        Err(RouteGroupError::Unavailable(format!(
            "no '{}' routes are linked into this build",
            self.name
        )))
    }
}

/// The four standard slots (auth, books, issuance, reports).
pub fn collaborators() -> Vec<Box<dyn RouteGroup>> {
    COLLABORATOR_GROUPS
        .iter()
        .map(|name| Box::new(Unlinked::new(*name)) as Box<dyn RouteGroup>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_slots() {
        let names: Vec<String> = collaborators().iter().map(|g| g.name().to_string()).collect();
        assert_eq!(names, vec!["auth", "books", "issuance", "reports"]);
    }

    #[test]
    fn test_unlinked_group_has_no_schema() {
        assert!(Unlinked::new("reports").schema().is_empty());
    }

    #[test]
    fn test_registration_outcome() {
        let loaded = GroupRegistration {
            name: "books".to_string(),
            outcome: Ok(()),
        };
        let failed = GroupRegistration {
            name: "reports".to_string(),
            outcome: Err(RouteGroupError::Invalid("duplicate path".to_string())),
        };
        assert!(loaded.is_loaded());
        assert!(!failed.is_loaded());
        assert_eq!(
            failed.outcome.unwrap_err().to_string(),
            "Route group invalid: duplicate path"
        );
    }
}
