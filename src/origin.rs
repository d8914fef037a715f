//! Request origin
//!
//! Callers state explicitly whether an outbound request serves an interactive
//! user or unattended startup/background work. The authenticator selects the
//! grant flow from this value alone.

use crate::oauth::Principal;

/// Where an outbound request comes from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestOrigin {
    /// Servicing an inbound user-facing request on behalf of `Principal`
    Interactive(Principal),
    /// Application startup or background activity, no user present
    #[default]
    Background,
}

impl RequestOrigin {
    /// Interactive origin for a named user
    pub fn interactive(user: impl Into<String>) -> Self {
        Self::Interactive(Principal::user(user))
    }

    /// Whether an end user is involved
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive(_))
    }

    /// The interactive principal, if any
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Interactive(principal) => Some(principal),
            Self::Background => None,
        }
    }
}
