//! Which side of a target wins a cycle

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Authoritative side for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preference {
    /// Module files win
    Modules,
    /// The domain file wins
    Domain,
    /// Both changed: unassigned items follow the domain, owned items the modules
    Mixed,
}

impl Preference {
    /// Decide from what changed since the last recorded cycle.
    ///
    /// Without a record, existing module files win, then an existing domain
    /// file. With a record, the side that changed wins; both changing is
    /// `Mixed` and neither changing falls back to `Modules`.
    pub fn decide(
        has_state: bool,
        domain_changed: bool,
        modules_changed: bool,
        domain_exists: bool,
        modules_exist: bool,
    ) -> Self {
        if !has_state {
            return if modules_exist || !domain_exists {
                Self::Modules
            } else {
                Self::Domain
            };
        }
        match (domain_changed, modules_changed) {
            (true, false) => Self::Domain,
            (true, true) => Self::Mixed,
            _ => Self::Modules,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modules => "modules",
            Self::Domain => "domain",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "modules" => Ok(Self::Modules),
            "domain" => Ok(Self::Domain),
            "mixed" => Ok(Self::Mixed),
            _ => Err(Error::invalid("Unsupported preference override.")),
        }
    }
}

/// Which sides a cycle may write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    #[default]
    All,
    Domain,
    Modules,
}

impl WriteMode {
    pub fn writes_domain(&self) -> bool {
        matches!(self, Self::All | Self::Domain)
    }

    pub fn writes_modules(&self) -> bool {
        matches!(self, Self::All | Self::Modules)
    }
}
