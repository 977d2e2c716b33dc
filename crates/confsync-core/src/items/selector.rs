//! Item selectors and operation requests

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Picks one item out of a module file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemSelector {
    /// Item of a list-shaped file, by identity and/or fingerprint
    ListId {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fingerprint: Option<String>,
    },
    /// Entry of a keyed file
    MapKey { key: String },
    /// Entry of a helper bundle
    Helper { helper_type: String, key: String },
    /// View of a dashboard file, by path and/or fingerprint
    LovelaceView {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fingerprint: Option<String>,
    },
}

impl ItemSelector {
    /// `(id, fingerprint)` of a list or view selector, blanks treated as absent.
    pub(crate) fn list_parts(&self) -> Option<(Option<&str>, Option<&str>)> {
        fn non_blank(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|v| !v.is_empty())
        }
        match self {
            Self::ListId { id, fingerprint } | Self::LovelaceView { id, fingerprint } => {
                Some((non_blank(id), non_blank(fingerprint)))
            }
            _ => None,
        }
    }

    pub(crate) fn map_key(&self) -> Result<&str> {
        match self {
            Self::MapKey { key } if !key.is_empty() => Ok(key),
            _ => Err(Error::invalid("Selector key is required.")),
        }
    }

    pub(crate) fn helper_parts(&self) -> Result<(&str, &str)> {
        match self {
            Self::Helper { helper_type, key } if !helper_type.is_empty() && !key.is_empty() => {
                Ok((helper_type, key))
            }
            _ => Err(Error::invalid("Selector helper_type and key are required.")),
        }
    }

    /// Short human label, e.g. for warnings.
    pub fn describe(&self) -> String {
        match self {
            Self::ListId { id, fingerprint } | Self::LovelaceView { id, fingerprint } => id
                .clone()
                .or_else(|| fingerprint.clone())
                .unwrap_or_else(|| "?".to_string()),
            Self::MapKey { key } => key.clone(),
            Self::Helper { helper_type, key } => format!("{}:{}", helper_type, key),
        }
    }
}

/// A selector together with the module file it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub path: String,
    pub selector: ItemSelector,
}

impl ItemRef {
    pub fn new(path: impl Into<String>, selector: ItemSelector) -> Self {
        Self {
            path: path.into(),
            selector,
        }
    }
}

/// Where moved items go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MoveTarget {
    /// A package directory that must already exist
    ExistingPackage { package_name: String },
    /// A package directory, created when missing
    NewPackage { package_name: String },
    /// A loose file in the domain's module directory
    OneOff { one_off_filename: String },
}

/// What to do with selected items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOperation {
    Move(MoveTarget),
    /// Move into the domain's unassigned bundle
    Unassign,
    /// Remove from the module file and from the domain file
    Delete,
}

impl ItemOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Move(_) => "move",
            Self::Unassign => "unassign",
            Self::Delete => "delete",
        }
    }
}
