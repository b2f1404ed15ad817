//! Processing options: how much work an acquisition performs.

use serde::{Deserialize, Serialize};

/// Desired depth of work for an acquisition.
///
/// Ordered: a higher variant is a strict superset of the work of a lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingOption {
    /// Acquire the image handle only.
    NoAction,
    /// Acquire the handle and read (verify and extract) every layer.
    ReadImage,
}

impl ProcessingOption {
    /// Collapse caller-supplied options into the effective one.
    ///
    /// An empty list resolves to [`ProcessingOption::ReadImage`], not
    /// `NoAction`: passing nothing asks for eager acquisition, while passing
    /// `NoAction` explicitly asks for the handle alone.
    pub fn resolve(options: &[ProcessingOption]) -> ProcessingOption {
        options
            .iter()
            .copied()
            .max()
            .unwrap_or(ProcessingOption::ReadImage)
    }
}

impl std::fmt::Display for ProcessingOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAction => write!(f, "no-action"),
            Self::ReadImage => write!(f, "read-image"),
        }
    }
}

impl std::str::FromStr for ProcessingOption {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "no-action" => Ok(Self::NoAction),
            "read-image" => Ok(Self::ReadImage),
            _ => Err(format!(
                "unknown processing option: '{}' (supported: no-action, read-image)",
                s
            )),
        }
    }
}
