//! Columns - 物理名が揺れている論理列

use std::fmt;

/// Physical name of the optional completion timestamp.
pub const COMPLETED_AT: &str = "completed_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalColumn {
    /// The completion flag: `isComplete` or `is_complete`.
    Completion,
    /// The category name: `label` or `category`.
    Label,
}

impl LogicalColumn {
    /// Probe order. The first candidate that exists wins.
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            LogicalColumn::Completion => &["isComplete", "is_complete"],
            LogicalColumn::Label => &["label", "category"],
        }
    }

    /// Used when no candidate could be confirmed.
    pub fn fallback(&self) -> &'static str {
        match self {
            LogicalColumn::Completion => "is_complete",
            LogicalColumn::Label => "category",
        }
    }

    /// The other spelling of `physical`, if `physical` is one of ours.
    pub fn alternate(&self, physical: &str) -> Option<&'static str> {
        let candidates = self.candidates();
        let index = candidates.iter().position(|c| *c == physical)?;
        candidates.iter().enumerate().find(|(i, _)| *i != index).map(|(_, c)| *c)
    }
}

impl fmt::Display for LogicalColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalColumn::Completion => f.write_str("completion"),
            LogicalColumn::Label => f.write_str("label"),
        }
    }
}

/// Physical names chosen for one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteColumns {
    pub completion: String,
    pub label: String,
}

impl Default for WriteColumns {
    fn default() -> Self {
        Self {
            completion: LogicalColumn::Completion.candidates()[0].to_string(),
            label: LogicalColumn::Label.candidates()[0].to_string(),
        }
    }
}
