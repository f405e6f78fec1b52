//! FallbackPolicy - 拒否された書き込みをどう組み直してリトライするか

use std::fmt;

use super::columns::{COMPLETED_AT, LogicalColumn, WriteColumns};
use crate::domain::BackendError;
use crate::ports::Row;

/// Attempt caps for schema-fallback retries.
///
/// There is no backoff: every retry sends a strictly smaller or renamed
/// payload, never the same one twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPolicy {
    /// Maximum number of update requests for one mutation.
    pub max_update_attempts: u32,

    /// Maximum number of insert requests for one creation.
    pub max_create_attempts: u32,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            max_update_attempts: 3,
            max_create_attempts: 3,
        }
    }
}

/// One payload change made in response to a rejected write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adjustment {
    /// Drop an optional column.
    Strip(String),
    /// Write the completion flag under its other spelling.
    Rename { from: String, to: String },
}

impl Adjustment {
    pub fn apply(&self, row: &mut Row) {
        match self {
            Adjustment::Strip(column) => {
                row.remove(column);
            }
            Adjustment::Rename { from, to } => {
                if let Some(value) = row.remove(from) {
                    row.insert(to.clone(), value);
                }
            }
        }
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adjustment::Strip(column) => write!(f, "strip {column}"),
            Adjustment::Rename { from, to } => write!(f, "rename {from} -> {to}"),
        }
    }
}

impl FallbackPolicy {
    /// Picks the adjustment for `err`, or `None` when the error is not about
    /// a column this payload can live without.
    ///
    /// Checked in order: the label column, `completed_at`, then the
    /// completion flag (renamed at most once per mutation).
    ///
    /// # Arguments
    /// * `row` - The payload that was just rejected.
    /// * `columns` - Physical names the payload was built with.
    /// * `renamed` - Whether the completion flag was already renamed.
    pub fn adjustment_for(
        &self,
        err: &BackendError,
        row: &Row,
        columns: &WriteColumns,
        renamed: bool,
    ) -> Option<Adjustment> {
        if row.contains_key(&columns.label) && err.mentions(&columns.label) {
            return Some(Adjustment::Strip(columns.label.clone()));
        }
        if row.contains_key(COMPLETED_AT) && err.mentions(COMPLETED_AT) {
            return Some(Adjustment::Strip(COMPLETED_AT.to_string()));
        }
        if !renamed && row.contains_key(&columns.completion) && err.mentions(&columns.completion) {
            let to = LogicalColumn::Completion.alternate(&columns.completion)?;
            return Some(Adjustment::Rename {
                from: columns.completion.clone(),
                to: to.to_string(),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn default_policy_caps_at_three() {
        let policy = FallbackPolicy::default();
        assert_eq!(policy.max_update_attempts, 3);
        assert_eq!(policy.max_create_attempts, 3);
    }

    #[test]
    fn label_error_strips_the_label_column_in_use() {
        let policy = FallbackPolicy::default();
        let columns = WriteColumns {
            completion: "is_complete".into(),
            label: "category".into(),
        };
        let payload = row(json!({"content": "x", "category": "Work"}));
        let err = BackendError::new("Could not find the 'category' column of 'tasks'");

        let adj = policy.adjustment_for(&err, &payload, &columns, false);

        assert_eq!(adj, Some(Adjustment::Strip("category".into())));
    }

    #[test]
    fn completed_at_error_strips_timestamp() {
        let policy = FallbackPolicy::default();
        let payload = row(json!({"isComplete": true, "completed_at": "2026-10-16T00:00:00Z"}));
        let err = BackendError::new("column \"completed_at\" of relation \"tasks\" does not exist");

        let mut rejected = payload.clone();
        let adj = policy
            .adjustment_for(&err, &payload, &WriteColumns::default(), false)
            .unwrap();
        adj.apply(&mut rejected);

        assert_eq!(adj, Adjustment::Strip(COMPLETED_AT.into()));
        assert_eq!(rejected, row(json!({"isComplete": true})));
    }

    #[test]
    fn completion_flag_is_renamed_once() {
        let policy = FallbackPolicy::default();
        let mut payload = row(json!({"isComplete": true}));
        let err = BackendError::new("Could not find the 'isComplete' column");

        let adj = policy
            .adjustment_for(&err, &payload, &WriteColumns::default(), false)
            .unwrap();
        adj.apply(&mut payload);
        assert_eq!(payload, row(json!({"is_complete": true})));

        let columns = WriteColumns {
            completion: "is_complete".into(),
            ..WriteColumns::default()
        };
        let err = BackendError::new("Could not find the 'is_complete' column");
        assert_eq!(policy.adjustment_for(&err, &payload, &columns, true), None);
    }

    #[test]
    fn unrelated_errors_get_no_adjustment() {
        let policy = FallbackPolicy::default();
        let payload = row(json!({"label": "Work", "completed_at": null}));
        let err = BackendError::new("new row violates row-level security policy");

        assert_eq!(
            policy.adjustment_for(&err, &payload, &WriteColumns::default(), false),
            None
        );
    }

    #[test]
    fn absent_fields_are_never_adjusted() {
        let policy = FallbackPolicy::default();
        let payload = row(json!({"content": "x"}));
        let err = BackendError::new("label completed_at isComplete");

        assert_eq!(
            policy.adjustment_for(&err, &payload, &WriteColumns::default(), false),
            None
        );
    }
}
