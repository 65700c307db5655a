//! Recover command implementation.

use serde::Serialize;
use shadowsave_core::{recover_if_needed, RecoveryOutcome, SaveDir};
use std::path::Path;
use tracing::info;

/// Recovery report.
#[derive(Debug, Serialize)]
pub struct RecoverResult {
    /// Save directory path.
    pub path: String,
    /// Short outcome name.
    pub outcome: &'static str,
    /// Human-readable description.
    pub description: String,
    /// Files moved back from the backup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restored: Option<usize>,
    /// Live files removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
    /// Files that could not be restored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    /// Whether leftovers remain and recovery should be run again.
    pub needs_retry: bool,
}

impl RecoverResult {
    /// Builds the report for `outcome`.
    pub fn new(path: &Path, outcome: &RecoveryOutcome) -> Self {
        let mut result = Self {
            path: path.display().to_string(),
            outcome: "",
            description: String::new(),
            restored: None,
            removed: None,
            failed: None,
            needs_retry: outcome.needs_retry(),
        };

        let (name, description) = match outcome {
            RecoveryOutcome::Clean => ("clean", "nothing to recover".to_string()),
            RecoveryOutcome::StaleCommitMarkerRemoved => (
                "stale_commit_marker_removed",
                "removed the commit marker of a completed save".to_string(),
            ),
            RecoveryOutcome::CompletedCleanup => (
                "completed_cleanup",
                "the last save committed, removed its backup".to_string(),
            ),
            RecoveryOutcome::CleanupDeferred => (
                "cleanup_deferred",
                "cleanup failed, run recover again".to_string(),
            ),
            RecoveryOutcome::IncompleteBackupDiscarded => (
                "incomplete_backup_discarded",
                "a backup without manifest was discarded, live files untouched".to_string(),
            ),
            RecoveryOutcome::Restored { restored, removed } => {
                result.restored = Some(*restored);
                result.removed = Some(*removed);
                (
                    "restored",
                    format!("rolled back interrupted save: {restored} restored, {removed} removed"),
                )
            }
            RecoveryOutcome::DegradedRestore { restored } => {
                result.restored = Some(*restored);
                (
                    "degraded_restore",
                    format!(
                        "manifest unreadable: {restored} restored, files added by the save were kept"
                    ),
                )
            }
            RecoveryOutcome::PartialRestore { failed } => {
                result.failed = Some(*failed);
                (
                    "partial_restore",
                    format!("{failed} files could not be restored, backup kept"),
                )
            }
        };
        result.outcome = name;
        result.description = description;
        result
    }
}

/// Runs the recover command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    // Refuse paths that are not directories rather than report "clean".
    SaveDir::open(path)?;

    info!("Recovering save directory {:?}", path);
    let outcome = recover_if_needed(path);
    let result = RecoverResult::new(path, &outcome);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Path:    {}", result.path);
            println!("Outcome: {}", result.description);
        }
    }

    if outcome.needs_retry() {
        return Err(format!("recovery incomplete: {}", result.description).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restored_report_has_counts() {
        let outcome = RecoveryOutcome::Restored {
            restored: 3,
            removed: 1,
        };
        let result = RecoverResult::new(Path::new("/saves/slot1"), &outcome);

        assert_eq!(result.outcome, "restored");
        assert_eq!(result.restored, Some(3));
        assert_eq!(result.removed, Some(1));
        assert!(!result.needs_retry);
    }

    #[test]
    fn partial_report_needs_retry() {
        let outcome = RecoveryOutcome::PartialRestore { failed: 2 };
        let result = RecoverResult::new(Path::new("/saves/slot1"), &outcome);

        assert!(result.needs_retry);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["failed"], 2);
        assert!(json.get("restored").is_none());
    }

    #[test]
    fn run_on_clean_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("world.sav"), b"w").unwrap();

        run(dir.path(), "json").unwrap();
        assert_eq!(std::fs::read(dir.path().join("world.sav")).unwrap(), b"w");
    }

    #[test]
    fn run_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&dir.path().join("missing"), "text").is_err());
    }
}
