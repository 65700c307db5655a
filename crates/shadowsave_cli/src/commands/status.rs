//! Status command implementation.

use shadowsave_core::{CommitState, ManifestState, SaveDir, SaveDirStatus};
use std::path::Path;

/// Runs the status command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let status = SaveDir::open(path)?.status();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        _ => {
            print!("{}", render_text(&status));
        }
    }

    Ok(())
}

/// Renders the human-readable report.
pub fn render_text(status: &SaveDirStatus) -> String {
    let mut out = String::new();
    out.push_str("ShadowSave Directory Status\n");
    out.push_str("===========================\n\n");
    out.push_str(&format!("Path: {}\n\n", status.path.display()));

    let backup = if status.backup_present {
        "present"
    } else {
        "absent"
    };
    out.push_str(&format!("Backup directory: {backup}\n"));

    let manifest = match &status.manifest {
        ManifestState::Missing => "missing".to_string(),
        ManifestState::Readable { pid, files } => {
            format!("{} files (written by pid {pid})", files.len())
        }
        ManifestState::NoFileList { pid } => format!("no file list (written by pid {pid})"),
        ManifestState::Unreadable { reason } => format!("unreadable: {reason}"),
    };
    if status.backup_present {
        out.push_str(&format!("Backup manifest:  {manifest}\n"));
    }

    let marker = match &status.commit_marker {
        CommitState::Absent => "absent".to_string(),
        CommitState::Present { pid } => format!("present (pid {pid})"),
        CommitState::Unreadable { reason } => format!("present, unreadable: {reason}"),
    };
    out.push_str(&format!("Commit marker:    {marker}\n\n"));

    let verdict = if status.is_interrupted() {
        "interrupted save, run `shadowsave recover` to roll back"
    } else if status.needs_recovery() {
        "committed save with pending cleanup, run `shadowsave recover`"
    } else {
        "clean"
    };
    out.push_str(&format!("State: {verdict}\n"));
    out
}
