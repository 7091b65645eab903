//! Plain-text rendering of engine results for the command-line shell.

use crate::store::{DeleteOutcome, DeleteReport, captured_at};
use crate::system::launch::RestoreReport;
use crate::system::process::Classification;
use crate::system::snapshot::{MemoryStats, Snapshot};

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

pub fn display_name(name: &str) -> &str {
    if name.is_empty() { "<unknown>" } else { name }
}

pub fn snapshot_list(names: &[String]) -> String {
    if names.is_empty() {
        return "No snapshots available.".to_string();
    }
    let mut out = String::from("Available snapshots:");
    for name in names {
        match captured_at(name) {
            Some(at) => out.push_str(&format!("\n  {name}  ({})", at.format("%Y-%m-%d %H:%M:%S"))),
            None => out.push_str(&format!("\n  {name}")),
        }
    }
    out
}

pub fn memory_summary(memory: &MemoryStats) -> String {
    format!(
        "Memory: {} used of {} ({:.1}%), {} available, {} free",
        format_bytes(memory.used),
        format_bytes(memory.total),
        memory.percent,
        format_bytes(memory.available),
        format_bytes(memory.free),
    )
}

pub fn snapshot_summary(name: &str, snapshot: &Snapshot, classification: &Classification) -> String {
    [
        format!("Snapshot {name}"),
        memory_summary(&snapshot.memory),
        format!(
            "Processes: {} ({} system, {} user)",
            snapshot.processes.len(),
            classification.system.len(),
            classification.user.len()
        ),
        format!("Connections: {}", snapshot.connections.len()),
    ]
    .join("\n")
}

pub fn restore_lines(reports: &[RestoreReport]) -> Vec<String> {
    reports
        .iter()
        .map(|r| format!("  {}: {} ({})", r.outcome, display_name(&r.name), r.detail))
        .collect()
}

pub fn delete_lines(reports: &[DeleteReport]) -> Vec<String> {
    if reports.is_empty() {
        return vec!["No snapshots available to delete.".to_string()];
    }
    let failed = reports
        .iter()
        .filter(|r| r.outcome == DeleteOutcome::Failed)
        .count();
    let mut lines: Vec<String> = reports
        .iter()
        .filter_map(|r| {
            r.detail
                .as_ref()
                .map(|detail| format!("  Error deleting {}: {detail}", r.name))
        })
        .collect();
    if failed == 0 {
        lines.push("All snapshots deleted successfully.".to_string());
    } else {
        lines.push(format!(
            "Deleted {} of {} snapshots.",
            reports.len() - failed,
            reports.len()
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::launch::RestoreOutcome;

    #[test]
    fn bytes_use_binary_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.5 MB");
        assert_eq!(format_bytes(8 * 1024 * 1024 * 1024), "8.0 GB");
    }

    #[test]
    fn empty_list_message() {
        assert_eq!(snapshot_list(&[]), "No snapshots available.");
    }

    #[test]
    fn list_shows_capture_time() {
        let out = snapshot_list(&["snapshot_2024-03-09_08-05-01.json".to_string()]);
        assert!(out.contains("(2024-03-09 08:05:01)"));
    }

    #[test]
    fn restore_lines_name_unknown_processes() {
        let lines = restore_lines(&[RestoreReport {
            name: String::new(),
            outcome: RestoreOutcome::Skipped,
            detail: "no command line available".into(),
        }]);
        assert_eq!(lines, vec!["  Skipped: <unknown> (no command line available)"]);
    }

    #[test]
    fn partial_delete_counts_failures() {
        let reports = vec![
            DeleteReport {
                name: "a.json".into(),
                outcome: DeleteOutcome::Deleted,
                detail: None,
            },
            DeleteReport {
                name: "b.json".into(),
                outcome: DeleteOutcome::Failed,
                detail: Some("denied".into()),
            },
        ];
        let lines = delete_lines(&reports);
        assert_eq!(lines, vec!["  Error deleting b.json: denied", "Deleted 1 of 2 snapshots."]);
    }
}
