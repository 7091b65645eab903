use std::collections::HashSet;
use std::fmt;
use std::process::{Command, Stdio};

use super::platform;
use super::snapshot::{ProcessEntry, Snapshot};
use crate::error::SnapshotError;

pub const SKIPPED_NO_CMDLINE: &str = "no command line available";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreOutcome {
    Started,
    Failed,
    Skipped,
}

impl fmt::Display for RestoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RestoreOutcome::Started => "Started",
            RestoreOutcome::Failed => "Failed",
            RestoreOutcome::Skipped => "Skipped",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestoreReport {
    pub name: String,
    pub outcome: RestoreOutcome,
    pub detail: String,
}

/// Relaunches processes from their recorded command lines. Children are
/// detached from our process group and console; each gets a small reaper
/// thread that waits on it, so exited children do not linger as zombies in a
/// long-running host.
#[derive(Clone, Copy, Debug, Default)]
pub struct RestoreExecutor;

impl RestoreExecutor {
    pub fn restore<S: AsRef<str>>(&self, snapshot: &Snapshot, selected: &[S]) -> Vec<RestoreReport> {
        let _restore_span = tracing::debug_span!("restore.selected").entered();

        let selected: HashSet<&str> = selected.iter().map(|s| s.as_ref()).collect();
        // Selection is by name: every entry sharing a selected name relaunches.
        snapshot
            .processes
            .iter()
            .filter(|entry| selected.contains(entry.name.as_str()))
            .map(|entry| self.relaunch(entry))
            .collect()
    }

    fn relaunch(&self, entry: &ProcessEntry) -> RestoreReport {
        let Some((program, args)) = entry.cmdline.split_first() else {
            tracing::info!(process = %entry.name, "skipped restore: {SKIPPED_NO_CMDLINE}");
            return RestoreReport {
                name: entry.name.clone(),
                outcome: RestoreOutcome::Skipped,
                detail: SKIPPED_NO_CMDLINE.to_string(),
            };
        };

        let command_line = entry.cmdline.join(" ");
        match spawn_detached(program, args) {
            Ok(pid) => {
                tracing::info!(process = %entry.name, pid, command = %command_line, "started process");
                RestoreReport {
                    name: entry.name.clone(),
                    outcome: RestoreOutcome::Started,
                    detail: format!("{command_line} (pid {pid})"),
                }
            }
            Err(source) => {
                let err = SnapshotError::Launch {
                    command: command_line,
                    source,
                };
                tracing::warn!(process = %entry.name, "{err}");
                RestoreReport {
                    name: entry.name.clone(),
                    outcome: RestoreOutcome::Failed,
                    detail: err.to_string(),
                }
            }
        }
    }
}

fn spawn_detached(program: &str, args: &[String]) -> std::io::Result<u32> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    platform::detach(&mut command);
    let mut child = command.spawn()?;
    let pid = child.id();
    let reaper = std::thread::Builder::new()
        .name(format!("reap-{pid}"))
        .spawn(move || {
            if let Err(e) = child.wait() {
                tracing::debug!(pid, "waiting on restored process failed: {e}");
            }
        });
    if let Err(e) = reaper {
        tracing::debug!(pid, "no reaper thread for restored process: {e}");
    }
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::snapshot::MemoryStats;

    fn snapshot(processes: Vec<ProcessEntry>) -> Snapshot {
        Snapshot {
            processes,
            memory: MemoryStats::default(),
            connections: Vec::new(),
        }
    }

    #[test]
    fn empty_cmdline_is_skipped() {
        let snap = snapshot(vec![ProcessEntry {
            pid: 7,
            name: "Notepad".into(),
            cmdline: Vec::new(),
        }]);
        let reports = RestoreExecutor.restore(&snap, &["Notepad"]);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].outcome, RestoreOutcome::Skipped);
        assert_eq!(reports[0].detail, SKIPPED_NO_CMDLINE);
    }

    #[test]
    fn unselected_names_are_ignored() {
        let snap = snapshot(vec![ProcessEntry {
            pid: 7,
            name: "other".into(),
            cmdline: vec!["/nonexistent/other".into()],
        }]);
        assert!(RestoreExecutor.restore(&snap, &["Notepad"]).is_empty());
    }

    fn started_pid(report: &RestoreReport) -> u32 {
        let digits = report
            .detail
            .rsplit("(pid ")
            .next()
            .and_then(|tail| tail.strip_suffix(')'))
            .unwrap();
        digits.parse().unwrap()
    }

    #[test]
    fn exited_children_are_reaped() {
        let shell = std::path::Path::new("/bin/sh");
        if !shell.exists() || !std::path::Path::new("/proc/self").exists() {
            return;
        }
        let snap = snapshot(vec![ProcessEntry {
            pid: 9,
            name: "sh".into(),
            cmdline: vec!["/bin/sh".into(), "-c".into(), "exit 0".into()],
        }]);
        let reports = RestoreExecutor.restore(&snap, &["sh"]);
        assert_eq!(reports[0].outcome, RestoreOutcome::Started);
        let proc_dir = std::path::PathBuf::from(format!("/proc/{}", started_pid(&reports[0])));

        // A zombie keeps its /proc entry until someone waits on it.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while proc_dir.exists() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(!proc_dir.exists(), "{} still present", proc_dir.display());
    }

    #[test]
    fn missing_binary_fails_without_stopping_batch() {
        let snap = snapshot(vec![
            ProcessEntry {
                pid: 1,
                name: "ghost".into(),
                cmdline: vec!["/nonexistent/snapshot-tool-ghost".into()],
            },
            ProcessEntry {
                pid: 2,
                name: "ghost".into(),
                cmdline: Vec::new(),
            },
        ]);
        let reports = RestoreExecutor.restore(&snap, &["ghost".to_string()]);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].outcome, RestoreOutcome::Failed);
        assert!(reports[0].detail.contains("/nonexistent/snapshot-tool-ghost"));
        assert_eq!(reports[1].outcome, RestoreOutcome::Skipped);
    }
}
