use std::collections::HashSet;

use super::snapshot::{ProcessEntry, Snapshot};

pub const DEFAULT_SYSTEM_MARKERS: [&str; 2] = ["Windows", "/usr/"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessCategory {
    System,
    User,
}

impl ProcessCategory {
    pub fn label(self) -> &'static str {
        match self {
            ProcessCategory::System => "System Apps",
            ProcessCategory::User => "User Apps",
        }
    }
}

/// Process names split by category, in snapshot order, duplicates kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Classification {
    pub system: Vec<String>,
    pub user: Vec<String>,
}

impl Classification {
    pub fn names(&self, category: ProcessCategory) -> &[String] {
        match category {
            ProcessCategory::System => &self.system,
            ProcessCategory::User => &self.user,
        }
    }

    pub fn len(&self) -> usize {
        self.system.len() + self.user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Groups processes by whether their executable path looks like it lives in
/// an OS directory. A display heuristic only; misclassification is harmless.
#[derive(Clone, Debug)]
pub struct ProcessClassifier {
    markers: Vec<String>,
}

impl Default for ProcessClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_MARKERS.iter().map(|m| m.to_string()).collect())
    }
}

impl ProcessClassifier {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    pub fn category(&self, entry: &ProcessEntry) -> ProcessCategory {
        let path = entry.cmdline.first().map(String::as_str).unwrap_or("");
        if self
            .markers
            .iter()
            .any(|marker| !marker.is_empty() && path.contains(marker.as_str()))
        {
            ProcessCategory::System
        } else {
            ProcessCategory::User
        }
    }

    pub fn classify(&self, snapshot: &Snapshot) -> Classification {
        let mut classification = Classification::default();
        for entry in &snapshot.processes {
            let bucket = match self.category(entry) {
                ProcessCategory::System => &mut classification.system,
                ProcessCategory::User => &mut classification.user,
            };
            bucket.push(entry.name.clone());
        }
        classification
    }
}

/// Case-insensitive substring search over names, order preserved.
pub fn filter_names<'a>(names: &'a [String], query: &str) -> Vec<&'a str> {
    let needle = query.to_lowercase();
    names
        .iter()
        .filter(|name| name.to_lowercase().contains(&needle))
        .map(String::as_str)
        .collect()
}

/// First occurrence of each name, for selection lists.
pub fn unique_names<'a, I>(names: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    names.into_iter().filter(|name| seen.insert(*name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::snapshot::MemoryStats;

    fn entry(pid: u32, name: &str, cmdline: &[&str]) -> ProcessEntry {
        ProcessEntry {
            pid,
            name: name.to_string(),
            cmdline: cmdline.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn snapshot(processes: Vec<ProcessEntry>) -> Snapshot {
        Snapshot {
            processes,
            memory: MemoryStats::default(),
            connections: Vec::new(),
        }
    }

    #[test]
    fn usr_paths_are_system_and_user_profile_paths_are_user() {
        let snap = snapshot(vec![
            entry(1, "x", &["/usr/bin/x"]),
            entry(2, "app", &[r"C:\Users\y\app.exe"]),
        ]);
        let classification = ProcessClassifier::default().classify(&snap);
        assert_eq!(classification.system, vec!["x"]);
        assert_eq!(classification.user, vec!["app"]);
    }

    #[test]
    fn windows_directory_counts_as_system() {
        let classifier = ProcessClassifier::default();
        let svc = entry(4, "svchost.exe", &[r"C:\Windows\System32\svchost.exe", "-k"]);
        assert_eq!(classifier.category(&svc), ProcessCategory::System);
    }

    #[test]
    fn empty_cmdline_is_user() {
        let classifier = ProcessClassifier::default();
        assert_eq!(classifier.category(&entry(2, "kthreadd", &[])), ProcessCategory::User);
    }

    #[test]
    fn duplicates_and_order_are_kept() {
        let snap = snapshot(vec![
            entry(10, "bash", &["/usr/bin/bash"]),
            entry(11, "editor", &["/home/me/bin/editor"]),
            entry(12, "bash", &["/usr/bin/bash"]),
            entry(13, "agent", &["/opt/agent"]),
        ]);
        let classification = ProcessClassifier::default().classify(&snap);
        assert_eq!(classification.system, vec!["bash", "bash"]);
        assert_eq!(classification.user, vec!["editor", "agent"]);
        assert_eq!(classification.len(), 4);
    }

    #[test]
    fn custom_markers_replace_defaults() {
        let classifier = ProcessClassifier::new(vec!["/opt/".to_string()]);
        assert_eq!(
            classifier.category(&entry(1, "agent", &["/opt/agent"])),
            ProcessCategory::System
        );
        assert_eq!(
            classifier.category(&entry(2, "ls", &["/usr/bin/ls"])),
            ProcessCategory::User
        );
    }

    #[test]
    fn filter_is_case_insensitive() {
        let names: Vec<String> = ["Firefox", "firewalld", "bash"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(filter_names(&names, "FIRE"), vec!["Firefox", "firewalld"]);
        assert_eq!(filter_names(&names, "").len(), 3);
    }

    #[test]
    fn unique_names_keeps_first_occurrence() {
        let names = ["b", "a", "b", "c", "a"];
        assert_eq!(unique_names(names), vec!["b", "a", "c"]);
    }
}
