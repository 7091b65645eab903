use proptest::prelude::*;
use snapshot_tool::system::process::{ProcessClassifier, filter_names};
use snapshot_tool::system::snapshot::{MemoryStats, ProcessEntry, Snapshot};

fn make_snapshot(entries: &[(String, bool, bool)]) -> Snapshot {
    let processes = entries
        .iter()
        .enumerate()
        .map(|(i, (name, system, has_cmdline))| {
            let cmdline = match (*has_cmdline, *system) {
                (false, _) => Vec::new(),
                (true, true) => vec![format!("/usr/bin/{name}"), "--flag".to_string()],
                (true, false) => vec![format!(r"C:\Users\y\{name}.exe")],
            };
            ProcessEntry {
                pid: i as u32,
                name: name.clone(),
                cmdline,
            }
        })
        .collect();
    Snapshot {
        processes,
        memory: MemoryStats::default(),
        connections: Vec::new(),
    }
}

proptest! {
    #[test]
    fn every_process_lands_in_exactly_one_bucket(
        entries in prop::collection::vec(("[a-z]{1,6}", any::<bool>(), any::<bool>()), 0..60),
    ) {
        let snapshot = make_snapshot(&entries);
        let classification = ProcessClassifier::default().classify(&snapshot);

        prop_assert_eq!(
            classification.system.len() + classification.user.len(),
            snapshot.processes.len()
        );

        let expected_system: Vec<&String> = entries
            .iter()
            .filter(|(_, system, has_cmdline)| *system && *has_cmdline)
            .map(|(name, _, _)| name)
            .collect();
        let expected_user: Vec<&String> = entries
            .iter()
            .filter(|(_, system, has_cmdline)| !(*system && *has_cmdline))
            .map(|(name, _, _)| name)
            .collect();
        prop_assert_eq!(classification.system.iter().collect::<Vec<_>>(), expected_system);
        prop_assert_eq!(classification.user.iter().collect::<Vec<_>>(), expected_user);
    }

    #[test]
    fn filter_never_invents_names(
        names in prop::collection::vec("[A-Za-z]{0,8}", 0..40),
        query in "[A-Za-z]{0,3}",
    ) {
        let matched = filter_names(&names, &query);
        prop_assert!(matched.len() <= names.len());
        for name in &matched {
            prop_assert!(name.to_lowercase().contains(&query.to_lowercase()));
        }
    }
}
