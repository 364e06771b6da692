use std::fs;
use std::path::Path;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use laneguard_commons::{sha256_file, sha256_hex};
use laneguard_config::LocksConfig;
use laneguard_core::testing::FixedGuard;
use laneguard_core::{OperationKind, PathLockManager, SipEngine, SipError};

const WRITERS: usize = 6;
const ROUNDS: usize = 15;

fn engine(root: &Path, locks: &LocksConfig) -> SipEngine {
    let guard = Arc::new(FixedGuard::allow_all().rooted_at(root));
    SipEngine::new(PathLockManager::new(root.join(".locks"), locks), guard)
}

fn payload(writer: usize, round: usize) -> String {
    // Large enough that a torn write would be visible to a reader.
    let line = format!("writer={writer} round={round}\n");
    line.repeat(512)
}

#[test]
fn concurrent_writers_never_expose_partial_content() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(dir.path());
    let target = root.join("apps/shared.txt");
    let engine = engine(&root, &LocksConfig::default());
    let initial = engine
        .apply_sip(&target, Some(payload(0, 0).as_bytes()), OperationKind::Add)
        .unwrap();
    let initial_checksum = initial.checksum_after.clone().unwrap();
    let commits = Arc::new(Mutex::new(Vec::new()));

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let target = target.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut observed = 0usize;
            while !done.load(Ordering::Acquire) {
                let content = fs::read_to_string(&target).unwrap();
                let first = content.lines().next().unwrap().to_string();
                assert_eq!(content, format!("{first}\n").repeat(512));
                observed += 1;
            }
            observed
        })
    };

    let writers: Vec<_> = (1..=WRITERS)
        .map(|writer| {
            let engine = engine.clone();
            let target = target.clone();
            let commits = commits.clone();
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    let outcome = engine
                        .apply_sip(&target, Some(payload(writer, round).as_bytes()), OperationKind::Modify)
                        .unwrap();
                    commits.lock().unwrap().push((
                        outcome.checksum_before.unwrap(),
                        outcome.checksum_after.unwrap(),
                    ));
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::Release);
    assert!(reader.join().unwrap() > 0);

    let last = fs::read_to_string(&target).unwrap();
    assert!(last.starts_with("writer="));

    // Every commit must have replaced a state some other commit produced,
    // and each produced state is consumed at most once. A lost update
    // would show up as two commits sharing the same `before`.
    let commits = commits.lock().unwrap();
    assert_eq!(commits.len(), WRITERS * ROUNDS);
    let payloads: HashSet<String> = (1..=WRITERS)
        .flat_map(|writer| (0..ROUNDS).map(move |round| sha256_hex(payload(writer, round).as_bytes())))
        .collect();
    let afters: Vec<&String> = commits.iter().map(|(_, after)| after).collect();
    assert!(afters.iter().all(|after| payloads.contains(*after)));
    let mut consumed = HashSet::new();
    for (before, _) in commits.iter() {
        assert!(
            *before == initial_checksum || afters.contains(&before),
            "commit replaced content no writer produced: {before}"
        );
        assert!(consumed.insert(before.clone()), "two commits replaced the same state {before}");
    }
    let final_checksum = sha256_file(&target).unwrap();
    assert!(afters.contains(&&final_checksum));
    assert!(!consumed.contains(&final_checksum));
    let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(".sip-"))
        .collect();
    assert!(leftovers.is_empty());
    assert_eq!(fs::read_dir(root.join(".locks")).unwrap().count(), 0);
}

#[test]
fn held_lock_times_out_the_second_writer() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical_root(dir.path());
    let target = root.join("apps/held.txt");
    let locks = LocksConfig {
        acquire_timeout_ms: 50,
        retry_interval_ms: 5,
        stale_after_secs: 300,
    };
    let engine = engine(&root, &locks);

    let _held = engine.locks().acquire(&target).unwrap();
    let err = engine
        .apply_sip(&target, Some(b"late"), OperationKind::Add)
        .unwrap_err();
    assert!(matches!(err, SipError::LockTimeout { .. }), "{err}");
    assert!(!target.exists());
}

fn canonical_root(path: &Path) -> std::path::PathBuf {
    fs::canonicalize(path).unwrap()
}
