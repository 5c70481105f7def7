//! Façade-level unit tests. Whole-log crash-recovery and multi-session
//! scenarios live under `tests/` instead, since they open real files twice
//! (across a simulated "close").

use crate::{Entry, EntryType, NullObserver, RaftLog, RaftLogConfig, RaftLogObserver};
use tempfile::tempdir;

fn config(path: std::path::PathBuf) -> RaftLogConfig {
    RaftLogConfig::builder()
        .path(path)
        .dbid("0123456789abcdef0123456789abcdef")
        .node_id(1)
        .build()
}

fn entry(term: u64, id: u32, payload: &str) -> Entry {
    Entry::new(term, EntryType::Normal, id, payload.as_bytes().to_vec())
}

#[test]
fn random_access_scenario() {
    let dir = tempdir().unwrap();
    let mut log = RaftLog::create(config(dir.path().join("raft.log"))).unwrap();

    log.append(entry(1, 3, "value1")).unwrap();
    log.append(entry(10, 30, "value2")).unwrap();

    assert!(log.get(0).unwrap().is_none());
    assert!(log.get(3).unwrap().is_none());
    assert_eq!(log.get(1).unwrap().unwrap().id, 3);
    assert_eq!(log.get(2).unwrap().unwrap().id, 30);
}

#[test]
fn snapshot_reframing_scenario() {
    let dir = tempdir().unwrap();
    let mut log = RaftLog::create(config(dir.path().join("raft.log"))).unwrap();

    log.reset(100, 1).unwrap();
    log.append(entry(1, 3, "value1")).unwrap();
    log.append(entry(10, 30, "value2")).unwrap();

    assert!(log.get(99).unwrap().is_none());
    assert!(log.get(100).unwrap().is_none());
    assert!(log.get(103).unwrap().is_none());
    assert_eq!(log.get(101).unwrap().unwrap().id, 3);
    assert_eq!(log.get(102).unwrap().unwrap().id, 30);
}

#[derive(Default)]
struct RecordingObserver {
    deleted: Vec<(u32, u64)>,
}

impl RaftLogObserver for RecordingObserver {
    fn on_deleted(&mut self, entry: &crate::EntryRef, index: u64) {
        self.deleted.push((entry.id, index));
    }
}

#[test]
fn delete_and_reappend_scenario() {
    let dir = tempdir().unwrap();
    let mut log = RaftLog::create(config(dir.path().join("raft.log"))).unwrap();

    log.reset(50, 1).unwrap();
    log.append(entry(1, 3, "value1")).unwrap();
    log.append(entry(1, 20, "value2")).unwrap();
    log.append(entry(1, 30, "value3")).unwrap();

    let mut observer = RecordingObserver::default();
    let deleted = log.delete(52, Some(&mut observer)).unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(observer.deleted, vec![(20, 52), (30, 53)]);

    assert_eq!(log.count(), 1);
    assert!(log.get(52).unwrap().is_none());
    assert_eq!(log.get(51).unwrap().unwrap().id, 3);

    log.append(entry(1, 30, "value3")).unwrap();
    log.append(entry(1, 20, "value2")).unwrap();
    assert_eq!(log.get(52).unwrap().unwrap().id, 30);
    assert_eq!(log.get(53).unwrap().unwrap().id, 20);
}

#[test]
fn vote_persistence_scenario() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("raft.log");
    let mut log = RaftLog::create(config(path.clone())).unwrap();
    log.append(entry(1, 3, "value1")).unwrap();
    log.append(entry(1, 30, "value2")).unwrap();
    log.set_term(0xffff_ffff, i32::MAX).unwrap();
    drop(log);

    let mut reopened = RaftLog::open(&path).unwrap();
    assert_eq!(reopened.current_term(), 0xffff_ffff);
    assert_eq!(reopened.vote(), i32::MAX);
    assert_eq!(reopened.get(1).unwrap().unwrap().id, 3);
}

#[test]
fn entries_after_a_higher_vote_term_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("raft.log");
    let mut log = RaftLog::create(config(path.clone())).unwrap();
    log.append(entry(3, 1, "a")).unwrap();
    log.set_term(5, 2).unwrap();
    log.append(entry(3, 2, "b")).unwrap();
    log.sync().unwrap();
    drop(log);

    let mut reopened = RaftLog::open(&path).unwrap();
    assert_eq!(reopened.current_term(), 5);
    assert_eq!(reopened.count(), 2);
    assert_eq!(reopened.get(1).unwrap().unwrap().id, 1);
    assert_eq!(reopened.get(2).unwrap().unwrap().id, 2);
}

#[test]
fn set_term_rejects_regression() {
    let dir = tempdir().unwrap();
    let mut log = RaftLog::create(config(dir.path().join("raft.log"))).unwrap();
    log.set_term(5, 1).unwrap();
    assert!(log.set_term(4, 2).is_err());
}

#[test]
fn append_rejects_a_term_regression() {
    let dir = tempdir().unwrap();
    let mut log = RaftLog::create(config(dir.path().join("raft.log"))).unwrap();
    log.append(entry(5, 1, "a")).unwrap();
    assert!(log.append(entry(4, 2, "b")).is_err());
}

#[test]
fn load_entries_replays_in_ascending_order() {
    let dir = tempdir().unwrap();
    let mut log = RaftLog::create(config(dir.path().join("raft.log"))).unwrap();
    log.append(entry(1, 1, "a")).unwrap();
    log.append(entry(1, 2, "b")).unwrap();
    log.append(entry(1, 3, "c")).unwrap();

    struct Collector(Vec<u32>);
    impl RaftLogObserver for Collector {
        fn on_loaded(&mut self, entry: &crate::EntryRef, _index: u64) -> bool {
            self.0.push(entry.id);
            true
        }
    }
    let mut collector = Collector(Vec::new());
    let loaded = log.load_entries(&mut collector).unwrap();
    assert_eq!(loaded, 3);
    assert_eq!(collector.0, vec![1, 2, 3]);
}

#[test]
fn load_entries_stops_when_observer_returns_false() {
    let dir = tempdir().unwrap();
    let mut log = RaftLog::create(config(dir.path().join("raft.log"))).unwrap();
    log.append(entry(1, 1, "a")).unwrap();
    log.append(entry(1, 2, "b")).unwrap();

    struct StopAfterOne(u32);
    impl RaftLogObserver for StopAfterOne {
        fn on_loaded(&mut self, _entry: &crate::EntryRef, _index: u64) -> bool {
            self.0 += 1;
            self.0 < 1
        }
    }
    let mut stop = StopAfterOne(0);
    let loaded = log.load_entries(&mut stop).unwrap();
    assert_eq!(loaded, 1);
}

#[test]
fn null_observer_is_a_no_op() {
    let dir = tempdir().unwrap();
    let mut log = RaftLog::create(config(dir.path().join("raft.log"))).unwrap();
    log.append(entry(1, 1, "a")).unwrap();
    let mut obs = NullObserver;
    assert_eq!(log.delete(1, Some(&mut obs)).unwrap(), 1);
}
