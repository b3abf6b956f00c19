//! In-memory state: the face gallery and the attendance log.

use rollcall_core::FaceTemplate;
use serde::Serialize;

/// One registered identity.
pub struct FaceRecord {
    pub name: String,
    pub template: FaceTemplate,
    pub enrolled_at: String,
}

/// Registered faces, kept in enrolment order.
///
/// Re-registering a name replaces its template in place, so the record keeps
/// its original position in the match scan. Matching walks oldest-first.
pub struct FaceStore {
    records: Vec<FaceRecord>,
    next_auto: u64,
}

impl FaceStore {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            next_auto: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FaceRecord> {
        self.records.iter()
    }

    /// Insert a record, or overwrite the template of an existing name.
    /// Returns true when an existing record was replaced.
    pub fn insert(&mut self, name: String, template: FaceTemplate, enrolled_at: String) -> bool {
        match self.records.iter_mut().find(|r| r.name == name) {
            Some(existing) => {
                existing.template = template;
                existing.enrolled_at = enrolled_at;
                true
            }
            None => {
                self.records.push(FaceRecord {
                    name,
                    template,
                    enrolled_at,
                });
                false
            }
        }
    }

    /// Next free `user_N` name. The counter is per-process and never rewinds,
    /// skipping over names already taken by explicit registrations.
    pub fn next_auto_name(&mut self) -> String {
        loop {
            let candidate = format!("user_{}", self.next_auto);
            self.next_auto += 1;
            if !self.contains(&candidate) {
                return candidate;
            }
        }
    }
}

impl Default for FaceStore {
    fn default() -> Self {
        Self::new()
    }
}

/// One marked attendance.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRecord {
    pub name: String,
    pub time: String,
}

/// Append-only attendance log. Every successful mark adds a record; nothing
/// deduplicates or expires them.
#[derive(Default)]
pub struct AttendanceLog {
    records: Vec<AttendanceRecord>,
}

impl AttendanceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn append(&mut self, name: String, time: String) {
        self.records.push(AttendanceRecord { name, time });
    }

    pub fn snapshot(&self) -> Vec<AttendanceRecord> {
        self.records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{Embedding, FaceTemplate};

    fn template(seed: f32) -> FaceTemplate {
        FaceTemplate::Embedding(Embedding::normalized(vec![seed, 1.0], "test"))
    }

    #[test]
    fn test_insert_keeps_enrolment_order() {
        let mut store = FaceStore::new();
        store.insert("carol".into(), template(1.0), "t1".into());
        store.insert("alice".into(), template(2.0), "t2".into());
        store.insert("bob".into(), template(3.0), "t3".into());

        let names: Vec<&str> = store.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["carol", "alice", "bob"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_overwrite_replaces_in_place() {
        let mut store = FaceStore::new();
        assert!(!store.insert("alice".into(), template(1.0), "t1".into()));
        assert!(!store.insert("bob".into(), template(2.0), "t2".into()));
        assert!(store.insert("alice".into(), template(9.0), "t3".into()));

        assert_eq!(store.len(), 2);
        let names: Vec<&str> = store.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["alice", "bob"]);

        let alice = store.iter().next().unwrap();
        assert_eq!(alice.enrolled_at, "t3");
        match &alice.template {
            FaceTemplate::Embedding(e) => assert!(e.values[0] > 0.9),
            other => panic!("unexpected template kind {}", other.kind()),
        }
    }

    #[test]
    fn test_auto_names_are_sequential() {
        let mut store = FaceStore::new();
        assert_eq!(store.next_auto_name(), "user_1");
        assert_eq!(store.next_auto_name(), "user_2");
        assert_eq!(store.next_auto_name(), "user_3");
    }

    #[test]
    fn test_auto_name_skips_taken_names() {
        let mut store = FaceStore::new();
        store.insert("user_1".into(), template(1.0), "t1".into());
        assert_eq!(store.next_auto_name(), "user_2");
    }

    #[test]
    fn test_auto_name_does_not_rewind_after_overwrite() {
        let mut store = FaceStore::new();
        let first = store.next_auto_name();
        store.insert(first.clone(), template(1.0), "t1".into());
        store.insert(first, template(2.0), "t2".into());
        // Still one record, but the counter has moved on.
        assert_eq!(store.len(), 1);
        assert_eq!(store.next_auto_name(), "user_2");
    }

    #[test]
    fn test_log_appends_in_order() {
        let mut log = AttendanceLog::new();
        log.append("alice".into(), "t1".into());
        log.append("bob".into(), "t2".into());
        log.append("alice".into(), "t3".into());

        let records = log.snapshot();
        assert_eq!(log.len(), 3);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["alice", "bob", "alice"]);
        assert_eq!(records[2].time, "t3");
    }
}
