use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRecord {
    pub identifier: String,
    pub file: PathBuf,
    pub port: u16,
    pub attempt: u32,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
}

/// Live encoder processes across all stream workers.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    records: Arc<Mutex<BTreeMap<u64, ProcessRecord>>>,
    next_ticket: Arc<AtomicU64>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a process; it stays listed until the returned guard is dropped.
    pub fn register(&self, record: ProcessRecord) -> ProcessRegistration {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.guard().insert(ticket, record);
        ProcessRegistration {
            registry: self.clone(),
            ticket,
        }
    }

    pub fn active(&self) -> Vec<ProcessRecord> {
        self.guard().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn guard(&self) -> MutexGuard<'_, BTreeMap<u64, ProcessRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct ProcessRegistration {
    registry: ProcessRegistry,
    ticket: u64,
}

impl ProcessRegistration {
    pub fn attach_pid(&self, pid: Option<u32>) {
        if let Some(record) = self.registry.guard().get_mut(&self.ticket) {
            record.pid = pid;
        }
    }
}

impl Drop for ProcessRegistration {
    fn drop(&mut self) {
        self.registry.guard().remove(&self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(identifier: &str) -> ProcessRecord {
        ProcessRecord {
            identifier: identifier.into(),
            file: PathBuf::from("/a.aac"),
            port: 8083,
            attempt: 1,
            pid: None,
            started_at: Utc::now(),
        }
    }

    #[test]
    fn registration_lives_until_dropped() {
        let registry = ProcessRegistry::new();
        let first = registry.register(record("a"));
        let second = registry.register(record("b"));
        first.attach_pid(Some(42));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.active()[0].pid, Some(42));
        drop(first);
        assert_eq!(registry.active()[0].identifier, "b");
        drop(second);
        assert!(registry.is_empty());
    }
}
