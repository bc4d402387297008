use crate::{
    record::{
        FlipRecord,
        NewFlipRecord,
        sort_newest_first,
    },
    session::AuthedUser,
    store::FlipStore,
};
use anyhow::anyhow;
use chrono::{
    DateTime,
    Duration,
    Utc,
};
use std::sync::{
    Arc,
    Mutex,
};

#[derive(Default)]
struct Rows {
    records: Vec<FlipRecord>,
    next_id: u64,
    last_created_at: Option<DateTime<Utc>>,
}

/// Process-local store. Clones share the same rows.
#[derive(Clone, Default)]
pub struct InMemoryFlipStore {
    rows: Arc<Mutex<Rows>>,
}

impl InMemoryFlipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows regardless of owner, in insertion order.
    pub fn all_records(&self) -> Vec<FlipRecord> {
        self.rows
            .lock()
            .map(|rows| rows.records.clone())
            .unwrap_or_default()
    }
}

impl FlipStore for InMemoryFlipStore {
    async fn insert(
        &self,
        user: &AuthedUser,
        record: NewFlipRecord,
    ) -> anyhow::Result<FlipRecord> {
        if record.user_id != user.id {
            return Err(anyhow!("cannot insert a flip for another user"));
        }
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| anyhow!("flip store lock poisoned"))?;
        rows.next_id += 1;
        let id = rows.next_id.to_string();
        // keep created_at strictly increasing so ordering is unambiguous
        let now = Utc::now();
        let created_at = match rows.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        rows.last_created_at = Some(created_at);
        let stored = record.into_record(id, created_at);
        rows.records.push(stored.clone());
        Ok(stored)
    }

    async fn list(&self, user: &AuthedUser) -> anyhow::Result<Vec<FlipRecord>> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| anyhow!("flip store lock poisoned"))?;
        let mut visible: Vec<_> = rows
            .records
            .iter()
            .filter(|r| r.user_id == user.id)
            .cloned()
            .collect();
        sort_newest_first(&mut visible);
        Ok(visible)
    }

    async fn delete_for_user(&self, user: &AuthedUser) -> anyhow::Result<()> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| anyhow!("flip store lock poisoned"))?;
        rows.records.retain(|r| r.user_id != user.id);
        Ok(())
    }
}
