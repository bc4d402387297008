// Sled-backed flip store for local mode.
use crate::{
    record::{
        FLIP_HISTORY_TABLE,
        FlipRecord,
        NewFlipRecord,
        sort_newest_first,
    },
    session::AuthedUser,
    store::FlipStore,
};
use anyhow::{
    Context,
    anyhow,
};
use chrono::Utc;
use sled::{
    Batch,
    Config,
    Db,
    Tree,
};
use std::path::Path;

#[derive(Clone)]
pub struct SledFlipStore {
    db: Db,
    tree: Tree,
}

impl SledFlipStore {
    pub fn new(db: &Db) -> anyhow::Result<Self> {
        let tree = db
            .open_tree(FLIP_HISTORY_TABLE)
            .context("open flip_history tree")?;
        Ok(Self {
            db: db.clone(),
            tree,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let db = Config::default()
            .path(path)
            .open()
            .context("open sled database")?;
        Self::new(&db)
    }

    /// Keys are `<user_id> 0x00 <id as big endian>` so a user's rows share a
    /// prefix and scan in insertion order.
    fn user_prefix(user_id: &str) -> Vec<u8> {
        let mut prefix = user_id.as_bytes().to_vec();
        prefix.push(0);
        prefix
    }
}

impl FlipStore for SledFlipStore {
    async fn insert(
        &self,
        user: &AuthedUser,
        record: NewFlipRecord,
    ) -> anyhow::Result<FlipRecord> {
        if record.user_id != user.id {
            return Err(anyhow!("cannot insert a flip for another user"));
        }
        let id = self.db.generate_id().context("generate flip id")?;
        let stored = record.into_record(id.to_string(), Utc::now());
        let mut key = Self::user_prefix(&user.id);
        key.extend_from_slice(&id.to_be_bytes());
        let bytes = serde_json::to_vec(&stored).context("serialize flip record")?;
        self.tree
            .insert(key, bytes)
            .context("write flip record")?;
        self.tree.flush_async().await.context("flush flip record")?;
        Ok(stored)
    }

    async fn list(&self, user: &AuthedUser) -> anyhow::Result<Vec<FlipRecord>> {
        let mut records = Vec::new();
        for entry in self.tree.scan_prefix(Self::user_prefix(&user.id)) {
            let (_, value) = entry.context("read flip record")?;
            let record: FlipRecord =
                serde_json::from_slice(&value).context("decode flip record")?;
            records.push(record);
        }
        // newest id first, so equal timestamps stay newest first after the stable sort
        records.reverse();
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn delete_for_user(&self, user: &AuthedUser) -> anyhow::Result<()> {
        let mut batch = Batch::default();
        let mut removed = 0usize;
        for key in self.tree.scan_prefix(Self::user_prefix(&user.id)).keys() {
            batch.remove(key.context("read flip key")?);
            removed += 1;
        }
        self.tree
            .apply_batch(batch)
            .context("delete flip records")?;
        self.tree.flush_async().await.context("flush flip deletes")?;
        tracing::debug!(removed, "cleared local flip history");
        Ok(())
    }
}
