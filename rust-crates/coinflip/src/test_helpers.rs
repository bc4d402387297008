use crate::{
    record::{
        FlipRecord,
        NewFlipRecord,
    },
    session::{
        AuthedUser,
        Session,
        SessionContext,
    },
    store::{
        FlipStore,
        InMemoryFlipStore,
    },
};
use anyhow::anyhow;
use std::sync::{
    Arc,
    atomic::{
        AtomicBool,
        AtomicUsize,
        Ordering,
    },
};

pub fn test_user(id: &str) -> AuthedUser {
    AuthedUser::new(id, format!("token-{id}"))
}

pub fn signed_in_context(id: &str) -> SessionContext {
    SessionContext::new(Session::SignedIn(test_user(id)))
}

/// In-memory store whose operations can be switched to fail, counting every
/// call that reaches it.
#[derive(Clone, Default)]
pub struct FlakyFlipStore {
    inner: InMemoryFlipStore,
    fail_insert: Arc<AtomicBool>,
    fail_list: Arc<AtomicBool>,
    fail_delete: Arc<AtomicBool>,
    inserts: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
}

impl FlakyFlipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<FlipRecord> {
        self.inner.all_records()
    }
}

impl FlipStore for FlakyFlipStore {
    async fn insert(
        &self,
        user: &AuthedUser,
        record: NewFlipRecord,
    ) -> anyhow::Result<FlipRecord> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(anyhow!("network unreachable"));
        }
        self.inner.insert(user, record).await
    }

    async fn list(&self, user: &AuthedUser) -> anyhow::Result<Vec<FlipRecord>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(anyhow!("network unreachable"));
        }
        self.inner.list(user).await
    }

    async fn delete_for_user(&self, user: &AuthedUser) -> anyhow::Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(anyhow!("network unreachable"));
        }
        self.inner.delete_for_user(user).await
    }
}
