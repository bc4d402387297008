use crate::{
    record::{
        FlipRecord,
        NewFlipRecord,
    },
    session::AuthedUser,
};

pub mod in_memory;
pub mod rest;
pub mod sled_store;

pub use in_memory::InMemoryFlipStore;
pub use rest::RestFlipStore;
pub use sled_store::SledFlipStore;

/// Storage for flip records. Every call acts on behalf of `user` and only
/// sees that user's rows. Records are never updated.
pub trait FlipStore {
    /// append a record and return it with its assigned id and timestamp
    fn insert(
        &self,
        user: &AuthedUser,
        record: NewFlipRecord,
    ) -> impl Future<Output = anyhow::Result<FlipRecord>>;

    /// all records visible to `user`, newest first
    fn list(
        &self,
        user: &AuthedUser,
    ) -> impl Future<Output = anyhow::Result<Vec<FlipRecord>>>;

    /// delete every record owned by `user`
    fn delete_for_user(
        &self,
        user: &AuthedUser,
    ) -> impl Future<Output = anyhow::Result<()>>;
}
