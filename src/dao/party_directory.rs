use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{models::PartyEntity, storage::StorageResult};

/// Read-only boundary onto the party subsystem.
///
/// Party membership is managed elsewhere; the lifecycle engine only ever
/// needs to resolve a party by id or enumerate the parties an actor
/// owns.
pub trait PartyDirectory: Send + Sync {
    /// Point lookup by party id.
    fn find_by_id(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>>;
    /// Parties whose creator is the given actor.
    fn find_by_creator(
        &self,
        creator_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PartyEntity>>>;
}
