use async_trait::async_trait;

use crate::{Error, Feed, Item, ItemId};

/// Point-lookup access to the remote item tree
///
/// Both calls are single-shot: nothing is subscribed to, and a changed remote
/// value is only seen by fetching again.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// `Ok(None)` means the store has no record for this id
    async fn fetch(&self, id: ItemId) -> Result<Option<Item>, Error>;

    async fn fetch_root_list(&self, feed: Feed) -> Result<Vec<ItemId>, Error>;
}
