use async_recursion::async_recursion;
use futures::future;

use crate::api::{ItemId, NodeStore};

/// Count every reply below `kids` by walking the whole tree
///
/// Used for stories whose record carries no reply count. Replies that cannot
/// be fetched count for themselves but not for their own subtree.
#[async_recursion]
pub async fn count_replies<S: ?Sized + NodeStore>(store: &S, kids: &[ItemId]) -> u64 {
    let below = future::join_all(kids.iter().map(|id| async move {
        match store.fetch(*id).await {
            Ok(Some(item)) => count_replies(store, &item.kids).await,
            Ok(None) => 0,
            Err(err) => {
                tracing::debug!(?id, %err, "not counting replies of unfetchable item");
                0
            }
        }
    }))
    .await;
    kids.len() as u64 + below.into_iter().sum::<u64>()
}
