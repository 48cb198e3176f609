use std::sync::Arc;

use tokio::time::Instant;

use crate::{
    api::{Error, Item, ItemId, NodeStore, Story},
    dispatch::Dispatcher,
    ClientConfig, Comment, Generation, ThreadSnapshot, ThreadView,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FetchContext {
    Root,
    TopLevel,
    Reply { parent: ItemId },
}

struct Fetched {
    id: ItemId,
    context: FetchContext,
    result: Result<Option<Item>, Error>,
}

/// What applying one fetch result changed
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ThreadUpdate {
    RootLoaded,
    RootFailed(Error),

    /// A comment was inserted at this index of the sequence
    Inserted { id: ItemId, index: usize },

    /// The fetch produced no comment: missing, deleted, failed or duplicate
    Dropped { id: ItemId },
}

/// A thread being fetched and displayed
///
/// The session is the single owner of the thread's flattened view. Fetches
/// run as independent tasks that only report back; their results are applied
/// one at a time by `next`, which also fans out the fetches for the replies
/// of every inserted comment.
pub struct ThreadSession<S: ?Sized> {
    store: Arc<S>,
    config: ClientConfig,
    view: ThreadView,
    dispatcher: Dispatcher<Fetched>,
    last_load: Option<Instant>,
}

impl<S: ?Sized + NodeStore + 'static> ThreadSession<S> {
    pub fn new(store: Arc<S>, config: ClientConfig, story: Story) -> ThreadSession<S> {
        ThreadSession {
            store,
            config,
            view: ThreadView::new(story),
            dispatcher: Dispatcher::new(),
            last_load: None,
        }
    }

    pub fn restore(
        store: Arc<S>,
        config: ClientConfig,
        snapshot: ThreadSnapshot,
    ) -> ThreadSession<S> {
        ThreadSession {
            store,
            config,
            view: ThreadView::from_snapshot(snapshot),
            dispatcher: Dispatcher::new(),
            last_load: None,
        }
    }

    pub fn view(&self) -> &ThreadView {
        &self.view
    }

    pub fn snapshot(&self) -> ThreadSnapshot {
        self.view.snapshot()
    }

    pub fn generation(&self) -> Generation {
        self.dispatcher.generation()
    }

    pub fn is_loading(&self) -> bool {
        self.dispatcher.in_flight() > 0
    }

    pub fn collapse(&mut self, row: usize) -> bool {
        self.view.collapse(row)
    }

    pub fn expand(&mut self, row: usize) -> bool {
        self.view.expand(row)
    }

    /// Throw away the current thread and start fetching `root` from scratch
    ///
    /// Reloading the same thread is rejected with `Error::Throttled` if its
    /// previous load started less than the configured cooldown ago. Switching
    /// to another thread is never throttled. Must be called from within a
    /// tokio runtime.
    pub fn load(&mut self, root: ItemId) -> Result<Generation, Error> {
        let now = Instant::now();
        let same_thread = self.view.story().id == root;
        if let (true, Some(last)) = (same_thread, self.last_load) {
            if now.duration_since(last) < self.config.thread_cooldown {
                tracing::debug!(?root, "throttling thread reload");
                return Err(Error::Throttled);
            }
        }
        self.last_load = Some(now);

        let generation = self.dispatcher.restart();
        self.view.reset((!same_thread).then(|| Story::stub(root)));
        tracing::info!(?root, %generation, "loading thread");
        self.spawn_fetch(root, FetchContext::Root);
        Ok(generation)
    }

    pub fn reload(&mut self) -> Result<Generation, Error> {
        self.load(self.view.story().id)
    }

    /// Start loading unless comments are already there, eg. after `restore`
    pub fn ensure_loaded(&mut self) -> Result<(), Error> {
        if self.view.is_empty() && !self.is_loading() {
            self.reload()?;
        }
        Ok(())
    }

    /// Apply the next fetch result, or return `None` once the thread is
    /// fully fetched
    pub async fn next(&mut self) -> Option<ThreadUpdate> {
        let fetched = self.dispatcher.recv().await?;
        Some(self.apply(fetched))
    }

    /// Apply fetch results until there is nothing left in flight
    pub async fn settle(&mut self) {
        while self.next().await.is_some() {}
    }

    fn spawn_fetch(&mut self, id: ItemId, context: FetchContext) {
        let store = self.store.clone();
        self.dispatcher.spawn(async move {
            let result = store.fetch(id).await;
            Fetched {
                id,
                context,
                result,
            }
        });
    }

    fn apply(&mut self, Fetched { id, context, result }: Fetched) -> ThreadUpdate {
        let parent = match context {
            FetchContext::Root => return self.apply_root(id, result),
            FetchContext::TopLevel => None,
            FetchContext::Reply { parent } => Some(parent),
        };
        let item = match result {
            Ok(Some(item)) => item,
            Ok(None) => {
                tracing::debug!(?id, "comment not found");
                return ThreadUpdate::Dropped { id };
            }
            Err(err) => {
                tracing::warn!(?id, ?parent, %err, "failed fetching comment");
                return ThreadUpdate::Dropped { id };
            }
        };
        let comment = match Comment::from_item(item) {
            Some(c) => c,
            None => return ThreadUpdate::Dropped { id },
        };
        let kids = comment.kids.clone();
        match self.view.handle_fetched(comment, parent) {
            Some(index) => {
                for kid in kids {
                    self.spawn_fetch(kid, FetchContext::Reply { parent: id });
                }
                ThreadUpdate::Inserted { id, index }
            }
            None => ThreadUpdate::Dropped { id },
        }
    }

    fn apply_root(&mut self, id: ItemId, result: Result<Option<Item>, Error>) -> ThreadUpdate {
        let item = match result {
            Ok(Some(item)) => item,
            Ok(None) => {
                let err = Error::InvalidResponse(format!("thread {id} does not exist"));
                tracing::error!(?id, "thread root not found");
                self.view.root_failed(err.clone());
                return ThreadUpdate::RootFailed(err);
            }
            Err(err) => {
                tracing::error!(?id, %err, "failed fetching thread root");
                self.view.root_failed(err.clone());
                return ThreadUpdate::RootFailed(err);
            }
        };
        self.view.root_loaded(&item);
        tracing::info!(?id, replies = item.kids.len(), "thread root loaded");
        for kid in item.kids {
            self.spawn_fetch(kid, FetchContext::TopLevel);
        }
        ThreadUpdate::RootLoaded
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cheddar_mock_server::MockStore;

    use super::*;
    use crate::{thread::tests::ids, ThreadStatus};

    fn init_logs() {
        if std::env::var("RUST_LOG").is_ok() {
            let _ = tracing_subscriber::fmt::try_init();
        }
    }

    fn session(store: &Arc<MockStore>, root: u64) -> ThreadSession<MockStore> {
        init_logs();
        ThreadSession::new(
            store.clone(),
            ClientConfig::default(),
            Story::stub(ItemId(root)),
        )
    }

    /// Root 1 with replies [10, 20], 10 having reply 100
    fn scenario_store() -> Arc<MockStore> {
        let store = MockStore::new();
        store.insert_story(1, "Scenario", &[10, 20]);
        store.insert_comment(10, "ten", &[100]);
        store.insert_comment(20, "twenty", &[]);
        store.insert_comment(100, "hundred", &[]);
        Arc::new(store)
    }

    #[tokio::test]
    async fn completion_order_scenario() {
        let store = scenario_store();
        for id in [10, 20, 100] {
            store.gate(ItemId(id));
        }
        let mut s = session(&store, 1);
        s.load(ItemId(1)).expect("first load");
        assert_eq!(s.next().await, Some(ThreadUpdate::RootLoaded));
        assert_eq!(s.view().status(), &ThreadStatus::Ready);

        store.release(ItemId(20));
        assert_eq!(
            s.next().await,
            Some(ThreadUpdate::Inserted {
                id: ItemId(20),
                index: 0
            })
        );
        store.release(ItemId(10));
        assert_eq!(
            s.next().await,
            Some(ThreadUpdate::Inserted {
                id: ItemId(10),
                index: 1
            })
        );
        // nothing to hide yet
        assert!(!s.collapse(2));
        store.release(ItemId(100));
        assert_eq!(
            s.next().await,
            Some(ThreadUpdate::Inserted {
                id: ItemId(100),
                index: 2
            })
        );
        assert_eq!(s.next().await, None);

        assert_eq!(ids(s.view()), vec![(20, 0), (10, 0), (100, 1)]);
        // 10 had no reply yet when collapsed
        assert!(!s.view().comments()[2].is_hidden);
        assert!(s.collapse(2));
        assert!(s.view().comments()[2].is_hidden);
        assert_eq!(s.view().comments()[1].hidden_children_count, 1);
        assert!(s.expand(2));
        assert!(!s.view().comments()[2].is_hidden);
    }

    #[tokio::test]
    async fn reply_under_collapsed_parent_is_hidden_on_arrival() {
        let store = scenario_store();
        store.insert_comment(100, "hundred", &[1000]);
        store.insert_comment(1000, "thousand", &[]);
        store.gate(ItemId(1000));
        let mut s = session(&store, 1);
        s.load(ItemId(1)).expect("first load");
        while s.view().len() < 3 {
            s.next().await.expect("fetches still in flight");
        }
        let row = s.view().row_of(ItemId(10)).expect("10 is loaded");
        assert!(s.collapse(row));
        store.release(ItemId(1000));
        s.settle().await;
        let pos = s.view().position_of(ItemId(1000)).expect("1000 is loaded");
        assert!(s.view().comments()[pos].is_hidden);
    }

    #[tokio::test]
    async fn siblings_in_reverse_completion_order() {
        let store = MockStore::new();
        store.insert_story(1, "Siblings", &[5]);
        store.insert_comment(5, "parent", &[1, 2, 3]);
        for id in [1, 2, 3] {
            store.insert_comment(id, "child", &[]);
            store.gate(ItemId(id));
        }
        let store = Arc::new(store);
        let mut s = session(&store, 1);
        s.load(ItemId(1)).expect("first load");
        s.next().await; // root
        s.next().await; // 5
        for id in [2, 3, 1] {
            store.release(ItemId(id));
            s.next().await;
        }
        assert_eq!(ids(s.view()), vec![(5, 0), (1, 1), (3, 1), (2, 1)]);
    }

    #[tokio::test]
    async fn missing_and_failing_branches_are_dropped() {
        let store = MockStore::new();
        store.insert_story(1, "Partial", &[10, 30, 40, 50]);
        store.insert_comment(10, "ten", &[11]);
        store.insert_comment(11, "eleven", &[]);
        store.insert_deleted(40);
        store.insert_comment(50, "fifty", &[51]);
        store.fail(ItemId(50));
        let store = Arc::new(store);
        let mut s = session(&store, 1);
        s.load(ItemId(1)).expect("first load");
        s.settle().await;
        assert_eq!(ids(s.view()), vec![(10, 0), (11, 1)]);
        assert_eq!(s.view().status(), &ThreadStatus::Ready);
        // 51 is never asked for since its parent failed
        assert!(!store.fetch_log().contains(&ItemId(51)));
    }

    #[tokio::test]
    async fn root_failure_surfaces_in_status() {
        let store = scenario_store();
        store.fail(ItemId(1));
        let mut s = session(&store, 1);
        s.load(ItemId(1)).expect("first load");
        assert!(matches!(
            s.next().await,
            Some(ThreadUpdate::RootFailed(Error::Transport(_)))
        ));
        assert_eq!(s.next().await, None);
        assert!(matches!(s.view().status(), ThreadStatus::Failed(_)));
        assert!(s.view().is_empty());
    }

    #[tokio::test]
    async fn root_without_replies() {
        let store = MockStore::new();
        store.insert_story(1, "Lonely", &[]);
        let mut s = session(&Arc::new(store), 1);
        s.load(ItemId(1)).expect("first load");
        s.settle().await;
        assert_eq!(s.view().status(), &ThreadStatus::NoComments);
        assert_eq!(s.view().story().title, "Lonely");
    }

    #[tokio::test(start_paused = true)]
    async fn reloads_are_throttled() {
        let store = scenario_store();
        let mut s = session(&store, 1);
        s.load(ItemId(1)).expect("first load");
        assert_eq!(s.reload(), Err(Error::Throttled));
        s.settle().await;
        assert_eq!(store.fetch_count(ItemId(1)), 1);
        assert_eq!(s.view().len(), 3);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(s.reload(), Err(Error::Throttled));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(s.reload(), Ok(Generation(2)));
        s.settle().await;
        assert_eq!(store.fetch_count(ItemId(1)), 2);
        assert_eq!(s.view().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_threads_is_not_throttled() {
        let store = scenario_store();
        store.insert_story(2, "Other", &[20]);
        let mut s = session(&store, 1);
        s.load(ItemId(1)).expect("first load");
        s.settle().await;
        assert_eq!(s.load(ItemId(2)), Ok(Generation(2)));
        s.settle().await;
        assert_eq!(s.view().story().title, "Other");
        assert_eq!(ids(s.view()), vec![(20, 0)]);
        assert_eq!(s.reload(), Err(Error::Throttled));
    }

    /// Store that panics when asked for one given id
    struct PanickingStore {
        inner: MockStore,
        poisoned: ItemId,
    }

    #[async_trait::async_trait]
    impl NodeStore for PanickingStore {
        async fn fetch(&self, id: ItemId) -> Result<Option<Item>, Error> {
            if id == self.poisoned {
                panic!("simulated store panic on {id}");
            }
            self.inner.fetch(id).await
        }

        async fn fetch_root_list(&self, feed: crate::api::Feed) -> Result<Vec<ItemId>, Error> {
            self.inner.fetch_root_list(feed).await
        }
    }

    #[tokio::test]
    async fn dead_fetch_task_only_drops_its_branch() {
        let inner = MockStore::new();
        inner.insert_story(1, "Panicky", &[10, 30]);
        inner.insert_comment(10, "ten", &[]);
        inner.insert_comment(30, "thirty", &[]);
        let store = Arc::new(PanickingStore {
            inner,
            poisoned: ItemId(30),
        });
        let mut s = ThreadSession::new(store, ClientConfig::default(), Story::stub(ItemId(1)));
        s.load(ItemId(1)).expect("first load");
        tokio::time::timeout(Duration::from_secs(2), s.settle())
            .await
            .expect("session settles despite the dead task");
        assert!(!s.is_loading());
        assert_eq!(ids(s.view()), vec![(10, 0)]);
        assert_eq!(s.view().status(), &ThreadStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn reload_discards_in_flight_results() {
        let store = scenario_store();
        store.gate(ItemId(100));
        let mut s = session(&store, 1);
        s.load(ItemId(1)).expect("first load");
        while s.view().len() < 2 {
            s.next().await.expect("fetches still in flight");
        }
        tokio::time::advance(Duration::from_secs(5)).await;
        s.reload().expect("reload after cooldown");
        assert!(s.view().is_empty());

        // the old generation's reply to 10 must not show up under the new one
        store.release(ItemId(100));
        s.settle().await;
        assert_eq!(ids(s.view()).len(), 3);
        assert_eq!(s.view().discovered(), 3);
    }

    #[tokio::test]
    async fn comment_count_follows_discoveries() {
        let store = MockStore::new();
        store.insert_story(1, "Stale count", &[10]);
        store.set_descendants(1, 1);
        store.insert_comment(10, "ten", &[11, 12]);
        store.insert_comment(11, "eleven", &[]);
        store.insert_comment(12, "twelve", &[]);
        let mut s = session(&Arc::new(store), 1);
        s.load(ItemId(1)).expect("first load");
        s.settle().await;
        assert_eq!(s.view().story().comment_count, 3);
    }

    #[tokio::test]
    async fn restored_session_does_not_refetch() {
        let store = scenario_store();
        let mut s = session(&store, 1);
        s.load(ItemId(1)).expect("first load");
        s.settle().await;
        let snapshot = s.snapshot();

        let mut restored = ThreadSession::restore(store.clone(), ClientConfig::default(), snapshot);
        restored.ensure_loaded().expect("nothing to load");
        assert!(!restored.is_loading());
        assert_eq!(ids(restored.view()), ids(s.view()));
        assert_eq!(store.fetch_count(ItemId(1)), 1);

        let empty = ThreadSnapshot {
            story: s.view().story().clone(),
            comments: Vec::new(),
        };
        let mut restored = ThreadSession::restore(store.clone(), ClientConfig::default(), empty);
        restored.ensure_loaded().expect("loading empty snapshot");
        restored.settle().await;
        assert_eq!(restored.view().len(), 3);
        assert_eq!(store.fetch_count(ItemId(1)), 2);
    }
}
