use std::{collections::HashMap, sync::Arc};

use cheddar_api::{Error, Feed, Item, ItemId, NodeStore};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// Serializable content of a `MockStore`
#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct Fixture {
    pub items: Vec<Item>,
    #[serde(default)]
    pub feeds: HashMap<Feed, Vec<ItemId>>,
}

#[derive(Debug, Default)]
struct State {
    items: HashMap<ItemId, Item>,
    feeds: HashMap<Feed, Vec<ItemId>>,
    failing: Vec<ItemId>,
    failing_feeds: Vec<Feed>,
    gates: HashMap<ItemId, Arc<Semaphore>>,
    log: Vec<ItemId>,
}

/// In-memory `NodeStore`
///
/// Fetches of gated ids block until the test releases them, which lets tests
/// pick the order in which concurrent fetches complete.
#[derive(Debug, Default)]
pub struct MockStore(Mutex<State>);

impl MockStore {
    pub fn new() -> MockStore {
        MockStore::default()
    }

    pub fn from_fixture(fixture: Fixture) -> MockStore {
        let store = MockStore::new();
        for item in fixture.items {
            store.insert(item);
        }
        for (feed, ids) in fixture.feeds {
            store.set_root_list(feed, ids);
        }
        store
    }

    pub fn fixture(&self) -> Fixture {
        let state = self.0.lock();
        let mut items = state.items.values().cloned().collect::<Vec<_>>();
        items.sort_by_key(|i| i.id);
        Fixture {
            items,
            feeds: state.feeds.clone(),
        }
    }

    /// Insert or replace an item
    pub fn insert(&self, item: Item) {
        self.0.lock().items.insert(item.id, item);
    }

    pub fn insert_story(&self, id: u64, title: &str, kids: &[u64]) {
        self.insert(Item {
            id: ItemId(id),
            kind: Some(String::from("story")),
            by: Some(String::from("tester")),
            title: Some(String::from(title)),
            score: Some(1),
            descendants: Some(kids.len() as u64),
            kids: kids.iter().copied().map(ItemId).collect(),
            ..Item::default()
        });
    }

    pub fn insert_comment(&self, id: u64, text: &str, kids: &[u64]) {
        self.insert(Item {
            id: ItemId(id),
            kind: Some(String::from("comment")),
            by: Some(String::from("tester")),
            text: Some(String::from(text)),
            kids: kids.iter().copied().map(ItemId).collect(),
            ..Item::default()
        });
    }

    pub fn insert_deleted(&self, id: u64) {
        self.insert(Item {
            id: ItemId(id),
            kind: Some(String::from("comment")),
            deleted: true,
            ..Item::default()
        });
    }

    /// Panics if `id` was not inserted
    pub fn set_descendants(&self, id: u64, descendants: u64) {
        let mut state = self.0.lock();
        let item = state
            .items
            .get_mut(&ItemId(id))
            .unwrap_or_else(|| panic!("setting descendants of unknown item {id}"));
        item.descendants = Some(descendants);
    }

    pub fn set_root_list(&self, feed: Feed, ids: Vec<ItemId>) {
        self.0.lock().feeds.insert(feed, ids);
    }

    /// Make every later fetch of `id` fail with a transport error
    pub fn fail(&self, id: ItemId) {
        self.0.lock().failing.push(id);
    }

    pub fn fail_root_list(&self, feed: Feed) {
        self.0.lock().failing_feeds.push(feed);
    }

    /// Make fetches of `id` wait until `release` is called
    pub fn gate(&self, id: ItemId) {
        self.0
            .lock()
            .gates
            .insert(id, Arc::new(Semaphore::new(0)));
    }

    /// Let the fetches of `id` through, including the later ones
    pub fn release(&self, id: ItemId) {
        let gate = self
            .0
            .lock()
            .gates
            .entry(id)
            .or_insert_with(|| Arc::new(Semaphore::new(0)))
            .clone();
        gate.add_permits(1);
    }

    /// Every id fetched so far, in the order the fetches started
    pub fn fetch_log(&self) -> Vec<ItemId> {
        self.0.lock().log.clone()
    }

    pub fn fetch_count(&self, id: ItemId) -> usize {
        self.0.lock().log.iter().filter(|i| **i == id).count()
    }
}

#[async_trait::async_trait]
impl NodeStore for MockStore {
    async fn fetch(&self, id: ItemId) -> Result<Option<Item>, Error> {
        let gate = {
            let mut state = self.0.lock();
            state.log.push(id);
            state.gates.get(&id).cloned()
        };
        if let Some(gate) = gate {
            // the permit goes back on drop, so a released gate stays open
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| Error::Unknown(format!("gate of {id} closed: {e}")))?;
        }
        let state = self.0.lock();
        if state.failing.contains(&id) {
            return Err(Error::Transport(format!("simulated failure fetching {id}")));
        }
        Ok(state.items.get(&id).cloned())
    }

    async fn fetch_root_list(&self, feed: Feed) -> Result<Vec<ItemId>, Error> {
        let state = self.0.lock();
        if state.failing_feeds.contains(&feed) {
            return Err(Error::Transport(format!("simulated failure fetching {feed}")));
        }
        Ok(state.feeds.get(&feed).cloned().unwrap_or_default())
    }
}
