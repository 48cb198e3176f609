use std::sync::Arc;

use tokio::time::Instant;

use crate::{
    api::{Error, Feed, Item, ItemId, NodeStore, Story},
    count_replies,
    dispatch::Dispatcher,
    ClientConfig, Generation,
};

enum FeedFetch {
    RootList(Result<Vec<ItemId>, Error>),
    Story {
        id: ItemId,
        result: Result<Option<Item>, Error>,
    },
    Count {
        id: ItemId,
        count: u64,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FeedUpdate {
    /// The ranked list of root ids arrived, and the first page was requested
    RootListLoaded { len: usize },
    RootListFailed(Error),
    Appended { id: ItemId, index: usize },
    Skipped { id: ItemId },
    Counted { id: ItemId, count: u64 },
}

/// Paged list of the stories of one feed
pub struct FeedSession<S: ?Sized> {
    store: Arc<S>,
    config: ClientConfig,
    feed: Feed,
    stories: Vec<Story>,
    root_ids: Option<Vec<ItemId>>,
    root_list_pending: bool,
    requested: usize,
    dispatcher: Dispatcher<FeedFetch>,
    last_action: Option<Instant>,
}

impl<S: ?Sized + NodeStore + 'static> FeedSession<S> {
    pub fn new(store: Arc<S>, config: ClientConfig, feed: Feed) -> FeedSession<S> {
        FeedSession {
            store,
            config,
            feed,
            stories: Vec::new(),
            root_ids: None,
            root_list_pending: false,
            requested: 0,
            dispatcher: Dispatcher::new(),
            last_action: None,
        }
    }

    pub fn feed(&self) -> Feed {
        self.feed
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn generation(&self) -> Generation {
        self.dispatcher.generation()
    }

    pub fn is_loading(&self) -> bool {
        self.dispatcher.in_flight() > 0
    }

    /// Whether some root ids were not requested yet
    pub fn has_more(&self) -> bool {
        match &self.root_ids {
            None => true,
            Some(ids) => self.requested < ids.len(),
        }
    }

    fn throttle(&mut self) -> Result<(), Error> {
        let now = Instant::now();
        if let Some(last) = self.last_action {
            if now.duration_since(last) < self.config.feed_cooldown {
                tracing::debug!(feed = %self.feed, "throttling feed action");
                return Err(Error::Throttled);
            }
        }
        self.last_action = Some(now);
        Ok(())
    }

    /// Request the next page of stories
    ///
    /// The first call fetches the feed's root list, and requests the first
    /// page as soon as it arrives. Returns `Ok(false)` if there was nothing
    /// left to request.
    pub fn load_more(&mut self) -> Result<bool, Error> {
        if self.root_list_pending || !self.has_more() {
            return Ok(false);
        }
        self.throttle()?;
        if self.root_ids.is_none() {
            tracing::info!(feed = %self.feed, "fetching root list");
            self.root_list_pending = true;
            let store = self.store.clone();
            let feed = self.feed;
            self.dispatcher
                .spawn(async move { FeedFetch::RootList(store.fetch_root_list(feed).await) });
            return Ok(true);
        }
        Ok(self.request_page())
    }

    /// Drop every story and the root list, abandoning in-flight fetches
    ///
    /// Returns `Ok(false)` if there was nothing to drop.
    pub fn reset(&mut self) -> Result<bool, Error> {
        if self.root_ids.is_none() && self.stories.is_empty() && !self.is_loading() {
            return Ok(false);
        }
        self.throttle()?;
        let generation = self.dispatcher.restart();
        self.stories.clear();
        self.root_ids = None;
        self.root_list_pending = false;
        self.requested = 0;
        tracing::info!(feed = %self.feed, %generation, "reset feed");
        Ok(true)
    }

    fn request_page(&mut self) -> bool {
        let ids = match &self.root_ids {
            Some(ids) => ids,
            None => return false,
        };
        let end = (self.requested + self.config.page_size).min(ids.len());
        let page = ids[self.requested..end].to_vec();
        self.requested = end;
        if page.is_empty() {
            return false;
        }
        tracing::debug!(feed = %self.feed, count = page.len(), "requesting page");
        for id in page {
            let store = self.store.clone();
            self.dispatcher.spawn(async move {
                FeedFetch::Story {
                    id,
                    result: store.fetch(id).await,
                }
            });
        }
        true
    }

    pub async fn next(&mut self) -> Option<FeedUpdate> {
        let fetched = self.dispatcher.recv().await?;
        Some(self.apply(fetched))
    }

    pub async fn settle(&mut self) {
        while self.next().await.is_some() {}
    }

    fn apply(&mut self, fetched: FeedFetch) -> FeedUpdate {
        match fetched {
            FeedFetch::RootList(Ok(mut ids)) => {
                self.root_list_pending = false;
                ids.truncate(self.config.root_list_limit);
                let len = ids.len();
                tracing::info!(feed = %self.feed, len, "root list loaded");
                self.root_ids = Some(ids);
                self.request_page();
                FeedUpdate::RootListLoaded { len }
            }
            FeedFetch::RootList(Err(err)) => {
                self.root_list_pending = false;
                tracing::error!(feed = %self.feed, %err, "failed fetching root list");
                FeedUpdate::RootListFailed(err)
            }
            FeedFetch::Story { id, result } => self.apply_story(id, result),
            FeedFetch::Count { id, count } => {
                if let Some(story) = self.stories.iter_mut().find(|s| s.id == id) {
                    story.raise_comment_count(count);
                }
                FeedUpdate::Counted { id, count }
            }
        }
    }

    fn apply_story(&mut self, id: ItemId, result: Result<Option<Item>, Error>) -> FeedUpdate {
        let item = match result {
            Ok(Some(item)) if !item.deleted && !item.dead => item,
            Ok(_) => return FeedUpdate::Skipped { id },
            Err(err) => {
                tracing::warn!(?id, %err, "failed fetching story");
                return FeedUpdate::Skipped { id };
            }
        };
        let story = match Story::from_item(&item) {
            Ok(story) => story,
            Err(err) => {
                tracing::warn!(?id, %err, "skipping malformed story");
                return FeedUpdate::Skipped { id };
            }
        };
        if item.descendants.is_none() && !item.kids.is_empty() {
            let store = self.store.clone();
            let kids = item.kids;
            self.dispatcher.spawn(async move {
                FeedFetch::Count {
                    id,
                    count: count_replies(&*store, &kids).await,
                }
            });
        }
        self.stories.push(story);
        FeedUpdate::Appended {
            id,
            index: self.stories.len() - 1,
        }
    }
}
