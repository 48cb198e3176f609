use crate::{
    api::{Error, Feed, Item, ItemId, NodeStore},
    ClientConfig,
};

/// `NodeStore` backed by the public firebase-style JSON endpoints
#[derive(Clone, Debug)]
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(config: &ClientConfig) -> HttpStore {
        HttpStore {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
        }
    }

    fn item_url(&self, id: ItemId) -> String {
        format!("{}/item/{}.json", self.base_url, id)
    }

    fn feed_url(&self, feed: Feed) -> String {
        format!("{}/{}.json", self.base_url, feed.key())
    }

    async fn get<R>(&self, url: String) -> Result<R, Error>
    where
        R: for<'de> serde::Deserialize<'de>,
    {
        tracing::trace!(%url, "fetching");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Transport(format!("fetching {url}: {e}")))?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("reading {url}: {e}")))?;
        serde_json::from_slice(&body)
            .map_err(|e| Error::InvalidResponse(format!("parsing {url}: {e}")))
    }
}

#[async_trait::async_trait]
impl NodeStore for HttpStore {
    async fn fetch(&self, id: ItemId) -> Result<Option<Item>, Error> {
        // the store answers `null` for ids it does not know
        self.get(self.item_url(id)).await
    }

    async fn fetch_root_list(&self, feed: Feed) -> Result<Vec<ItemId>, Error> {
        self.get(self.feed_url(feed)).await
    }
}
