use url::Url;

use crate::{Error, Item, ItemId, Time};

const SELF_POST_BASE: &str = "https://news.ycombinator.com/item?id=";
const SELF_POST_BADGE: &str = "HN";

/// Display record for the root of a thread
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Story {
    pub id: ItemId,
    pub title: String,
    pub by: Option<String>,
    pub time: Option<Time>,
    pub score: i64,

    /// Never decreases during a session, see `raise_comment_count`
    pub comment_count: u64,

    pub long_url: String,
    pub short_url: String,

    /// Letter(s) shown in place of a thumbnail
    pub badge: String,

    pub is_self_post: bool,
    pub kids: Vec<ItemId>,
}

impl Story {
    /// Placeholder for a thread whose root record was not fetched yet
    pub fn stub(id: ItemId) -> Story {
        Story {
            id,
            title: String::new(),
            by: None,
            time: None,
            score: 0,
            comment_count: 0,
            long_url: format!("{SELF_POST_BASE}{id}"),
            short_url: String::from("news.ycombinator.com"),
            badge: String::from(SELF_POST_BADGE),
            is_self_post: true,
            kids: Vec::new(),
        }
    }

    pub fn from_item(item: &Item) -> Result<Story, Error> {
        let (long_url, short_url, badge, is_self_post) = match item.url.as_deref() {
            None | Some("") => (
                format!("{SELF_POST_BASE}{}", item.id),
                String::from("news.ycombinator.com"),
                String::from(SELF_POST_BADGE),
                true,
            ),
            Some(url) => {
                let parsed = Url::parse(url).map_err(|e| {
                    Error::InvalidResponse(format!("story {} has a malformed url: {e}", item.id))
                })?;
                let host = parsed.host_str().ok_or_else(|| {
                    Error::InvalidResponse(format!("story {} url has no host", item.id))
                })?;
                let domain = host.strip_prefix("www.").unwrap_or(host).to_string();
                let badge = domain
                    .chars()
                    .next()
                    .map(|c| c.to_uppercase().collect())
                    .unwrap_or_else(|| String::from(SELF_POST_BADGE));
                (parsed.to_string(), domain, badge, false)
            }
        };
        Ok(Story {
            id: item.id,
            title: item.title.clone().unwrap_or_default(),
            by: item.by.clone(),
            time: item.time,
            score: item.score.unwrap_or(0),
            comment_count: item.descendants.unwrap_or(0),
            long_url,
            short_url,
            badge,
            is_self_post,
            kids: item.kids.clone(),
        })
    }

    /// Refresh the live fields from a newer fetch of the same record
    pub fn refresh(&mut self, item: &Item) {
        if let Some(score) = item.score {
            self.score = score;
        }
        if item.time.is_some() {
            self.time = item.time;
        }
        if let Some(title) = &item.title {
            self.title = title.clone();
        }
        self.kids = item.kids.clone();
        if let Some(descendants) = item.descendants {
            self.raise_comment_count(descendants);
        }
    }

    /// Returns true iff the displayed count changed
    pub fn raise_comment_count(&mut self, count: u64) -> bool {
        if count > self.comment_count {
            self.comment_count = count;
            true
        } else {
            false
        }
    }
}
