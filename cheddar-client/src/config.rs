use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base url of the remote store, without trailing slash
    pub base_url: String,

    /// Minimum delay between two loads of the same thread
    pub thread_cooldown: Duration,

    /// Minimum delay between two page loads or resets of a feed
    pub feed_cooldown: Duration,

    /// Number of stories fetched per feed page
    pub page_size: usize,

    /// Maximum number of root ids kept from a feed's ranked list
    pub root_list_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            base_url: String::from(DEFAULT_BASE_URL),
            thread_cooldown: Duration::from_secs(2),
            feed_cooldown: Duration::from_secs(3),
            page_size: 15,
            root_list_limit: 500,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> ClientConfig {
        let base_url = base_url.into();
        ClientConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..ClientConfig::default()
        }
    }
}
