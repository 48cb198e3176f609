use chrono::Utc;

mod error;
pub use error::Error;

mod feed;
pub use feed::Feed;

mod item;
pub use item::{Item, ItemId};

mod store;
pub use store::NodeStore;

mod story;
pub use story::Story;

pub type Time = chrono::DateTime<Utc>;
