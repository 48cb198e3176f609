mod collapse;
pub use collapse::HEADER_ROW;

mod comment;
pub use comment::Comment;

mod config;
pub use config::ClientConfig;

mod count;
pub use count::count_replies;

mod dispatch;
pub use dispatch::Generation;

mod feed;
pub use feed::{FeedSession, FeedUpdate};

mod remote;
pub use remote::HttpStore;

mod session;
pub use session::{ThreadSession, ThreadUpdate};

mod thread;
pub use thread::{Row, ThreadSnapshot, ThreadStatus, ThreadView};

pub mod api {
    pub use cheddar_api::*;
}
