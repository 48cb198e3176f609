use std::collections::HashMap;

use cheddar_api::{Feed, Item, ItemId};
use cheddar_mock_server::Fixture;
use chrono::{Duration, Utc};
use rand::{seq::SliceRandom, Rng};

const NUM_USERS: usize = 12;
const NUM_STORIES: u64 = 40;
const STORIES_PER_FEED: usize = 30;
const STORY_TITLE_LEN: usize = 8;

const MAX_TOP_LEVEL_REPLIES: usize = 8;
const MAX_REPLIES: usize = 4;
const MAX_DEPTH: usize = 5;
const COMMENT_WORD_COUNT: usize = 30;

// Stories use ids 1..=NUM_STORIES, replies come after
const FIRST_REPLY_ID: u64 = 1000;

struct Generator<R> {
    rng: R,
    users: Vec<String>,
    next_id: u64,
    items: Vec<Item>,
}

impl<R: Rng> Generator<R> {
    fn user(&mut self) -> String {
        self.users[self.rng.gen_range(0..self.users.len())].clone()
    }

    fn time(&mut self) -> chrono::DateTime<Utc> {
        Utc::now() - Duration::seconds(self.rng.gen_range(0..7 * 86400))
    }

    /// Returns the ids of the generated replies and the size of their subtrees
    fn replies(&mut self, depth: usize) -> (Vec<ItemId>, u64) {
        let max = match depth {
            0 => MAX_TOP_LEVEL_REPLIES,
            d if d >= MAX_DEPTH => 0,
            _ => MAX_REPLIES,
        };
        let count = self.rng.gen_range(0..=max);
        let mut kids = Vec::with_capacity(count);
        let mut total = 0;
        for _ in 0..count {
            let id = ItemId(self.next_id);
            self.next_id += 1;
            let (grandkids, below) = self.replies(depth + 1);
            // a few replies were deleted since
            let deleted = self.rng.gen_ratio(1, 20);
            let item = Item {
                id,
                kind: Some(String::from("comment")),
                by: (!deleted).then(|| self.user()),
                text: (!deleted).then(|| lipsum::lipsum_words(COMMENT_WORD_COUNT)),
                time: Some(self.time()),
                kids: grandkids,
                deleted,
                ..Item::default()
            };
            self.items.push(item);
            kids.push(id);
            total += 1 + below;
        }
        (kids, total)
    }

    fn story(&mut self, id: u64) {
        let (kids, descendants) = self.replies(0);
        let url = match self.rng.gen_bool(0.7) {
            true => Some(format!(
                "https://www.{}.com/{}",
                lipsum::lipsum_words(1).to_lowercase().trim_matches('.'),
                id
            )),
            false => None,
        };
        let item = Item {
            id: ItemId(id),
            kind: Some(String::from("story")),
            by: Some(self.user()),
            time: Some(self.time()),
            score: Some(self.rng.gen_range(1..500)),
            title: Some(lipsum::lipsum_words(STORY_TITLE_LEN)),
            url,
            // some stories do not carry their reply count
            descendants: self.rng.gen_bool(0.8).then_some(descendants),
            kids,
            ..Item::default()
        };
        self.items.push(item);
    }
}

fn main() {
    let mut gen = Generator {
        rng: rand::thread_rng(),
        users: (0..NUM_USERS)
            .map(|_| lipsum::lipsum_words(1).to_lowercase().replace('.', ""))
            .collect(),
        next_id: FIRST_REPLY_ID,
        items: Vec::new(),
    };
    for id in 1..=NUM_STORIES {
        gen.story(id);
    }

    let story_ids = (1..=NUM_STORIES).map(ItemId).collect::<Vec<_>>();
    let mut feeds = HashMap::new();
    for feed in Feed::ALL {
        let mut ids = story_ids
            .choose_multiple(&mut gen.rng, STORIES_PER_FEED)
            .copied()
            .collect::<Vec<_>>();
        ids.shuffle(&mut gen.rng);
        feeds.insert(feed, ids);
    }

    let fixture = Fixture {
        items: gen.items,
        feeds,
    };
    match serde_json::to_string_pretty(&fixture) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed serializing fixture: {e}"),
    }
}
