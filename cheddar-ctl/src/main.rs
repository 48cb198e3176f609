use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use cheddar_client::{
    api::{Feed, ItemId, NodeStore, Story},
    ClientConfig, FeedSession, HttpStore, ThreadSession, ThreadSnapshot, ThreadStatus,
};
use cheddar_mock_server::{Fixture, MockStore};

mod render;

#[derive(structopt::StructOpt)]
struct Opt {
    /// Base url of the remote store, defaults to the public one
    #[structopt(long)]
    host: Option<String>,

    /// Serve items from a JSON fixture instead of the remote store
    #[structopt(long, parse(from_os_str))]
    fixture: Option<PathBuf>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Fetch a whole thread and print its visible comments
    Thread {
        /// Id of the story
        id: u64,

        /// Collapse the comment with this id once everything is fetched
        #[structopt(long)]
        collapse: Vec<u64>,

        /// Save the resulting thread to this file
        #[structopt(long, parse(from_os_str))]
        save: Option<PathBuf>,

        /// Start from a thread saved with --save instead of fetching it
        #[structopt(long, parse(from_os_str))]
        restore: Option<PathBuf>,
    },

    /// List the stories of a feed
    Feed {
        /// One of top, new, best, ask, show, job
        feed: Feed,

        /// Number of pages to load
        #[structopt(long, default_value = "1")]
        pages: usize,
    },
}

fn load_json<T>(path: &Path) -> anyhow::Result<T>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let file = std::fs::File::open(path).with_context(|| format!("opening {path:?}"))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parsing {path:?}"))
}

fn save_snapshot(path: &Path, snapshot: &ThreadSnapshot) -> anyhow::Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("creating {path:?}"))?;
    serde_json::to_writer(std::io::BufWriter::new(file), snapshot)
        .with_context(|| format!("writing snapshot to {path:?}"))
}

async fn show_thread(
    store: Arc<dyn NodeStore>,
    config: ClientConfig,
    id: u64,
    collapse: Vec<u64>,
    save: Option<PathBuf>,
    restore: Option<PathBuf>,
) -> anyhow::Result<Vec<String>> {
    let mut session = match restore {
        Some(path) => {
            let snapshot: ThreadSnapshot = load_json(&path)?;
            anyhow::ensure!(
                snapshot.story.id == ItemId(id),
                "{path:?} holds thread {}, not {id}",
                snapshot.story.id
            );
            tracing::info!(?path, comments = snapshot.comments.len(), "restoring thread");
            let mut session = ThreadSession::restore(store, config, snapshot);
            session.ensure_loaded()?;
            session
        }
        None => {
            let mut session = ThreadSession::new(store, config, Story::stub(ItemId(id)));
            session.load(ItemId(id))?;
            session
        }
    };
    session.settle().await;
    if let ThreadStatus::Failed(err) = session.view().status() {
        anyhow::bail!("loading thread {id}: {err}");
    }

    for c in collapse {
        let row = session
            .view()
            .row_of(ItemId(c))
            .with_context(|| format!("comment {c} is not part of thread {id}"))?;
        session.collapse(row);
    }
    if let Some(path) = save {
        save_snapshot(&path, &session.snapshot())?;
        tracing::info!(?path, comments = session.view().len(), "saved thread");
    }
    Ok(render::thread(session.view(), chrono::Utc::now()))
}

async fn show_feed(
    store: Arc<dyn NodeStore>,
    config: ClientConfig,
    feed: Feed,
    pages: usize,
) -> anyhow::Result<Vec<String>> {
    let cooldown = config.feed_cooldown;
    let mut session = FeedSession::new(store, config, feed);
    for _ in 0..pages {
        loop {
            match session.load_more() {
                Ok(_) => break,
                Err(e) if e.is_throttle() => {
                    tracing::debug!(%feed, "waiting for the feed cooldown");
                    tokio::time::sleep(cooldown).await
                }
                Err(e) => return Err(e).context("loading feed page"),
            }
        }
        session.settle().await;
        if !session.has_more() {
            break;
        }
    }
    let now = chrono::Utc::now();
    Ok(session
        .stories()
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{:>3}. {}", i + 1, render::story_line(s, now)))
        .collect())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();

    let config = opt
        .host
        .map(ClientConfig::with_base_url)
        .unwrap_or_default();
    let store: Arc<dyn NodeStore> = match opt.fixture {
        Some(path) => {
            let fixture: Fixture = load_json(&path)?;
            Arc::new(MockStore::from_fixture(fixture))
        }
        None => Arc::new(HttpStore::new(&config)),
    };

    let lines = match opt.cmd {
        Command::Thread {
            id,
            collapse,
            save,
            restore,
        } => show_thread(store, config, id, collapse, save, restore).await?,
        Command::Feed { feed, pages } => show_feed(store, config, feed, pages).await?,
    };
    for l in lines {
        println!("{l}");
    }

    Ok(())
}
