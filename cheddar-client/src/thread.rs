use crate::{
    api::{Error, Item, ItemId, Story},
    Comment,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ThreadStatus {
    /// The root record has not resolved yet
    Loading,

    /// The root resolved with replies, which may still be streaming in
    Ready,

    /// The root resolved without any reply
    NoComments,

    /// The root could not be fetched, nothing will be shown
    Failed(Error),
}

/// Everything needed to show a thread again without fetching it
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ThreadSnapshot {
    pub story: Story,
    pub comments: Vec<Comment>,
}

#[derive(Clone, Copy, Debug)]
pub struct Row<'a> {
    /// Row in the rendered list, the header being row 0
    pub position: usize,
    pub comment: &'a Comment,
}

/// Flattened outline of a thread
///
/// Comments are kept in depth-first order: the descendants of the comment at
/// index `i` are exactly the run of comments following it whose hierarchy is
/// strictly greater than its own. Every mutation preserves this.
#[derive(Clone, Debug)]
pub struct ThreadView {
    pub(crate) story: Story,
    pub(crate) comments: Vec<Comment>,
    pub(crate) discovered: u64,
    pub(crate) status: ThreadStatus,
}

impl ThreadView {
    pub fn new(story: Story) -> ThreadView {
        ThreadView {
            story,
            comments: Vec::new(),
            discovered: 0,
            status: ThreadStatus::Loading,
        }
    }

    pub fn from_snapshot(snapshot: ThreadSnapshot) -> ThreadView {
        let status = match snapshot.comments.is_empty() {
            true => ThreadStatus::Loading,
            false => ThreadStatus::Ready,
        };
        ThreadView {
            discovered: snapshot.comments.len() as u64,
            story: snapshot.story,
            comments: snapshot.comments,
            status,
        }
    }

    pub fn snapshot(&self) -> ThreadSnapshot {
        ThreadSnapshot {
            story: self.story.clone(),
            comments: self.comments.clone(),
        }
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn status(&self) -> &ThreadStatus {
        &self.status
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Number of comments inserted since the last reset
    pub fn discovered(&self) -> u64 {
        self.discovered
    }

    pub fn position_of(&self, id: ItemId) -> Option<usize> {
        self.comments.iter().position(|c| c.id == id)
    }

    pub fn row_of(&self, id: ItemId) -> Option<usize> {
        self.position_of(id).map(|i| i + 1)
    }

    /// One past the last descendant of the comment at `index`, which must be
    /// in range
    pub(crate) fn subtree_end(&self, index: usize) -> usize {
        let hierarchy = self.comments[index].hierarchy;
        self.comments[index + 1..]
            .iter()
            .position(|c| c.hierarchy <= hierarchy)
            .map(|offset| index + 1 + offset)
            .unwrap_or(self.comments.len())
    }

    /// Current descendants of the comment at `index`, `None` if out of range
    pub fn descendants(&self, index: usize) -> Option<&[Comment]> {
        if index >= self.comments.len() {
            return None;
        }
        Some(&self.comments[index + 1..self.subtree_end(index)])
    }

    /// Visible rows, in display order
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.comments
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_hidden)
            .map(|(i, comment)| Row {
                position: i + 1,
                comment,
            })
    }

    /// Insert a freshly fetched comment
    ///
    /// Top-level comments (`parent` is `None`) are appended. Replies are put
    /// right after their parent, so that later-resolving siblings push the
    /// earlier ones down: siblings end up in reverse completion order.
    ///
    /// Returns the index the comment was inserted at, or `None` if it was
    /// already present or its parent is unknown.
    pub fn handle_fetched(
        &mut self,
        mut comment: Comment,
        parent: Option<ItemId>,
    ) -> Option<usize> {
        if self.position_of(comment.id).is_some() {
            tracing::debug!(id = ?comment.id, "ignoring duplicate resolution");
            return None;
        }
        let index = match parent {
            None => {
                comment.hierarchy = 0;
                comment.is_hidden = false;
                self.comments.len()
            }
            Some(parent_id) => {
                let parent_pos = match self.position_of(parent_id) {
                    Some(p) => p,
                    None => {
                        tracing::warn!(
                            id = ?comment.id,
                            parent = ?parent_id,
                            "dropping reply to unknown parent"
                        );
                        return None;
                    }
                };
                let parent = &self.comments[parent_pos];
                comment.hierarchy = parent.hierarchy + 1;
                comment.is_hidden = parent.is_hidden || parent.hide_children;
                parent_pos + 1
            }
        };
        comment.hide_children = false;
        comment.hidden_children_count = 0;
        self.comments.insert(index, comment);
        self.discovered += 1;
        self.story.raise_comment_count(self.discovered);
        Some(index)
    }

    /// Drop all comments, keeping the story's display fields
    pub(crate) fn reset(&mut self, story: Option<Story>) {
        if let Some(story) = story {
            self.story = story;
        }
        self.comments.clear();
        self.discovered = 0;
        self.status = ThreadStatus::Loading;
    }

    pub(crate) fn root_loaded(&mut self, item: &Item) {
        match Story::from_item(item) {
            Ok(mut story) => {
                story.raise_comment_count(self.story.comment_count);
                self.story = story;
            }
            Err(err) => {
                tracing::warn!(?err, id = ?item.id, "keeping previous story metadata");
                self.story.refresh(item);
            }
        }
        self.story.raise_comment_count(self.discovered);
        self.status = match item.kids.is_empty() {
            true => ThreadStatus::NoComments,
            false => ThreadStatus::Ready,
        };
    }

    pub(crate) fn root_failed(&mut self, err: Error) {
        self.status = ThreadStatus::Failed(err);
    }
}
