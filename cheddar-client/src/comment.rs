use crate::api::{Item, ItemId, Time};

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: ItemId,
    pub author: Option<String>,
    pub body: String,
    pub time: Option<Time>,

    /// Depth below the thread root, direct replies to the root being at 0
    pub hierarchy: usize,

    /// Set iff some ancestor currently hides its children
    pub is_hidden: bool,

    /// Set when the user collapsed this comment's own subtree
    pub hide_children: bool,

    /// Number of descendants hidden when this comment was last collapsed.
    /// Only used as a label: replies arriving after the collapse are not
    /// accounted for.
    pub hidden_children_count: usize,

    /// Child ids as they were at fetch time, only used to drive the fan-out
    #[serde(default)]
    pub kids: Vec<ItemId>,
}

impl Comment {
    /// Returns `None` for replies that have nothing to show
    pub fn from_item(item: Item) -> Option<Comment> {
        if !item.has_content() {
            return None;
        }
        Some(Comment {
            id: item.id,
            author: item.by,
            body: item.text.unwrap_or_default(),
            time: item.time,
            hierarchy: 0,
            is_hidden: false,
            hide_children: false,
            hidden_children_count: 0,
            kids: item.kids,
        })
    }

    #[cfg(test)]
    pub(crate) fn stub(id: u64) -> Comment {
        Comment {
            id: ItemId(id),
            author: Some(String::from("tester")),
            body: format!("comment {id}"),
            time: None,
            hierarchy: 0,
            is_hidden: false,
            hide_children: false,
            hidden_children_count: 0,
            kids: Vec::new(),
        }
    }
}
