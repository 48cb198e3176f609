use crate::ThreadView;

/// Row of the story header, above the first comment
pub const HEADER_ROW: usize = 0;

impl ThreadView {
    fn comment_index(&self, row: usize) -> Option<usize> {
        match row {
            HEADER_ROW => None,
            row if row > self.comments.len() => None,
            row => Some(row - 1),
        }
    }

    /// Hide every current descendant of the comment at `row`
    ///
    /// Replies that arrive later under a collapsed comment are hidden on
    /// insertion. Collapsing a comment that has no reply yet does nothing, so
    /// such replies will show up.
    ///
    /// Returns true iff any flag changed.
    pub fn collapse(&mut self, row: usize) -> bool {
        let index = match self.comment_index(row) {
            Some(i) => i,
            None => return false,
        };
        if self.comments[index].hide_children {
            return false;
        }
        let end = self.subtree_end(index);
        for c in &mut self.comments[index + 1..end] {
            c.is_hidden = true;
        }
        let hidden = end - index - 1;
        let target = &mut self.comments[index];
        target.hidden_children_count = hidden;
        target.hide_children = hidden > 0;
        tracing::debug!(id = ?target.id, hidden, "collapsed comment");
        hidden > 0
    }

    /// Reveal every current descendant of the comment at `row`
    ///
    /// This does not look at nested collapses: a descendant that was itself
    /// collapsed keeps its `hide_children` flag, but its replies are shown.
    ///
    /// Returns true iff any flag changed.
    pub fn expand(&mut self, row: usize) -> bool {
        let index = match self.comment_index(row) {
            Some(i) => i,
            None => return false,
        };
        if !self.comments[index].hide_children {
            return false;
        }
        self.comments[index].hide_children = false;
        let end = self.subtree_end(index);
        for c in &mut self.comments[index + 1..end] {
            c.is_hidden = false;
        }
        tracing::debug!(id = ?self.comments[index].id, "expanded comment");
        true
    }
}
