//! Ordered response history with a navigable cursor.
//!
//! The assistant's responses accumulate in order; the shell displays the
//! entry under the cursor and can move it for back/forward browsing. The
//! cursor is always a valid index, or -1 (represented as `None`) exactly
//! when the history is empty.

/// Append/replace store of assistant response text.
#[derive(Debug, Default)]
pub struct ResponseHistory {
    entries: Vec<String>,
    cursor: Option<usize>,
}

impl ResponseHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new response and moves the cursor to it.
    pub fn append(&mut self, text: String) {
        self.entries.push(text);
        self.cursor = Some(self.entries.len() - 1);
    }

    /// Overwrites the last response. On an empty history this behaves
    /// exactly like [`append`](Self::append). The cursor is left where the
    /// user put it.
    pub fn replace_last(&mut self, text: String) {
        match self.entries.last_mut() {
            Some(last) => *last = text,
            None => self.append(text),
        }
    }

    /// Moves the cursor to `index`. Out-of-range indices are ignored; on an
    /// empty history this is a no-op.
    pub fn move_cursor(&mut self, index: usize) {
        if index < self.entries.len() {
            self.cursor = Some(index);
        }
    }

    /// The response under the cursor, if any.
    pub fn current(&self) -> Option<&str> {
        self.cursor.map(|i| self.entries[i].as_str())
    }

    /// Cursor position, or `None` when the history is empty.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All responses in order, for transcript persistence at session end.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Empties the history for a fresh session.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_has_no_cursor() {
        let history = ResponseHistory::new();
        assert_eq!(history.cursor(), None);
        assert_eq!(history.current(), None);
        assert!(history.is_empty());
    }

    #[test]
    fn append_advances_cursor_to_last() {
        let mut history = ResponseHistory::new();
        history.append("first".into());
        assert_eq!(history.cursor(), Some(0));
        history.append("second".into());
        assert_eq!(history.cursor(), Some(1));
        assert_eq!(history.current(), Some("second"));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn replace_last_on_empty_behaves_like_append() {
        let mut history = ResponseHistory::new();
        history.replace_last("only".into());
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), Some(0));
        assert_eq!(history.current(), Some("only"));
    }

    #[test]
    fn replace_last_overwrites_without_moving_cursor() {
        let mut history = ResponseHistory::new();
        history.append("a".into());
        history.append("b".into());
        history.move_cursor(0);
        history.replace_last("b2".into());
        // The browsed entry is untouched, the last slot changed
        assert_eq!(history.current(), Some("a"));
        assert_eq!(history.entries(), &["a".to_string(), "b2".to_string()]);
        assert_eq!(history.cursor(), Some(0));
    }

    #[test]
    fn move_cursor_out_of_range_is_ignored() {
        let mut history = ResponseHistory::new();
        history.append("a".into());
        history.move_cursor(5);
        assert_eq!(history.cursor(), Some(0));
    }

    #[test]
    fn move_cursor_on_empty_is_noop() {
        let mut history = ResponseHistory::new();
        history.move_cursor(0);
        assert_eq!(history.cursor(), None);
    }

    #[test]
    fn clear_resets_cursor() {
        let mut history = ResponseHistory::new();
        history.append("a".into());
        history.clear();
        assert_eq!(history.cursor(), None);
        assert!(history.is_empty());
    }
}
