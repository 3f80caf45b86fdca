/// Circular cursor over the displayed result list.
///
/// Invariant: `index()` is `None` iff `len()` is zero, otherwise it is in
/// `0..len()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionCursor {
    cursor: Option<usize>,
    len: usize,
}

impl SelectionCursor {
    /// Cursor for a freshly displayed list of `len` rows.
    pub fn for_len(len: usize) -> Self {
        let mut cursor = Self::default();
        cursor.reset(len);
        cursor
    }

    /// The displayed list was replaced.
    pub fn reset(&mut self, len: usize) {
        self.len = len;
        self.cursor = if len == 0 { None } else { Some(0) };
    }

    pub fn index(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Step towards the top of the list, wrapping from the first row to the
    /// last.
    pub fn select_next(&mut self) -> Option<usize> {
        self.cursor = match (self.len, self.cursor) {
            (0, _) => None,
            (len, None | Some(0)) => Some(len - 1),
            (_, Some(idx)) => Some(idx - 1),
        };
        self.cursor
    }

    /// Step towards the bottom of the list, wrapping from the last row to
    /// the first.
    pub fn select_previous(&mut self) -> Option<usize> {
        self.cursor = match (self.len, self.cursor) {
            (0, _) => None,
            (_, None) => Some(0),
            (len, Some(idx)) => Some((idx + 1) % len),
        };
        self.cursor
    }

    /// Jump to `idx`; ignored when out of range.
    pub fn select(&mut self, idx: usize) -> bool {
        if idx < self.len {
            self.cursor = Some(idx);
            true
        } else {
            false
        }
    }
}
