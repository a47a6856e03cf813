use std::ops::Range;

use serde::Serialize;

use crate::config::ReviewMode;

/// Bounds-checked review cursor.
///
/// In single mode the cursor is an image index in `[0, N-1]`; in paged mode
/// it is a page index in `[0, ceil(N/P)-1]`. Requests past either bound are
/// clamped, never reported as errors. With `N = 0` the cursor stays at 0 and
/// the visible range is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    mode: ReviewMode,
    page_size: usize,
    len: usize,
    cursor: usize,
}

/// Display-friendly description of what the cursor currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub cursor: usize,
    /// Number of positions the cursor can take
    pub positions: usize,
    /// 1-based first visible image, 0 when nothing is visible
    pub first: usize,
    /// 1-based last visible image
    pub last: usize,
    pub total: usize,
}

impl Navigator {
    /// `page_size` is only used in paged mode and is treated as at least 1.
    pub fn new(mode: ReviewMode, page_size: usize, len: usize) -> Self {
        Self {
            mode,
            page_size: page_size.max(1),
            len,
            cursor: 0,
        }
    }

    pub fn single(len: usize) -> Self {
        Self::new(ReviewMode::Single, 1, len)
    }

    pub fn paged(page_size: usize, len: usize) -> Self {
        Self::new(ReviewMode::Paged, page_size, len)
    }

    pub fn mode(&self) -> ReviewMode {
        self.mode
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Images per cursor step
    pub fn step_size(&self) -> usize {
        match self.mode {
            ReviewMode::Single => 1,
            ReviewMode::Paged => self.page_size,
        }
    }

    /// Number of cursor positions: images in single mode, pages in paged mode.
    pub fn positions(&self) -> usize {
        self.len.div_ceil(self.step_size())
    }

    fn max_cursor(&self) -> usize {
        self.positions().saturating_sub(1)
    }

    pub fn advance(&mut self) -> usize {
        self.cursor = (self.cursor + 1).min(self.max_cursor());
        self.cursor
    }

    pub fn retreat(&mut self) -> usize {
        self.cursor = self.cursor.saturating_sub(1);
        self.cursor
    }

    /// Jump to a position, clamped into range.
    pub fn jump(&mut self, cursor: usize) -> usize {
        self.cursor = cursor.min(self.max_cursor());
        self.cursor
    }

    /// The image set was rescanned: a size change resets the cursor to 0,
    /// otherwise it is kept.
    pub fn reset(&mut self, len: usize) -> usize {
        if len != self.len {
            self.len = len;
            self.cursor = 0;
        }
        self.clamp()
    }

    /// Keep the cursor, pulling it back into range for a new corpus size.
    pub fn resize(&mut self, len: usize) -> usize {
        self.len = len;
        self.clamp()
    }

    fn clamp(&mut self) -> usize {
        self.cursor = self.cursor.min(self.max_cursor());
        self.cursor
    }

    /// Indices of the records visible at the current cursor
    pub fn visible_range(&self) -> Range<usize> {
        let step = self.step_size();
        let start = (self.cursor * step).min(self.len);
        let end = (start + step).min(self.len);
        start..end
    }

    pub fn position(&self) -> Position {
        let range = self.visible_range();
        Position {
            cursor: self.cursor,
            positions: self.positions(),
            first: if range.is_empty() { 0 } else { range.start + 1 },
            last: range.end,
            total: self.len,
        }
    }
}
