//! Scroll window over the flattened tree

use std::ops::Range;

/// Rows taken by the title, its blank line, the header, and the footer
/// with its blank line.
pub const CHROME_ROWS: u16 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    top: usize,
    height: usize,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { top: 0, height: 1 }
    }
}

impl Viewport {
    pub fn new(height: usize) -> Self {
        Self {
            top: 0,
            height: height.max(1),
        }
    }

    /// Visible rows for a terminal of `rows` lines.
    pub fn for_terminal_rows(rows: u16) -> usize {
        usize::from(rows.saturating_sub(CHROME_ROWS)).max(1)
    }

    pub fn top(&self) -> usize {
        self.top
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn set_height(&mut self, height: usize) {
        self.height = height.max(1);
    }

    /// Scroll just enough to keep `selected` visible. Does nothing when the
    /// list is empty.
    pub fn adjust(&mut self, selected: usize, len: usize) {
        if len == 0 {
            return;
        }
        if selected >= self.top + self.height {
            self.top = selected + 1 - self.height;
        } else if selected < self.top {
            self.top = selected;
        }
    }

    /// Flattened indices to render for a list of `len` rows.
    pub fn visible_range(&self, len: usize) -> Range<usize> {
        let start = self.top.min(len);
        let end = (self.top + self.height).min(len);
        start..end
    }

    pub fn overflows(&self, len: usize) -> bool {
        len > self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scrolls_down_to_reveal_selection() {
        let mut viewport = Viewport::new(3);
        viewport.adjust(5, 10);
        assert_eq!(viewport.top(), 3);
        assert_eq!(viewport.visible_range(10), 3..6);
    }

    #[test]
    fn scrolls_up_to_reveal_selection() {
        let mut viewport = Viewport::new(3);
        viewport.adjust(8, 10);
        viewport.adjust(2, 10);
        assert_eq!(viewport.top(), 2);
    }

    #[test]
    fn no_scroll_while_selection_visible() {
        let mut viewport = Viewport::new(4);
        viewport.adjust(6, 10);
        let top = viewport.top();
        viewport.adjust(5, 10);
        assert_eq!(viewport.top(), top);
    }

    #[test]
    fn empty_list_leaves_viewport_alone() {
        let mut viewport = Viewport::new(3);
        viewport.adjust(7, 10);
        viewport.adjust(0, 0);
        assert_eq!(viewport.top(), 5);
        assert_eq!(viewport.visible_range(0), 0..0);
    }

    #[test]
    fn terminal_rows_minus_chrome() {
        assert_eq!(Viewport::for_terminal_rows(24), 19);
        assert_eq!(Viewport::for_terminal_rows(5), 1);
        assert_eq!(Viewport::for_terminal_rows(0), 1);
        assert_eq!(Viewport::new(0).height(), 1);
    }

    #[test]
    fn visible_range_is_clamped_to_len() {
        let mut viewport = Viewport::new(10);
        viewport.adjust(2, 4);
        assert_eq!(viewport.visible_range(4), 0..4);
        assert!(!viewport.overflows(4));
        assert!(viewport.overflows(11));
    }

    #[derive(Clone, Debug)]
    enum Step {
        Up,
        Down,
        Resize(usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            Just(Step::Up),
            Just(Step::Down),
            (0usize..12).prop_map(Step::Resize),
        ]
    }

    proptest! {
        #[test]
        fn selection_always_inside_window(
            len in 1usize..60,
            height in 0usize..12,
            steps in proptest::collection::vec(step(), 0..200),
        ) {
            let mut viewport = Viewport::new(height);
            let mut selected = 0usize;
            for step in steps {
                match step {
                    Step::Up => selected = selected.saturating_sub(1),
                    Step::Down => selected = (selected + 1).min(len - 1),
                    Step::Resize(h) => viewport.set_height(h),
                }
                viewport.adjust(selected, len);
                prop_assert!(viewport.top() <= selected);
                prop_assert!(selected < viewport.top() + viewport.height());
            }
        }
    }
}
