//! Navigation state for a three-slot page viewer.
//!
//! The viewer shows the current page flanked by its neighbours. [`Viewport`]
//! tracks the current index, which page each slot was last asked to show and
//! which pages have rendered at least once. It does no I/O; the controller pairs
//! it with a [`PageLoader`](crate::PageLoader).
//!
//! Loads are never cancelled by navigation. When a load completes the
//! controller checks [`Viewport::is_bound`] and drops the result if the slot has
//! since been rebound to another page.

use std::collections::BTreeSet;
use std::fmt;

use crate::types::{Chapter, DocumentDescriptor};

/// Position in the three-slot window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Page before the current one.
    Previous,
    /// The current page.
    Current,
    /// Page after the current one.
    Next,
}

impl Slot {
    /// All slots in display order.
    pub const ALL: [Self; 3] = [Self::Previous, Self::Current, Self::Next];

    const fn offset(self) -> i64 {
        match self {
            Self::Previous => -1,
            Self::Current => 0,
            Self::Next => 1,
        }
    }

    const fn position(self) -> usize {
        match self {
            Self::Previous => 0,
            Self::Current => 1,
            Self::Next => 2,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Previous => "prev",
            Self::Current => "current",
            Self::Next => "next",
        })
    }
}

/// Controller-side viewer state.
///
/// ```rust
/// use folio_core::{Slot, Viewport};
///
/// let mut viewport = Viewport::new(241);
/// assert_eq!(viewport.window(), [-1, 0, 1]);
/// assert!(!viewport.previous());
/// assert!(viewport.next());
/// assert_eq!(viewport.index_for(Slot::Next), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Viewport {
    document: DocumentDescriptor,
    current: usize,
    bound: [Option<i64>; 3],
    loaded: BTreeSet<usize>,
}

impl Viewport {
    /// Viewport at the first page of a document without chapters.
    #[must_use]
    pub fn new(total_pages: usize) -> Self {
        Self::for_document(DocumentDescriptor::new(total_pages))
    }

    /// Viewport at the first page of `document`.
    #[must_use]
    pub const fn for_document(document: DocumentDescriptor) -> Self {
        Self {
            document,
            current: 0,
            bound: [None; 3],
            loaded: BTreeSet::new(),
        }
    }

    /// Document being viewed.
    #[must_use]
    pub const fn document(&self) -> &DocumentDescriptor {
        &self.document
    }

    /// 0-based index of the current page.
    #[must_use]
    pub const fn current(&self) -> usize {
        self.current
    }

    /// Indices shown by the previous, current and next slots.
    ///
    /// The outer entries may fall outside the document; loading them yields no
    /// content and the slot stays empty.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn window(&self) -> [i64; 3] {
        let current = self.current as i64;
        [current - 1, current, current + 1]
    }

    /// Index the given slot shows at the current position.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn index_for(&self, slot: Slot) -> i64 {
        self.current as i64 + slot.offset()
    }

    /// Whether a previous page exists.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.current > 0
    }

    /// Whether a next page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.current + 1 < self.document.total_pages
    }

    /// Advance one page. Returns `false` on the last page.
    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.current += 1;
        true
    }

    /// Go back one page. Returns `false` on the first page.
    pub fn previous(&mut self) -> bool {
        if !self.has_previous() {
            return false;
        }
        self.current -= 1;
        true
    }

    /// Jump to a 0-based index. Out-of-range indices are ignored.
    ///
    /// Returns whether the current page changed.
    pub fn go_to(&mut self, index: usize) -> bool {
        if !self.document.contains(index) || index == self.current {
            return false;
        }
        self.current = index;
        true
    }

    /// Record that `slot` should now display `index`.
    pub fn bind(&mut self, slot: Slot, index: i64) {
        self.bound[slot.position()] = Some(index);
    }

    /// Bind every slot to the current window and return it.
    pub fn bind_window(&mut self) -> [(Slot, i64); 3] {
        let window = Slot::ALL.map(|slot| (slot, self.index_for(slot)));
        for (slot, index) in window {
            self.bind(slot, index);
        }
        window
    }

    /// Whether `slot` is still bound to `index`. A `false` answer means the
    /// result for `index` is stale and must not be rendered.
    #[must_use]
    pub fn is_bound(&self, slot: Slot, index: i64) -> bool {
        self.bound[slot.position()] == Some(index)
    }

    /// Remember that `index` rendered successfully.
    pub fn mark_loaded(&mut self, index: usize) {
        self.loaded.insert(index);
    }

    /// Whether `index` has rendered at least once.
    #[must_use]
    pub fn is_loaded(&self, index: usize) -> bool {
        self.loaded.contains(&index)
    }

    /// Number of distinct pages rendered so far.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Chapter containing `index`.
    #[must_use]
    pub fn chapter_for(&self, index: usize) -> Option<&Chapter> {
        self.document.chapter_for(index)
    }

    /// Chapter containing the current page.
    #[must_use]
    pub fn current_chapter(&self) -> Option<&Chapter> {
        self.chapter_for(self.current)
    }

    /// 0-based index a table-of-contents entry navigates to.
    #[must_use]
    pub const fn chapter_start(chapter: &Chapter) -> usize {
        chapter.start_index()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn book() -> DocumentDescriptor {
        DocumentDescriptor::new(20).with_chapters(vec![
            Chapter::new("Cover", 1),
            Chapter::new("Letters", 5),
            Chapter::new("Rules", 17),
        ])
    }

    #[test]
    fn test_window_straddles_current_page() {
        let mut viewport = Viewport::new(241);
        assert_eq!(viewport.window(), [-1, 0, 1]);
        assert!(viewport.go_to(240));
        assert_eq!(viewport.window(), [239, 240, 241]);
    }

    #[test]
    fn test_navigation_is_bounds_checked() {
        let mut viewport = Viewport::new(3);
        assert!(!viewport.previous());
        assert!(viewport.next());
        assert!(viewport.next());
        assert!(!viewport.next());
        assert_eq!(viewport.current(), 2);
        assert!(!viewport.has_next());

        assert!(!viewport.go_to(3));
        assert!(!viewport.go_to(2));
        assert!(viewport.go_to(0));
        assert!(!viewport.has_previous());
    }

    #[test]
    fn test_single_page_document_cannot_move() {
        let mut viewport = Viewport::new(1);
        assert!(!viewport.next());
        assert!(!viewport.previous());
        assert_eq!(viewport.window(), [-1, 0, 1]);
    }

    #[test]
    fn test_rebinding_marks_old_results_stale() {
        let mut viewport = Viewport::new(10);
        viewport.bind_window();
        assert!(viewport.is_bound(Slot::Current, 0));
        assert!(viewport.is_bound(Slot::Previous, -1));

        viewport.next();
        viewport.bind_window();
        // A late result for page 0 in the current slot is discarded
        assert!(!viewport.is_bound(Slot::Current, 0));
        assert!(viewport.is_bound(Slot::Previous, 0));
        assert!(viewport.is_bound(Slot::Current, 1));
    }

    #[test]
    fn test_unbound_slot_accepts_nothing() {
        let viewport = Viewport::new(10);
        assert!(!viewport.is_bound(Slot::Next, 1));
    }

    #[test]
    fn test_loaded_pages_are_tracked() {
        let mut viewport = Viewport::new(10);
        viewport.mark_loaded(4);
        viewport.mark_loaded(4);
        assert!(viewport.is_loaded(4));
        assert!(!viewport.is_loaded(5));
        assert_eq!(viewport.loaded_count(), 1);
    }

    #[test]
    fn test_table_of_contents_navigation() {
        let mut viewport = Viewport::for_document(book());
        let rules = viewport.document().chapters[2].clone();

        assert!(viewport.go_to(Viewport::chapter_start(&rules)));
        assert_eq!(viewport.current(), 16);
        assert_eq!(viewport.current_chapter().unwrap().title, "Rules");
        assert_eq!(viewport.chapter_for(5).unwrap().title, "Letters");
        assert_eq!(viewport.chapter_for(3).unwrap().title, "Cover");
    }
}
