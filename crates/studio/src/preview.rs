//! Circular browsing over a list of assets.
//!
//! The cursor is transient: it is never persisted and closing discards it.

use crate::asset::{Asset, AssetId};

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewCursor {
    assets: Vec<Asset>,
    current_index: usize,
}

impl PreviewCursor {
    /// Out-of-range start indices wrap. An empty list yields a cursor with
    /// nothing to show.
    pub fn new(assets: Vec<Asset>, start_index: usize) -> Self {
        let current_index = if assets.is_empty() {
            0
        } else {
            start_index % assets.len()
        };
        Self {
            assets,
            current_index,
        }
    }

    pub fn current(&self) -> Option<&Asset> {
        self.assets.get(self.current_index)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn next(&mut self) -> Option<&Asset> {
        if !self.assets.is_empty() {
            self.current_index = (self.current_index + 1) % self.assets.len();
        }
        self.current()
    }

    pub fn previous(&mut self) -> Option<&Asset> {
        let len = self.assets.len();
        if len > 0 {
            self.current_index = (self.current_index + len - 1) % len;
        }
        self.current()
    }

    /// Move to the asset with `id`. Returns false (and stays put) if absent.
    pub fn jump_to(&mut self, id: &AssetId) -> bool {
        match self.assets.iter().position(|a| &a.id == id) {
            Some(index) => {
                self.current_index = index;
                true
            }
            None => false,
        }
    }
}

/// Holds at most one open [`PreviewCursor`].
#[derive(Debug, Clone, Default)]
pub struct PreviewNavigator {
    cursor: Option<PreviewCursor>,
}

impl PreviewNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, assets: Vec<Asset>, start_index: usize) -> Option<&Asset> {
        let cursor = self.cursor.insert(PreviewCursor::new(assets, start_index));
        cursor.current()
    }

    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn cursor(&self) -> Option<&PreviewCursor> {
        self.cursor.as_ref()
    }

    pub fn current(&self) -> Option<&Asset> {
        self.cursor.as_ref()?.current()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.cursor.as_ref().map(PreviewCursor::current_index)
    }

    pub fn next(&mut self) -> Option<&Asset> {
        self.cursor.as_mut()?.next()
    }

    pub fn previous(&mut self) -> Option<&Asset> {
        self.cursor.as_mut()?.previous()
    }

    pub fn jump_to(&mut self, id: &AssetId) -> bool {
        self.cursor.as_mut().is_some_and(|c| c.jump_to(id))
    }

    pub fn close(&mut self) {
        self.cursor = None;
    }
}
