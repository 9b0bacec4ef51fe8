//! View selector and the registry of open views.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::normalize::RenderableImage;

/// Representation shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    #[default]
    KSpace,
    Image,
}

impl Domain {
    pub fn toggled(self) -> Self {
        match self {
            Domain::KSpace => Domain::Image,
            Domain::Image => Domain::KSpace,
        }
    }
}

/// Current `(time, slice, domain)` position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ViewSelector {
    pub time_index: usize,
    pub slice_index: usize,
    pub domain: Domain,
}

/// What a view displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum View {
    Composite,
    Mosaic,
    SingleCoil(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ViewId(pub u32);

/// Pixel size of the surface a view is drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewEntry {
    pub view: View,
    pub viewport: Viewport,
    /// Last image produced for this view, if any.
    pub last_frame: Option<RenderableImage>,
}

/// Open views keyed by a stable id, iterated in opening order.
#[derive(Debug, Default)]
pub struct ViewRegistry {
    next_id: u32,
    entries: BTreeMap<ViewId, ViewEntry>,
}

impl ViewRegistry {
    pub fn open(&mut self, view: View, viewport: Viewport) -> ViewId {
        let id = ViewId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            ViewEntry {
                view,
                viewport,
                last_frame: None,
            },
        );
        id
    }

    pub fn close(&mut self, id: ViewId) -> Option<ViewEntry> {
        self.entries.remove(&id)
    }

    pub fn get(&self, id: ViewId) -> Option<&ViewEntry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: ViewId) -> Option<&mut ViewEntry> {
        self.entries.get_mut(&id)
    }

    /// First open view of the given kind.
    pub fn find(&self, view: View) -> Option<ViewId> {
        self.entries
            .iter()
            .find(|(_, e)| e.view == view)
            .map(|(id, _)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ViewId, &ViewEntry)> {
        self.entries.iter().map(|(id, e)| (*id, e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every view `keep` rejects, returning the removed ids.
    pub fn retain<F: FnMut(&View) -> bool>(&mut self, mut keep: F) -> Vec<ViewId> {
        let removed: Vec<ViewId> = self
            .entries
            .iter()
            .filter(|(_, e)| !keep(&e.view))
            .map(|(id, _)| *id)
            .collect();
        for id in &removed {
            self.entries.remove(id);
        }
        removed
    }
}
