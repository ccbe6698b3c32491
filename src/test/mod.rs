use std::collections::HashMap;

use crate::{
    layout::{LayoutRc, LayoutSource},
    typesystem::TypeHandle,
};

/// A `LayoutSource` backed by a plain map, for building layouts without a registry
#[derive(Default)]
pub struct MapSource {
    layouts: HashMap<TypeHandle, LayoutRc>,
}

impl MapSource {
    /// Register a layout under the type it is bound to
    pub fn insert(&mut self, layout: LayoutRc) {
        self.layouts.insert(layout.owner(), layout);
    }

    /// Forget a layout, simulating a source that lost track of an owner
    pub fn remove(&mut self, handle: TypeHandle) -> Option<LayoutRc> {
        self.layouts.remove(&handle)
    }
}

impl LayoutSource for MapSource {
    fn layout_of(&self, handle: TypeHandle) -> Option<LayoutRc> {
        self.layouts.get(&handle).cloned()
    }
}
