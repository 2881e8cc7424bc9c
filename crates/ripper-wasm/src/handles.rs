//! Numeric ids for JS objects (contexts, buffers, textures, programs).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use js_sys::WeakMap;
use wasm_bindgen::{JsCast, JsValue};

/// Assigns a stable id to every object it sees. Ids come from one counter,
/// so they are unique across object kinds.
///
/// The forward map is a `WeakMap` and never keeps an object alive. Objects
/// passed to [`Handles::retain`] are also kept in a reverse map so the
/// engine can hand them back to the context.
pub struct Handles {
    ids: WeakMap,
    next: Cell<u32>,
    retained: RefCell<HashMap<u32, JsValue>>,
}

impl Handles {
    pub fn new() -> Self {
        Self {
            ids: WeakMap::new(),
            next: Cell::new(1),
            retained: RefCell::new(HashMap::new()),
        }
    }

    /// Id of `value`, assigning one on first sight. `None` for `null`,
    /// `undefined` and primitives.
    pub fn id(&self, value: &JsValue) -> Option<u32> {
        let object = value.dyn_ref::<js_sys::Object>()?;
        if let Some(id) = self.ids.get(object).as_f64() {
            return Some(id as u32);
        }
        let id = self.next.get();
        self.next.set(id + 1);
        self.ids.set(object, &JsValue::from(id));
        Some(id)
    }

    /// Like [`Handles::id`], and remember the object for [`Handles::object`].
    pub fn retain(&self, value: &JsValue) -> Option<u32> {
        let id = self.id(value)?;
        self.retained
            .borrow_mut()
            .entry(id)
            .or_insert_with(|| value.clone());
        Some(id)
    }

    pub fn object(&self, id: u32) -> Option<JsValue> {
        self.retained.borrow().get(&id).cloned()
    }
}

impl Default for Handles {
    fn default() -> Self {
        Self::new()
    }
}
