//! The GraphQL surface derived from the schema graph.

pub(crate) mod resolve;
pub(crate) mod schema;

use bubbly_core::Error;

use std::sync::{Arc, Mutex};

/// Carries the first typed error raised inside a resolver out of the GraphQL
/// execution, so the store can surface its kind instead of a flattened
/// message.
#[derive(Clone, Default)]
pub(crate) struct ErrorSlot(Arc<Mutex<Option<Error>>>);

impl ErrorSlot {
    pub(crate) fn set(&self, err: Error) {
        let mut slot = self.0.lock().unwrap();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    pub(crate) fn take(&self) -> Option<Error> {
        self.0.lock().unwrap().take()
    }
}
