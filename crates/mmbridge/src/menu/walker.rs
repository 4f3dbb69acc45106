//! Child enumeration over the live menu graph

use crate::host::{MenuItems, MenuNode, MenuNodeRef};
use std::sync::Arc;
use tracing::{debug, warn};

/// Lazy iterator over the direct children of a menu node, in host order.
///
/// The count is read once when the iterator is created; an index whose
/// `Item` call fails is skipped. Calling [`menu_children`] again starts a
/// fresh enumeration against the current state of the host.
#[derive(Debug)]
pub struct MenuChildren {
    items: Option<Arc<dyn MenuItems>>,
    next_index: usize,
    count: usize,
}

impl Iterator for MenuChildren {
    type Item = MenuNodeRef;

    fn next(&mut self) -> Option<Self::Item> {
        let items = self.items.as_ref()?;
        while self.next_index < self.count {
            let index = self.next_index;
            self.next_index += 1;
            match items.item(index) {
                Ok(child) => return Some(child),
                Err(e) => {
                    warn!("Failed to read menu child at index {}: {}", index, e);
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.count.saturating_sub(self.next_index)))
    }
}

/// Enumerate the children of `node`.
///
/// A node without a child collection, or whose collection cannot report a
/// count, simply has no children.
pub fn menu_children(node: &dyn MenuNode) -> MenuChildren {
    let items = match node.children() {
        Ok(items) => items,
        Err(e) => {
            debug!("Menu node exposes no readable child collection: {}", e);
            None
        }
    };

    let count = match items.as_ref().map(|items| items.count()) {
        Some(Ok(count)) => count,
        Some(Err(e)) => {
            debug!("Failed to read menu child count: {}", e);
            0
        }
        None => 0,
    };

    MenuChildren {
        items,
        next_index: 0,
        count,
    }
}
