//! Specialized collection types

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable handle to a node stored in a [`NodeTree`](crate::scene::NodeTree)
    pub struct NodeId;
}

/// Per-frame list whose storage is reused across frames
///
/// A rebuild starts with [`begin`](Self::begin), which rewinds the write
/// cursor without releasing memory, and ends with [`end`](Self::end), which
/// truncates the logical length to the cursor. Entries past the cursor from
/// the previous frame are never observable after `end`.
#[derive(Debug, Clone)]
pub struct RenderList<T> {
    items: Vec<T>,
    cursor: usize,
}

impl<T> RenderList<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
        }
    }
    
    /// Rewind the write cursor
    pub fn begin(&mut self) {
        self.cursor = 0;
    }
    
    /// Write an item at the cursor, overwriting the previous frame's entry
    pub fn push(&mut self, item: T) {
        if self.cursor < self.items.len() {
            self.items[self.cursor] = item;
        } else {
            self.items.push(item);
        }
        self.cursor += 1;
    }
    
    /// Truncate to the items written since [`begin`](Self::begin)
    pub fn end(&mut self) {
        self.items.truncate(self.cursor);
    }
    
    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }
    
    /// True when the list holds nothing
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    
    /// Allocated capacity, kept across frames
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }
    
    /// Items as a slice
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
    
    /// Items as a mutable slice (for in-place sorting)
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }
    
    /// Iterate over the items
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> Default for RenderList<T> {
    fn default() -> Self {
        Self::new()
    }
}
