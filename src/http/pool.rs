//! Bounded connection pool
//!
//! The pool is a capped LIFO stack of idle items plus a counter of items
//! currently handed out. It knows nothing about sockets: anything that can
//! report whether it is reusable and can be closed may be pooled.

/// Something a `Pool` can hold
pub trait Pooled {
    /// Whether the item can carry another exchange
    fn is_reusable(&self) -> bool;

    fn close(&mut self);
}

impl Pooled for super::Connection {
    fn is_reusable(&self) -> bool {
        super::Connection::is_reusable(self)
    }

    fn close(&mut self) {
        super::Connection::close(self)
    }
}

/// Default number of idle items kept per root
pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug)]
pub struct Pool<T> {
    idle: Vec<T>,
    capacity: usize,
    allocated: usize,
}

impl<T: Pooled> Pool<T> {
    pub fn new(capacity: usize) -> Self {
        Pool {
            idle: Vec::with_capacity(capacity),
            capacity,
            allocated: 0,
        }
    }

    /// Count one allocation and hand out the most recently pooled reusable
    /// item, if any
    ///
    /// `None` means the caller has to open a fresh item; if that fails it
    /// must call `cancel` to undo the count.
    pub fn allocate(&mut self) -> Option<T> {
        self.allocated += 1;
        while let Some(mut item) = self.idle.pop() {
            if item.is_reusable() {
                return Some(item);
            }
            item.close();
        }
        None
    }

    /// Undo the count of an allocation that produced no item
    pub fn cancel(&mut self) {
        self.release();
    }

    /// Take an item back
    ///
    /// Returns the item when it has to be closed instead of pooled: `keep`
    /// is false, the item is no longer reusable, or the pool is full.
    ///
    /// # Panics
    ///
    /// Panics if nothing is allocated; that is a call-discipline bug.
    pub fn free(&mut self, item: T, keep: bool) -> Option<T> {
        self.release();
        if keep && self.idle.len() < self.capacity && item.is_reusable() {
            self.idle.push(item);
            None
        } else {
            Some(item)
        }
    }

    /// Items currently handed out
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Idle items kept for reuse
    pub fn pooled(&self) -> usize {
        self.idle.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Close and drop every idle item
    pub fn clear(&mut self) {
        for mut item in self.idle.drain(..) {
            item.close();
        }
    }

    fn release(&mut self) {
        assert!(
            self.allocated > 0,
            "connection freed without a matching allocation"
        );
        self.allocated -= 1;
    }
}
