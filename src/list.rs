//! Intrusive doubly linked list used to track recency order for the [`crate::index::LruIndex`].
//!
//! The list uses sentinel (sigil) head/tail nodes so that attach/detach never need to
//! special-case an empty list. Nodes are addressed by raw pointer; the owning index is
//! responsible for keeping a `HashMap` from key to node pointer in sync with the list.
//!
//! **Note**: this module is internal infrastructure and is not exposed outside the crate.
//! It performs unsafe raw-pointer surgery that requires careful invariant maintenance;
//! use [`crate::index::LruIndex`] instead of this type directly.

use std::fmt;
use std::mem;
use std::ptr;

/// A node in the doubly linked list.
pub(crate) struct Entry<T> {
    val: mem::MaybeUninit<T>,
    prev: *mut Entry<T>,
    next: *mut Entry<T>,
}

impl<T> Entry<T> {
    fn new(val: T) -> Self {
        Entry {
            val: mem::MaybeUninit::new(val),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    fn new_sigil() -> Self {
        Entry {
            val: mem::MaybeUninit::uninit(),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// # Safety
    /// Must only be called on a non-sigil node whose value has been initialized.
    pub(crate) unsafe fn get_value(&self) -> &T {
        unsafe { self.val.assume_init_ref() }
    }

    /// # Safety
    /// Must only be called on a non-sigil node whose value has been initialized.
    pub(crate) unsafe fn get_value_mut(&mut self) -> &mut T {
        unsafe { self.val.assume_init_mut() }
    }
}

/// An unbounded doubly linked list with O(1) attach/detach/move-to-front.
///
/// Most-recently-touched nodes live at the head; the tail is the eviction end.
/// Capacity is not enforced by the list itself (see [`Self::add_unchecked`]); the
/// index layers its own count/byte-size bounds on top and removes from the tail.
pub(crate) struct List<T> {
    len: usize,
    head: *mut Entry<T>,
    tail: *mut Entry<T>,
}

impl<T> List<T> {
    pub(crate) fn new() -> List<T> {
        let head = Box::into_raw(Box::new(Entry::new_sigil()));
        let tail = Box::into_raw(Box::new(Entry::new_sigil()));

        // SAFETY: head and tail are freshly allocated, valid, distinct pointers.
        unsafe {
            (*head).next = tail;
            (*tail).prev = head;
        }

        List { len: 0, head, tail }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Detaches a node from the list without deallocating it.
    ///
    /// # Safety
    /// `node` must be a non-sentinel node currently attached to this list.
    unsafe fn detach(&mut self, node: *mut Entry<T>) {
        unsafe {
            (*(*node).prev).next = (*node).next;
            (*(*node).next).prev = (*node).prev;
        }
    }

    /// Attaches a freshly allocated (or just-detached) node after the head sentinel.
    ///
    /// # Safety
    /// `node` must not currently be attached to this (or any) list.
    unsafe fn attach(&mut self, node: *mut Entry<T>) {
        unsafe {
            (*node).next = (*self.head).next;
            (*node).prev = self.head;
            (*self.head).next = node;
            (*(*node).next).prev = node;
        }
    }

    /// Moves an already-attached node to the head of the list.
    ///
    /// # Safety
    /// `node` must be a non-sentinel node currently attached to this list.
    pub(crate) unsafe fn move_to_front(&mut self, node: *mut Entry<T>) {
        // SAFETY: caller guarantees node is a valid, attached, non-sentinel node.
        unsafe {
            if (*self.head).next == node {
                return;
            }
            self.detach(node);
            self.attach(node);
        }
    }

    /// Inserts `v` at the head of the list, ignoring any capacity notion.
    ///
    /// The caller (the index) is responsible for evicting from the tail afterward if
    /// its own count/byte bounds were exceeded.
    pub(crate) fn add_unchecked(&mut self, v: T) -> *mut Entry<T> {
        let node = Box::into_raw(Box::new(Entry::new(v)));
        // SAFETY: node was just allocated and is not attached to any list.
        unsafe { self.attach(node) };
        self.len += 1;
        node
    }

    /// Removes and returns the tail (least-recently-touched) entry, if any.
    pub(crate) fn remove_last(&mut self) -> Option<Box<Entry<T>>> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: list is non-empty, so tail.prev is a real, attached node.
        unsafe {
            let prev = (*self.tail).prev;
            self.detach(prev);
            self.len -= 1;
            Some(Box::from_raw(prev))
        }
    }

    /// Detaches and deallocates an arbitrary node from the list.
    ///
    /// # Safety
    /// `node` must be a non-sentinel node currently attached to this list.
    pub(crate) unsafe fn remove(&mut self, node: *mut Entry<T>) -> Option<Box<Entry<T>>> {
        if node.is_null() || node == self.head || node == self.tail {
            return None;
        }
        // SAFETY: caller guarantees node is valid and attached to this list.
        unsafe {
            self.detach(node);
            self.len -= 1;
            Some(Box::from_raw(node))
        }
    }

    /// # Safety
    /// `node` must be a non-sentinel node currently attached to this list.
    pub(crate) unsafe fn get_value_mut(&mut self, node: *mut Entry<T>) -> Option<&mut T> {
        if node.is_null() || node == self.head || node == self.tail {
            None
        } else {
            // SAFETY: node checked non-null and non-sentinel above.
            Some(unsafe { (*node).get_value_mut() })
        }
    }

    fn clear(&mut self) {
        while self.remove_last().is_some() {}
    }

    /// Walks the list from most-recently-touched (head) to least (tail) without
    /// mutating it, invoking `f` with each value in order.
    pub(crate) fn for_each<F: FnMut(&T)>(&self, mut f: F) {
        let mut cur = self.head;
        loop {
            // SAFETY: head/tail/next are always valid pointers within this list.
            cur = unsafe { (*cur).next };
            if cur == self.tail {
                break;
            }
            // SAFETY: cur is a non-sentinel node, so its value is initialized.
            f(unsafe { (*cur).get_value() });
        }
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        self.clear();
        // SAFETY: head and tail were allocated by Box::into_raw in `new` and are
        // dropped exactly once, here.
        unsafe {
            drop(Box::from_raw(self.head));
            drop(Box::from_raw(self.tail));
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List").field("length", &self.len).finish()
    }
}

// SAFETY: List owns all of its nodes exclusively; access is always through `&mut self`
// on the owning index (which itself is behind a `Mutex` once shared across threads).
unsafe impl<T: Send> Send for List<T> {}
