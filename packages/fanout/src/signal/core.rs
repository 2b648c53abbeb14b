// registration node lifecycle: allocation, the dual reference counts, and
// invocation. this concentrates the unsafety; the exposed API is a
// convenience wrapper around this.
//
// the transition rules, which everything else leans on:
//
// - a node starts with strong = 1 (the ring membership about to be
//   established) and weak = 1 (the implicit share held while the callable
//   is live).
// - disconnect: no-op if already disconnected, otherwise clear the
//   connected flag and drop one strong share (the ring's).
// - strong reaching 0: unlink from the ring, drop the callable exactly
//   once, then drop the implicit weak share.
// - weak reaching 0: free the node allocation.
//
// a consequence worth spelling out: a linked node always has strong >= 1,
// and a connected node always has strong >= 1, so pinning any linked node
// with an extra strong share is always legal.

use super::ring::{self, Link};
use std::ptr::NonNull;


// type-erased state shared by the nodes of every signal instantiation.
//
// memory layout (#[repr(C)], link first): a pointer obtained from ring
// traversal casts directly to Header, and a Header pointer casts to the
// concrete Node<A, R> containing it. the two fn pointers stand in for a
// vtable so the non-generic Connection handle can drive teardown.
#[repr(C)]
pub(crate) struct Header {
    link: Link,
    strong: usize,
    weak: usize,
    connected: bool,
    // drop the stored callable in place. called exactly once, when strong
    // reaches zero.
    destroy_slot: unsafe fn(NonNull<Header>),
    // free the node allocation. called exactly once, when weak reaches
    // zero.
    dealloc: unsafe fn(NonNull<Header>),
}

// concrete node for one signal instantiation.
#[repr(C)]
pub(crate) struct Node<A, R> {
    header: Header,
    // Some until strong reaches zero, then None.
    slot: Option<Box<dyn Fn(&A) -> R>>,
}

impl<A, R> Node<A, R> {
    // allocate a connected, not-yet-linked node with strong = 1, weak = 1.
    // the caller must link it (the strong share is the ring's) and is
    // responsible for taking additional weak shares for any handles.
    pub(crate) fn alloc(slot: Box<dyn Fn(&A) -> R>) -> NonNull<Header> {
        let node = Box::new(Node {
            header: Header {
                link: Link::dangling(),
                strong: 1,
                weak: 1,
                connected: true,
                destroy_slot: Self::destroy_slot,
                dealloc: Self::dealloc,
            },
            slot: Some(slot),
        });
        NonNull::from(Box::leak(node)).cast()
    }

    unsafe fn destroy_slot(header: NonNull<Header>) {
        let node = header.cast::<Node<A, R>>().as_ptr();
        debug_assert!((*node).slot.is_some(), "UB");
        (*node).slot = None;
    }

    unsafe fn dealloc(header: NonNull<Header>) {
        drop(Box::from_raw(header.cast::<Node<A, R>>().as_ptr()));
    }
}

// reinterpret a ring position as a node header.
//
// UB if the link is the sentinel (the sentinel is a bare Link).
pub(crate) unsafe fn header_of(link: NonNull<Link>) -> NonNull<Header> {
    link.cast()
}

// the node's position in the ring.
pub(crate) fn link_of(header: NonNull<Header>) -> NonNull<Link> {
    header.cast()
}

// whether the node is still connected.
//
// UB if the header does not point to a live node allocation.
pub(crate) unsafe fn is_connected(header: NonNull<Header>) -> bool {
    (*header.as_ptr()).connected
}

// sever the registration: no-op if already disconnected, otherwise clear
// the connected flag and release the ring's strong share. side effects are
// strictly local to this node and its two ring neighbors.
//
// UB if the header does not point to a live node allocation.
pub(crate) unsafe fn disconnect(header: NonNull<Header>) {
    let hdr = header.as_ptr();
    if (*hdr).connected {
        (*hdr).connected = false;
        dec_strong(header);
    }
}

// take one strong share.
//
// UB if:
//
// - the header does not point to a live node allocation.
// - strong is already zero (the callable is gone; there is nothing left
//   to share).
pub(crate) unsafe fn inc_strong(header: NonNull<Header>) {
    debug_assert!((*header.as_ptr()).strong > 0, "UB");
    (*header.as_ptr()).strong += 1;
}

// take one weak share.
//
// UB if the header does not point to a live node allocation.
pub(crate) unsafe fn inc_weak(header: NonNull<Header>) {
    (*header.as_ptr()).weak += 1;
}

// drop one strong share. on reaching zero: unlink from the ring, drop the
// callable, then drop the implicit weak share it held (which may free the
// node right here, if no handles remain).
//
// UB if:
//
// - the header does not point to a live node allocation.
// - the caller does not own a strong share.
pub(crate) unsafe fn dec_strong(header: NonNull<Header>) {
    let hdr = header.as_ptr();
    debug_assert!((*hdr).strong > 0, "UB");
    (*hdr).strong -= 1;
    if (*hdr).strong == 0 {
        // the ring's share is released only through disconnect, so the
        // flag must already be clear by the time the count bottoms out
        debug_assert!(!(*hdr).connected);
        ring::unlink(link_of(header));
        ((*hdr).destroy_slot)(header);
        dec_weak(header);
    }
}

// drop one weak share. on reaching zero the node allocation is freed.
//
// UB if:
//
// - the header does not point to a live node allocation.
// - the caller does not own a weak share.
pub(crate) unsafe fn dec_weak(header: NonNull<Header>) {
    let hdr = header.as_ptr();
    debug_assert!((*hdr).weak > 0, "UB");
    (*hdr).weak -= 1;
    if (*hdr).weak == 0 {
        debug_assert_eq!((*hdr).strong, 0);
        ((*hdr).dealloc)(header);
    }
}

// invoke the node's stored callable.
//
// UB if:
//
// - the header does not point to a Node<A, R> with these exact parameters.
// - the caller does not hold a strong share (the callable may be gone, or
//   may be dropped by a reentrant disconnect mid-call).
pub(crate) unsafe fn invoke<A, R>(header: NonNull<Header>, args: &A) -> R {
    let node = header.cast::<Node<A, R>>().as_ptr();
    debug_assert!((*node).header.strong > 0, "UB");
    let slot = (*node).slot.as_deref().expect("invoked a node with a destroyed slot");
    slot(args)
}

// scoped strong share pinning a node across one invocation. the node a
// running slot belongs to stays linked and live even if the slot
// disconnects it mid-call; releasing on drop also keeps the counts
// consistent when a slot panics.
pub(crate) struct StrongGuard(NonNull<Header>);

impl StrongGuard {
    // UB under the same conditions as inc_strong.
    pub(crate) unsafe fn pin(header: NonNull<Header>) -> Self {
        inc_strong(header);
        StrongGuard(header)
    }
}

impl Drop for StrongGuard {
    fn drop(&mut self) {
        unsafe { dec_strong(self.0) }
    }
}
