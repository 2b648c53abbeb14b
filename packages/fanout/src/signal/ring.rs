// intrusive circular doubly linked ring of registration nodes.
//
// this module is pure link plumbing: it owns no allocations except the
// sentinel, and it never reads or writes anything beyond the two link
// pointers at the start of each node. ownership and lifetime of the nodes
// themselves are the core module's business.

use std::ptr::NonNull;


// link pair embedded at the start of every node, and of the sentinel.
pub(crate) struct Link {
    pub(crate) prev: NonNull<Link>,
    pub(crate) next: NonNull<Link>,
}

impl Link {
    // a link pair that does not yet participate in any ring. reading these
    // pointers before the node is linked is UB.
    pub(crate) fn dangling() -> Self {
        Link { prev: NonNull::dangling(), next: NonNull::dangling() }
    }
}

// allocate a sentinel whose links close the circle on itself (empty ring).
pub(crate) fn alloc_sentinel() -> NonNull<Link> {
    let sentinel = NonNull::from(Box::leak(Box::new(Link::dangling())));
    unsafe {
        (*sentinel.as_ptr()).prev = sentinel;
        (*sentinel.as_ptr()).next = sentinel;
    }
    sentinel
}

// free a sentinel previously returned by alloc_sentinel.
//
// UB if:
//
// - the ring still contains linked nodes.
// - the sentinel is freed twice.
pub(crate) unsafe fn dealloc_sentinel(sentinel: NonNull<Link>) {
    debug_assert!(is_empty(sentinel), "UB");
    drop(Box::from_raw(sentinel.as_ptr()));
}

// whether the ring holds no nodes besides the sentinel.
//
// UB if sentinel is not a live sentinel.
pub(crate) unsafe fn is_empty(sentinel: NonNull<Link>) -> bool {
    (*sentinel.as_ptr()).next == sentinel
}

// link the node immediately before the sentinel, making it the ring tail.
// O(1), touches only the node, the old tail, and the sentinel.
//
// UB if:
//
// - the node is already linked into a ring.
// - the sentinel is not a live sentinel.
pub(crate) unsafe fn push_back(sentinel: NonNull<Link>, node: NonNull<Link>) {
    let tail = (*sentinel.as_ptr()).prev;
    (*node.as_ptr()).prev = tail;
    (*node.as_ptr()).next = sentinel;
    (*tail.as_ptr()).next = node;
    (*sentinel.as_ptr()).prev = node;
}

// unlink the node by patching its two neighbors. O(1), touches nothing
// else. the node's own link pointers are left stale; relinking goes
// through push_back, which overwrites them.
//
// UB if:
//
// - the node is not currently linked.
// - the node is the sentinel (unlinking it breaks the ring).
pub(crate) unsafe fn unlink(node: NonNull<Link>) {
    let prev = (*node.as_ptr()).prev;
    let next = (*node.as_ptr()).next;
    (*next.as_ptr()).prev = prev;
    (*prev.as_ptr()).next = next;
    if cfg!(debug_assertions) {
        (*node.as_ptr()).prev = NonNull::dangling();
        (*node.as_ptr()).next = NonNull::dangling();
    }
}

// the node's successor towards the sentinel.
//
// UB if the node is not currently linked (sentinel included).
pub(crate) unsafe fn next(node: NonNull<Link>) -> NonNull<Link> {
    (*node.as_ptr()).next
}


#[cfg(test)]
mod tests {
    use super::*;

    fn alloc_node() -> NonNull<Link> {
        NonNull::from(Box::leak(Box::new(Link::dangling())))
    }

    unsafe fn dealloc_node(node: NonNull<Link>) {
        drop(Box::from_raw(node.as_ptr()));
    }

    // walk front to back and collect the node pointers.
    unsafe fn collect(sentinel: NonNull<Link>) -> Vec<NonNull<Link>> {
        let mut nodes = Vec::new();
        let mut p = next(sentinel);
        while p != sentinel {
            nodes.push(p);
            p = next(p);
        }
        nodes
    }

    // walk back to front and collect the node pointers.
    unsafe fn collect_rev(sentinel: NonNull<Link>) -> Vec<NonNull<Link>> {
        let mut nodes = Vec::new();
        let mut p = (*sentinel.as_ptr()).prev;
        while p != sentinel {
            nodes.push(p);
            p = (*p.as_ptr()).prev;
        }
        nodes
    }

    #[test]
    fn empty_ring() {
        unsafe {
            let sentinel = alloc_sentinel();
            assert!(is_empty(sentinel));
            assert_eq!(next(sentinel), sentinel);
            dealloc_sentinel(sentinel);
        }
    }

    #[test]
    fn push_back_appends_at_tail() {
        unsafe {
            let sentinel = alloc_sentinel();
            let a = alloc_node();
            let b = alloc_node();
            let c = alloc_node();

            push_back(sentinel, a);
            assert!(!is_empty(sentinel));
            push_back(sentinel, b);
            push_back(sentinel, c);

            assert_eq!(collect(sentinel), vec![a, b, c]);
            assert_eq!(collect_rev(sentinel), vec![c, b, a]);

            unlink(a);
            unlink(b);
            unlink(c);
            assert!(is_empty(sentinel));
            dealloc_node(a);
            dealloc_node(b);
            dealloc_node(c);
            dealloc_sentinel(sentinel);
        }
    }

    #[test]
    fn unlink_patches_neighbors() {
        unsafe {
            let sentinel = alloc_sentinel();
            let a = alloc_node();
            let b = alloc_node();
            let c = alloc_node();
            push_back(sentinel, a);
            push_back(sentinel, b);
            push_back(sentinel, c);

            // middle
            unlink(b);
            assert_eq!(collect(sentinel), vec![a, c]);
            assert_eq!(collect_rev(sentinel), vec![c, a]);

            // front
            unlink(a);
            assert_eq!(collect(sentinel), vec![c]);

            // back (and only)
            unlink(c);
            assert!(is_empty(sentinel));

            dealloc_node(a);
            dealloc_node(b);
            dealloc_node(c);
            dealloc_sentinel(sentinel);
        }
    }

    #[test]
    fn relink_after_unlink() {
        unsafe {
            let sentinel = alloc_sentinel();
            let a = alloc_node();
            let b = alloc_node();
            push_back(sentinel, a);
            push_back(sentinel, b);

            unlink(a);
            push_back(sentinel, a);
            assert_eq!(collect(sentinel), vec![b, a]);

            unlink(a);
            unlink(b);
            dealloc_node(a);
            dealloc_node(b);
            dealloc_sentinel(sentinel);
        }
    }
}
