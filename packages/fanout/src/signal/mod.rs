// implementation of the fanout signal.
//
// the basic architecture is as such:
//
// Signal and Connection handles hold raw pointers into a ring of
// heap-allocated registration nodes
//                |
//     /----------/
//     v
//  registration node ring
//     |
//     |------ every node carries the prev/next links of a circular,
//     |       sentinel-headed doubly linked list. the sentinel is owned by
//     |       the Signal; "empty" means the sentinel links to itself.
//     |
//     |------ every node carries two reference counts:
//     |
//     |       strong: the stored callable is live and invocable. held by
//     |       the ring membership while connected, and temporarily by each
//     |       in-flight invocation. reaching zero unlinks the node and
//     |       drops the callable.
//     |
//     |       weak: the node allocation itself is reachable. held by each
//     |       Connection handle, plus one implicit share while the callable
//     |       is live. reaching zero frees the allocation.
//     |
//     \------ dispatch walks the ring in registration order, pinning each
//             connected node with a strong reference for the duration of
//             its call, so slots may freely connect and disconnect (even
//             themselves) mid-dispatch.
//
// the organization of these modules is as such:
//
//      These are used like
//      library utilities:
//    /--------------------\
//
//      ring<------------------core: This concentrates all the unsafety. It
//                             ^     presents the node lifecycle (alloc,
//                             |     refcount transitions, invoke) as small
//                             |     raw-pointer operations which are sound
//                             |     given documented preconditions, but
//                             |     panicky and inconvenient.
//                             |
//                             api: This is a wrapper around core that adapts
//                                  it into an API that is convenient and
//                                  defensive. The crate re-exports this API
//                                  publically.

pub(crate) mod api;

mod core;
mod ring;
