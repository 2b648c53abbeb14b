// exposed API of signals

use super::{
    core::{self, Header},
    ring::{self, Link},
};
use std::{
    marker::PhantomData,
    ptr::NonNull,
};


/// Single-threaded signal: an ordered registry of callable slots
///
/// Slots are connected with [`connect`](Self::connect) and invoked in
/// registration order by the `emit` family of methods. Multi-argument
/// signatures are expressed by making `A` a tuple.
///
/// Structural mutation during dispatch is fully supported: a running slot
/// may connect new slots, or disconnect itself or any other slot (visited,
/// unvisited, or currently executing), on the same thread. A slot
/// disconnected mid-call still finishes its own call; a slot connected
/// mid-dispatch is appended at the tail and is invoked in the same dispatch
/// if the traversal has not yet passed the tail. There is no internal
/// locking and the type is deliberately neither `Send` nor `Sync`.
///
/// If a slot panics, the panic propagates out of the emitting method and
/// the remaining slots of that dispatch are not invoked. The signal itself
/// stays consistent and usable; nothing is disconnected by a panic.
pub struct Signal<A, R = ()> {
    // heap sentinel, so the value is movable without link fixups
    sentinel: NonNull<Link>,
    _slots: PhantomData<fn(&A) -> R>,
}

impl<A, R> Signal<A, R> {
    /// Create a signal with no slots
    pub fn new() -> Self {
        Signal { sentinel: ring::alloc_sentinel(), _slots: PhantomData }
    }

    /// Connect a slot, appending it after all currently connected slots
    ///
    /// Returns a [`Connection`] handle which can be used to query or sever
    /// the registration. Dropping the handle does _not_ disconnect the
    /// slot; the registration lives until it is disconnected or the signal
    /// is dropped.
    ///
    /// A callable of the wrong signature is rejected here, at registration
    /// time, by the type system. Slots are `Fn` rather than `FnMut`
    /// because a slot may reentrantly emit the signal it is registered
    /// with; slots that need mutable state can capture a `Cell` or
    /// `RefCell`.
    pub fn connect<F>(&self, slot: F) -> Connection
    where
        F: Fn(&A) -> R + 'static,
    {
        let node = core::Node::<A, R>::alloc(Box::new(slot));
        unsafe {
            ring::push_back(self.sentinel, core::link_of(node));
            // the returned handle takes its own weak share
            core::inc_weak(node);
        }
        trace!("slot connected");
        Connection(Some(node))
    }

    /// Invoke every connected slot in registration order, discarding
    /// results
    pub fn emit(&self, args: &A) {
        self.dispatch(args, |_| true);
    }

    /// Invoke every connected slot in registration order, passing each
    /// result to `on_result` immediately after that slot returns
    pub fn emit_with(&self, args: &A, mut on_result: impl FnMut(R)) {
        self.dispatch(args, |result| {
            on_result(result);
            true
        });
    }

    /// Invoke every connected slot in registration order, retaining only
    /// the result of the last one
    ///
    /// Earlier slots are invoked for effect. Returns `None` if no slot was
    /// invoked.
    pub fn emit_collect_last(&self, args: &A) -> Option<R> {
        let mut last = None;
        self.dispatch(args, |result| {
            last = Some(result);
            true
        });
        last
    }

    /// Create a lazy, pull-based, single-pass sequence of slot results
    ///
    /// Nothing is invoked until the iterator is advanced; each pull
    /// invokes exactly one connected slot with a shared borrow of the
    /// arguments captured here, so abandoning the iterator early means
    /// later slots are never invoked. See [`EmitIter`].
    pub fn emit_lazy(&self, args: A) -> EmitIter<'_, A, R> {
        let cursor = unsafe {
            let first = ring::next(self.sentinel);
            if first == self.sentinel {
                None
            } else {
                // pin the starting position; see EmitIter
                let header = core::header_of(first);
                core::inc_strong(header);
                Some(header)
            }
        };
        EmitIter { signal: self, cursor, args }
    }

    /// Disconnect every currently connected slot
    ///
    /// Outstanding [`Connection`] handles observe `connected() == false`
    /// afterwards; their later use and destruction remain safe.
    pub fn disconnect_all(&self) {
        trace!("disconnecting all slots");
        unsafe {
            let end = self.sentinel;
            let mut p = ring::next(end);
            if p == end {
                return;
            }
            // hand-over-hand pinning, as in dispatch: severing a node
            // drops its callable, and a capture's Drop may mutate the
            // ring, so the successor is pinned before the release that
            // could otherwise free it
            let mut pin = Some(core::StrongGuard::pin(core::header_of(p)));
            while p != end {
                let header = core::header_of(p);
                let next = ring::next(p);
                let succ = if next != end {
                    Some(core::StrongGuard::pin(core::header_of(next)))
                } else {
                    None
                };
                core::disconnect(header);
                pin = succ;
                p = next;
            }
        }
    }

    /// The number of currently connected slots. O(n)
    pub fn connection_count(&self) -> usize {
        unsafe {
            let end = self.sentinel;
            let mut count = 0;
            let mut p = ring::next(end);
            while p != end {
                if core::is_connected(core::header_of(p)) {
                    count += 1;
                }
                p = ring::next(p);
            }
            count
        }
    }

    /// Whether no registrations remain in the registry. O(1)
    ///
    /// This can transiently differ from `connection_count() == 0`: a node
    /// disconnected while a dispatch is pinning it stays in the registry
    /// (counted by neither) until its call completes.
    pub fn is_empty(&self) -> bool {
        unsafe { ring::is_empty(self.sentinel) }
    }

    // shared traversal. invokes each connected slot in registration order,
    // then feeds the result to visit; stops early if visit returns false.
    //
    // the cursor is moved hand-over-hand: the successor is strong-pinned
    // before the current node's pin is released, so none of the user code
    // reachable from here (a slot, the visit sink, or a capture's Drop run
    // by a pin release) can free the node the cursor reads next. a pinned
    // node can be disconnected, but it stays linked and allocated, and the
    // is_connected check then skips it.
    fn dispatch(&self, args: &A, mut visit: impl FnMut(R) -> bool) {
        unsafe {
            let end = self.sentinel;
            let mut p = ring::next(end);
            if p == end {
                return;
            }
            let mut pin = Some(core::StrongGuard::pin(core::header_of(p)));
            while p != end {
                let header = core::header_of(p);
                let result = if core::is_connected(header) {
                    Some(core::invoke::<A, R>(header, args))
                } else {
                    None
                };
                // read the successor while the pin still holds this node
                // in the ring; neighbor unlinks keep the pointer accurate,
                // and a node appended mid-call lands before the sentinel
                // where this read will find it
                let next = ring::next(p);
                let succ = if next != end {
                    Some(core::StrongGuard::pin(core::header_of(next)))
                } else {
                    None
                };
                pin = succ;
                p = next;
                if let Some(result) = result {
                    if !visit(result) {
                        break;
                    }
                }
            }
            drop(pin);
        }
    }
}

impl<A, R: Into<bool>> Signal<A, R> {
    /// Invoke slots in registration order until one returns a result that
    /// coerces to `true`; later slots are not invoked
    ///
    /// Returns whether any slot did.
    pub fn emit_until_true(&self, args: &A) -> bool {
        let mut hit = false;
        self.dispatch(args, |result| {
            hit = result.into();
            !hit
        });
        hit
    }

    /// Invoke slots in registration order until one returns a result that
    /// coerces to `false`; later slots are not invoked
    ///
    /// Returns whether any slot did.
    pub fn emit_until_false(&self, args: &A) -> bool {
        let mut hit = false;
        self.dispatch(args, |result| {
            hit = !result.into();
            !hit
        });
        hit
    }
}

impl<A, R> Default for Signal<A, R> {
    fn default() -> Self {
        Signal::new()
    }
}

impl<A, R> Drop for Signal<A, R> {
    fn drop(&mut self) {
        self.disconnect_all();
        unsafe {
            // every node was just disconnected, and no dispatch can be in
            // flight while we hold the signal exclusively, so the ring is
            // empty and the sentinel can go. outstanding handles keep
            // their nodes' memory alive on their own.
            ring::dealloc_sentinel(self.sentinel);
        }
    }
}


/// Handle to one slot registration
///
/// A `Connection` holds a weak reference to the registration's bookkeeping
/// node: it never keeps the callable alive, only the node's memory, so a
/// handle outliving its signal (or its registration) is safe and merely
/// observes a permanently disconnected slot. Cloning a handle takes another
/// weak reference; dropping one releases it.
///
/// The null handle ([`Connection::default`]) lets a caller declare the
/// handle before connecting the slot that will use it, which is the usual
/// shape for a slot that disconnects itself.
pub struct Connection(Option<NonNull<Header>>);

impl Connection {
    /// Whether the registration this handle refers to is still connected
    ///
    /// False for a null handle.
    pub fn connected(&self) -> bool {
        match self.0 {
            Some(header) => unsafe { core::is_connected(header) },
            None => false,
        }
    }

    /// Sever the registration and null this handle
    ///
    /// Safe no-op on a null or already-disconnected handle, so calling
    /// this twice has the same observable effect as once. Disconnecting
    /// through one handle never invalidates other handles to the same
    /// registration: at most the connected flag flips and the callable is
    /// dropped, immediately if no dispatch is presently executing it,
    /// otherwise as soon as that call completes.
    pub fn disconnect(&mut self) {
        if let Some(header) = self.0.take() {
            unsafe {
                core::disconnect(header);
                core::dec_weak(header);
            }
            trace!("slot disconnected through handle");
        }
    }
}

impl Default for Connection {
    /// The null handle
    fn default() -> Self {
        Connection(None)
    }
}

impl Clone for Connection {
    fn clone(&self) -> Self {
        if let Some(header) = self.0 {
            unsafe { core::inc_weak(header) }
        }
        Connection(self.0)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(header) = self.0.take() {
            unsafe { core::dec_weak(header) }
        }
    }
}


/// Lazy, pull-based, single-pass sequence over one dispatch
///
/// Created by [`Signal::emit_lazy`]. Each call to `next` invokes exactly
/// one connected slot with a shared borrow of the arguments captured at
/// creation; the arguments are never consumed, so every slot sees the same
/// values. Slots connected or disconnected between pulls are handled the
/// same way the eager protocols handle mid-dispatch mutation.
///
/// The iterator pins its current position with a strong reference between
/// pulls, so a registration disconnected while the iterator is paused on
/// it has its callable kept alive until the iterator moves on or is
/// dropped.
pub struct EmitIter<'a, A, R> {
    signal: &'a Signal<A, R>,
    // current ring position, strong-pinned while Some; None = exhausted
    cursor: Option<NonNull<Header>>,
    args: A,
}

impl<'a, A, R> Iterator for EmitIter<'a, A, R> {
    type Item = R;

    fn next(&mut self) -> Option<R> {
        unsafe {
            let end = self.signal.sentinel;
            let cur = self.cursor?;
            // skip to the next connected node. cur is pinned, and no slot
            // code runs during this walk, so every link read is live.
            let mut p = core::link_of(cur);
            while p != end && !core::is_connected(core::header_of(p)) {
                p = ring::next(p);
            }
            if p == end {
                self.cursor = None;
                core::dec_strong(cur);
                return None;
            }
            let header = core::header_of(p);
            if header != cur {
                // move the pin (inc before dec: they may be the same node)
                core::inc_strong(header);
                core::dec_strong(cur);
            }
            // park the pin in self.cursor across the call, so a panicking
            // slot still has it released when the iterator drops
            self.cursor = Some(header);
            let result = core::invoke::<A, R>(header, &self.args);
            // read the successor while this node is still pinned
            let next = ring::next(core::link_of(header));
            if next == end {
                self.cursor = None;
                core::dec_strong(header);
            } else {
                let succ = core::header_of(next);
                core::inc_strong(succ);
                core::dec_strong(header);
                self.cursor = Some(succ);
            }
            Some(result)
        }
    }
}

impl<'a, A, R> Drop for EmitIter<'a, A, R> {
    fn drop(&mut self) {
        if let Some(cur) = self.cursor.take() {
            unsafe { core::dec_strong(cur) }
        }
    }
}


// ==== tests ====
