use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    mem::take,
    process::abort,
    rc::Rc,
};

use derive_ex::derive_ex;
use parse_display::Display;
use scopeguard::guard;

use crate::{
    connection::{CallbackKey, Connection},
    Object,
};


/// Re-entrant emission of a signal that is already dispatching.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
#[display("recursive signal emission")]
pub struct EmitError;

impl std::error::Error for EmitError {}

/// Typed multicast signal.
///
/// Handlers connect a plain function over `(&H, &T)` and are invoked in
/// connection order on every [`emit`](Self::emit). Signals with several
/// arguments use a tuple for `T`. A `Signal` is neither `Clone` nor `Send`;
/// it is meant to live as a field of the broadcasting object.
#[derive_ex(Default, bound())]
pub struct Signal<T: 'static> {
    node: Rc<SignalNode<T>>,
}

/// Shared signal-side endpoint holding the active/inactive partition.
///
/// Outside a dispatch round every connection sits in `inactive`, in
/// connection order. `emit` relabels the whole list as `active` and then
/// moves connections back one at a time as it visits them, so a connection
/// present in `active` is exactly one that the current round still owes an
/// invocation.
#[derive_ex(Default, bound())]
pub(crate) struct SignalNode<T: 'static> {
    lists: RefCell<Lists<T>>,
    invoking: Cell<bool>,
}

#[derive_ex(Default, bound())]
struct Lists<T: 'static> {
    inactive: Vec<Rc<Connection<T>>>,
    active: VecDeque<Rc<Connection<T>>>,
}

impl<T: 'static> SignalNode<T> {
    fn contains(&self, key: CallbackKey) -> bool {
        let lists = self.lists.borrow();
        lists
            .inactive
            .iter()
            .chain(lists.active.iter())
            .any(|c| c.key() == key)
    }

    fn take_by_key(&self, key: CallbackKey) -> Option<Rc<Connection<T>>> {
        let mut lists = self.lists.borrow_mut();
        if let Some(i) = lists.inactive.iter().position(|c| c.key() == key) {
            return Some(lists.inactive.remove(i));
        }
        if let Some(i) = lists.active.iter().position(|c| c.key() == key) {
            return lists.active.remove(i);
        }
        None
    }

    /// Removes the connection from whichever list currently holds it.
    pub(crate) fn remove(&self, conn: &Connection<T>) {
        let ptr = conn as *const Connection<T>;
        let mut lists = self.lists.borrow_mut();
        if let Some(i) = lists.inactive.iter().position(|c| Rc::as_ptr(c) == ptr) {
            lists.inactive.remove(i);
        } else if let Some(i) = lists.active.iter().position(|c| Rc::as_ptr(c) == ptr) {
            lists.active.remove(i);
        }
    }
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects `callback` to run on `handler` for every emission.
    ///
    /// Returns `false` without connecting if an equal (handler, callback)
    /// connection already exists. A connection made while the signal is
    /// dispatching is not invoked before the next round.
    pub fn connect<H: Object>(&self, handler: &Rc<H>, callback: fn(&H, &T)) -> bool {
        let key = CallbackKey::new(handler, callback);
        if self.node.contains(key) {
            return false;
        }
        let conn = Connection::new(&self.node, handler, callback);
        let slot = handler.object_core().node().insert(conn.clone());
        conn.set_owner_slot(slot);
        self.node.lists.borrow_mut().inactive.push(conn);
        log::trace!(
            "connect {} to signal {:p}",
            handler.object_core().id(),
            Rc::as_ptr(&self.node),
        );
        true
    }

    /// Severs the (handler, callback) connection.
    ///
    /// Returns `false` if no such connection exists. Safe to call from a
    /// handler invoked by this same signal, including on the connection
    /// currently being invoked.
    pub fn disconnect<H: Object>(&self, handler: &Rc<H>, callback: fn(&H, &T)) -> bool {
        let key = CallbackKey::new(handler, callback);
        let Some(conn) = self.node.take_by_key(key) else {
            return false;
        };
        conn.detach_from_owner();
        log::trace!(
            "disconnect {} from signal {:p}",
            handler.object_core().id(),
            Rc::as_ptr(&self.node),
        );
        true
    }

    /// Invokes every connection present at the start of the round, in
    /// connection order, each exactly once.
    ///
    /// Handlers may connect, disconnect, and drop objects mid-round; a
    /// handler re-emitting this same signal gets [`EmitError`]. A panicking
    /// handler propagates only after the signal is restored to a state from
    /// which the next `emit` works normally.
    pub fn emit(&self, args: &T) -> Result<(), EmitError> {
        if self.node.invoking.get() {
            return Err(EmitError);
        }
        self.node.invoking.set(true);

        {
            let mut lists = self.node.lists.borrow_mut();
            debug_assert!(lists.active.is_empty());
            lists.active = take(&mut lists.inactive).into();
        }

        // Restores the partition on every exit path, so an unwinding
        // handler leaves the signal ready for the next round.
        let node = guard(Rc::clone(&self.node), |node| {
            let mut lists = node.lists.borrow_mut();
            while let Some(conn) = lists.active.pop_front() {
                lists.inactive.push(conn);
            }
            node.invoking.set(false);
        });

        loop {
            // The connection is re-filed as inactive before it runs: the
            // handler may disconnect it or drop its own object, and no list
            // may be holding the node's round position when that happens.
            let conn = {
                let mut lists = node.lists.borrow_mut();
                let Some(conn) = lists.active.pop_front() else {
                    break;
                };
                lists.inactive.push(conn.clone());
                conn
            };
            conn.invoke(args);
        }
        Ok(())
    }
}

impl<T: 'static> Drop for Signal<T> {
    fn drop(&mut self) {
        if self.node.invoking.get() {
            // The dispatch loop above this frame still holds the lists;
            // there is no state to soundly unwind to.
            log::error!("`Signal` destroyed during emission");
            abort();
        }

        // Active is empty outside dispatch, so inactive is everything.
        let inactive = take(&mut self.node.lists.borrow_mut().inactive);
        for conn in &inactive {
            conn.detach_from_owner();
        }
    }
}
