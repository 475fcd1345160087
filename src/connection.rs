use std::{
    any::TypeId,
    cell::Cell,
    rc::{Rc, Weak},
};

use crate::{object::ObjectNode, signal::SignalNode, Object};

/// Object-side view of a connection, with the concrete signal type erased.
pub(crate) trait AnyConnection {
    /// Removes the connection from its signal's lists. No-op if the signal
    /// is already gone or the connection was already removed.
    fn detach_from_signal(&self);
}

/// Identity of a (handler, callback) pair, used to reject duplicate
/// connections. Connections on handlers of different concrete types are
/// never equal, even if their pointers happen to collide.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallbackKey {
    handler: *const (),
    handler_ty: TypeId,
    callback: usize,
}

impl CallbackKey {
    pub fn new<H: Object, T>(handler: &Rc<H>, callback: fn(&H, &T)) -> Self {
        Self {
            handler: Rc::as_ptr(handler) as *const (),
            handler_ty: TypeId::of::<H>(),
            callback: callback as usize,
        }
    }
}

/// Join record between one signal and one handler object.
///
/// Both endpoints hold a strong reference; the record is freed once both
/// have let go. The two detach operations are independent and each
/// tolerates an endpoint that no longer exists, so teardown may start from
/// either side.
pub(crate) struct Connection<T: 'static> {
    signal: Weak<SignalNode<T>>,
    owner: Weak<ObjectNode>,
    owner_slot: Cell<Option<usize>>,
    key: CallbackKey,
    callback: Box<dyn Fn(&T)>,
}

impl<T: 'static> Connection<T> {
    pub fn new<H: Object>(
        signal: &Rc<SignalNode<T>>,
        handler: &Rc<H>,
        callback: fn(&H, &T),
    ) -> Rc<Self> {
        let weak = Rc::downgrade(handler);
        Rc::new(Self {
            signal: Rc::downgrade(signal),
            owner: Rc::downgrade(handler.object_core().node()),
            owner_slot: Cell::new(None),
            key: CallbackKey::new(handler, callback),
            callback: Box::new(move |args: &T| {
                // The handler can only be mid-drop here (its connections are
                // removed before that), so a failed upgrade is skipped.
                if let Some(handler) = weak.upgrade() {
                    callback(&handler, args);
                }
            }),
        })
    }

    pub fn key(&self) -> CallbackKey {
        self.key
    }

    pub fn invoke(&self, args: &T) {
        (self.callback)(args)
    }

    pub fn set_owner_slot(&self, slot: usize) {
        self.owner_slot.set(Some(slot));
    }

    /// Removes the connection from its handler object's slab. No-op if the
    /// object is already gone or the slot was already vacated.
    pub fn detach_from_owner(&self) {
        let slot = self.owner_slot.take();
        if let (Some(owner), Some(slot)) = (self.owner.upgrade(), slot) {
            owner.remove(slot);
        }
    }
}

impl<T: 'static> AnyConnection for Connection<T> {
    fn detach_from_signal(&self) {
        if let Some(signal) = self.signal.upgrade() {
            signal.remove(self);
        }
    }
}
