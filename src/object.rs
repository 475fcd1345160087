use std::{cell::RefCell, mem::take, rc::Rc};

use parse_display::Display;
use slabmap::SlabMap;

use crate::{connection::AnyConnection, Signal};


/// Base trait for handler objects.
///
/// A type participates in the signal system by embedding an [`ObjectCore`]
/// and exposing it here. Handlers are shared as `Rc<H>` and callbacks take
/// `&H`, so mutable handler state lives in `Cell`/`RefCell` fields.
pub trait Object: 'static {
    fn object_core(&self) -> &ObjectCore;
}

/// Identity of an [`ObjectCore`], stable for the core's lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[display("object#{0:x}")]
pub struct ObjectId(usize);

/// Connection bookkeeping for one handler object, plus its disposal signal.
///
/// Dropping the core fires [`sig_disposed`](Self::sig_disposed) and then
/// detaches every connection for which this object is the handler, so no
/// connection outlives its handler.
pub struct ObjectCore {
    node: Rc<ObjectNode>,
    sig_disposed: Signal<ObjectId>,
}

/// Shared object-side endpoint. Connections keep a weak reference to it so
/// that signal-side teardown can unlink from a still-live handler.
#[derive(Default)]
pub(crate) struct ObjectNode {
    connections: RefCell<SlabMap<Rc<dyn AnyConnection>>>,
}

impl ObjectNode {
    pub fn insert(&self, conn: Rc<dyn AnyConnection>) -> usize {
        self.connections.borrow_mut().insert(conn)
    }

    pub fn remove(&self, slot: usize) {
        self.connections.borrow_mut().remove(slot);
    }
}

impl ObjectCore {
    pub fn new() -> Self {
        Self {
            node: Rc::new(ObjectNode::default()),
            sig_disposed: Signal::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        ObjectId(Rc::as_ptr(&self.node) as usize)
    }

    /// Emitted from the core's `Drop`, before the object's connections are
    /// torn down, with the disposed object's [`ObjectId`].
    ///
    /// An object observing its own disposal is skipped; its strong count is
    /// already zero while the core drops.
    pub fn sig_disposed(&self) -> &Signal<ObjectId> {
        &self.sig_disposed
    }

    pub(crate) fn node(&self) -> &Rc<ObjectNode> {
        &self.node
    }
}

impl Default for ObjectCore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObjectCore {
    fn drop(&mut self) {
        // Cannot be re-entered; a core is only dropped once.
        let _ = self.sig_disposed.emit(&self.id());

        // The owner side is drained directly; each connection only needs an
        // explicit detach from its signal side.
        let connections = take(&mut *self.node.connections.borrow_mut());
        if !connections.is_empty() {
            log::trace!("{} dropped with {} connection(s)", self.id(), connections.len());
        }
        for conn in connections.values() {
            conn.detach_from_signal();
        }
    }
}
