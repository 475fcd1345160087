//! An object/observer runtime for GUI toolkits.
//!
//! Long-lived entities (windows, display connections, application state)
//! embed an [`ObjectCore`] and implement [`Object`]; anything they want to
//! broadcast is declared as a [`Signal`] member. A connection between a
//! signal and a handler is owned by both endpoints, and whichever endpoint
//! is destroyed first detaches the connection from the other side, so
//! neither dangling callbacks nor lost teardown are possible.
//!
//! Dispatch is synchronous and single-threaded. Handlers may freely call
//! [`Signal::connect`] and [`Signal::disconnect`], or drop objects, from
//! inside their own invocation; re-entrant emission of the same signal is
//! rejected with [`EmitError`].
//!
//! ```
//! use std::{cell::Cell, rc::Rc};
//! use sigcon::{Object, ObjectCore, Signal};
//!
//! struct Counter {
//!     core: ObjectCore,
//!     total: Cell<i32>,
//! }
//!
//! impl Counter {
//!     fn on_value(&self, value: &i32) {
//!         self.total.set(self.total.get() + value);
//!     }
//! }
//!
//! impl Object for Counter {
//!     fn object_core(&self) -> &ObjectCore {
//!         &self.core
//!     }
//! }
//!
//! let sig = Signal::new();
//! let counter = Rc::new(Counter {
//!     core: ObjectCore::new(),
//!     total: Cell::new(0),
//! });
//! assert!(sig.connect(&counter, Counter::on_value));
//! sig.emit(&3).unwrap();
//! sig.emit(&4).unwrap();
//! assert_eq!(counter.total.get(), 7);
//! ```

mod connection;
mod object;
mod signal;

pub use object::{Object, ObjectCore, ObjectId};
pub use signal::{EmitError, Signal};
