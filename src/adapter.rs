use std::cell::RefCell;
use std::rc::Rc;

use crate::notification::Notification;
use crate::object::{Object, WeakObject};

/// An observer attached to a reflective object.
///
/// Methods take `&self` so that no mutable borrow is held while a handler
/// runs; adapters needing state use interior mutability. This is what allows
/// a handler to mutate the very object it observes (re-entrant dispatch).
pub trait Adapter {
    fn notify_changed(&self, notification: &Notification);

    /// Called with `Some` on attachment and `None` on detachment. Adapters
    /// that do not track their notifier can ignore it.
    fn set_target(&self, _target: Option<Object>) {}

    fn target(&self) -> Option<Object> {
        None
    }
}

pub type AdapterRef = Rc<dyn Adapter>;

pub(crate) fn same_adapter(a: &AdapterRef, b: &AdapterRef) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}

/// Closure-backed adapter. Keeps a weak back-reference to its notifier.
pub struct FnAdapter<F: Fn(&Notification)> {
    handler: F,
    target: RefCell<Option<WeakObject>>,
}

impl<F: Fn(&Notification) + 'static> FnAdapter<F> {
    pub fn new(handler: F) -> Rc<Self> {
        Rc::new(FnAdapter {
            handler,
            target: RefCell::new(None),
        })
    }
}

impl<F: Fn(&Notification)> Adapter for FnAdapter<F> {
    fn notify_changed(&self, notification: &Notification) {
        (self.handler)(notification);
    }

    fn set_target(&self, target: Option<Object>) {
        *self.target.borrow_mut() = target.map(|o| o.downgrade());
    }

    fn target(&self) -> Option<Object> {
        self.target.borrow().as_ref().and_then(WeakObject::upgrade)
    }
}
