use std::rc::{Rc, Weak};

use crate::adapter::{Adapter, AdapterRef};
use crate::notification::{EventKind, Notification};
use crate::object::Object;
use crate::value::Value;

/// An adapter that observes an entire containment subtree through a single
/// registration.
///
/// On attachment it walks the containment tree depth-first and registers
/// itself on every reachable object exactly once. From then on it maintains
/// that invariant by consuming the containment notifications themselves:
/// objects added below an observed object are attached to, removed ones are
/// detached from. Notifications for non-containment features are forwarded to
/// the handler but never cause attach/detach side effects.
pub struct ContentAdapter {
    handler: Box<dyn Fn(&Notification)>,
    self_ref: Weak<ContentAdapter>,
}

impl ContentAdapter {
    /// Attach a new content adapter to `root` and its current containment
    /// tree. The returned handle is what `detach` expects.
    pub fn attach(root: &Object, handler: impl Fn(&Notification) + 'static) -> Rc<ContentAdapter> {
        let adapter = Rc::new_cyclic(|weak: &Weak<ContentAdapter>| ContentAdapter {
            handler: Box::new(handler),
            self_ref: weak.clone(),
        });
        let as_ref: AdapterRef = adapter.clone();
        attach_tree(&as_ref, root);
        adapter
    }

    /// Detach the adapter from `root` and everything below it.
    pub fn detach(root: &Object, adapter: &Rc<ContentAdapter>) {
        let as_ref: AdapterRef = adapter.clone();
        detach_tree(&as_ref, root);
    }
}

fn attach_tree(adapter: &AdapterRef, object: &Object) {
    if object.attach_adapter_silent(adapter.clone()) {
        for child in object.contained_objects() {
            attach_tree(adapter, &child);
        }
    }
}

fn detach_tree(adapter: &AdapterRef, object: &Object) {
    if object.detach_adapter_silent(adapter) {
        for child in object.contained_objects() {
            detach_tree(adapter, &child);
        }
    }
}

impl Adapter for ContentAdapter {
    fn notify_changed(&self, notification: &Notification) {
        (self.handler)(notification);

        let Some(feature) = notification.feature() else {
            return;
        };
        if !feature.is_containment() {
            return;
        }
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        let this: AdapterRef = this;

        match notification.kind() {
            EventKind::Set => {
                if let Value::Object(old) = notification.old_value() {
                    detach_tree(&this, old);
                }
                if let Value::Object(new) = notification.new_value() {
                    attach_tree(&this, new);
                }
            }
            EventKind::Add => {
                if let Value::Object(new) = notification.new_value() {
                    attach_tree(&this, new);
                }
            }
            EventKind::AddMany => {
                if let Value::List(items) = notification.new_value() {
                    for item in items {
                        if let Value::Object(new) = item {
                            attach_tree(&this, new);
                        }
                    }
                }
            }
            EventKind::Remove => {
                if let Value::Object(old) = notification.old_value() {
                    detach_tree(&this, old);
                }
            }
            EventKind::RemoveMany => {
                if let Value::List(items) = notification.old_value() {
                    for item in items {
                        if let Value::Object(old) = item {
                            detach_tree(&this, old);
                        }
                    }
                }
            }
        }
    }
}
