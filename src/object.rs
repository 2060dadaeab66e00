use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::adapter::{same_adapter, AdapterRef};
use crate::error::ModelError;
use crate::metamodel::{AttrType, Class, Feature, FeatureKind, Package};
use crate::notification::{EventKind, Notification};
use crate::value::Value;

/// A reflective object: one slot per declared feature, addressed by feature
/// id, plus the collection of attached adapters.
///
/// `Object` is a cheap handle; clones share the same underlying instance and
/// equality is identity. Every mutation notifies the attached adapters
/// synchronously before the mutating call returns. No borrow is held while
/// adapters run, so handlers may mutate the graph they observe; it is the
/// caller's responsibility not to build unbounded mutation cycles.
#[derive(Clone)]
pub struct Object {
    inner: Rc<RefCell<Inner>>,
}

/// Non-owning handle, for adapter back-references.
#[derive(Clone)]
pub struct WeakObject {
    inner: Weak<RefCell<Inner>>,
}

impl WeakObject {
    pub fn upgrade(&self) -> Option<Object> {
        self.inner.upgrade().map(|inner| Object { inner })
    }
}

enum Slot {
    Single(Value),
    Many(Vec<Value>),
}

struct Inner {
    package: Rc<Package>,
    class: usize,
    slots: Vec<Slot>,
    adapters: Vec<AdapterRef>,
}

impl Inner {
    fn class(&self) -> &Class {
        &self.package.classes[self.class]
    }

    fn feature(&self, id: usize) -> Result<Feature, ModelError> {
        self.class()
            .feature(id)
            .cloned()
            .ok_or_else(|| ModelError::UnknownFeature {
                class: self.class().name.clone(),
                feature: id,
            })
    }
}

impl Object {
    pub(crate) fn from_parts(package: Rc<Package>, class: usize) -> Object {
        let slots = package.classes[class]
            .features
            .iter()
            .map(|f| {
                if f.is_many() {
                    Slot::Many(Vec::new())
                } else {
                    Slot::Single(Value::Nil)
                }
            })
            .collect();
        Object {
            inner: Rc::new(RefCell::new(Inner {
                package,
                class,
                slots,
                adapters: Vec::new(),
            })),
        }
    }

    pub fn package(&self) -> Rc<Package> {
        Rc::clone(&self.inner.borrow().package)
    }

    pub fn class(&self) -> Class {
        self.inner.borrow().class().clone()
    }

    pub fn class_name(&self) -> String {
        self.inner.borrow().class().name.clone()
    }

    pub fn feature(&self, id: usize) -> Option<Feature> {
        self.inner.borrow().class().feature(id).cloned()
    }

    pub fn feature_id(&self, name: &str) -> Option<usize> {
        self.inner.borrow().class().feature_named(name).map(|f| f.id)
    }

    pub fn feature_count(&self) -> usize {
        self.inner.borrow().class().features.len()
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Stable identity key for the lifetime of the object.
    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    // --- feature access ---

    /// Read a feature slot. Many-valued features come back as `Value::List`.
    pub fn get(&self, feature: usize) -> Result<Value, ModelError> {
        let inner = self.inner.borrow();
        inner.feature(feature)?;
        Ok(match &inner.slots[feature] {
            Slot::Single(value) => value.clone(),
            Slot::Many(items) => Value::List(items.clone()),
        })
    }

    /// Assign a single-valued feature. Assigning a value equal to the current
    /// one is a silent no-op; otherwise exactly one `Set` notification fires.
    pub fn set(&self, feature: usize, value: Value) -> Result<(), ModelError> {
        let meta = self.checked_feature(feature)?;
        if meta.is_many() {
            return Err(ModelError::NotSingleValued {
                class: self.class_name(),
                feature: meta.name,
            });
        }
        self.check_value(&meta, &value)?;

        let note = {
            let mut inner = self.inner.borrow_mut();
            let Slot::Single(current) = &mut inner.slots[feature] else {
                unreachable!("single-valued feature backed by list slot");
            };
            if *current == value {
                return Ok(());
            }
            let old = std::mem::replace(current, value.clone());
            Notification::new(self.clone(), feature, EventKind::Set, old, value, None)
        };
        self.dispatch(&note);
        Ok(())
    }

    pub fn unset(&self, feature: usize) -> Result<(), ModelError> {
        self.set(feature, Value::Nil)
    }

    pub fn len_of(&self, feature: usize) -> Result<usize, ModelError> {
        let meta = self.checked_feature(feature)?;
        let inner = self.inner.borrow();
        match &inner.slots[feature] {
            Slot::Many(items) => Ok(items.len()),
            Slot::Single(_) => Err(ModelError::NotManyValued {
                class: inner.class().name.clone(),
                feature: meta.name,
            }),
        }
    }

    pub fn get_at(&self, feature: usize, index: usize) -> Result<Value, ModelError> {
        let meta = self.many_feature(feature)?;
        let inner = self.inner.borrow();
        let Slot::Many(items) = &inner.slots[feature] else {
            unreachable!("many-valued feature backed by single slot");
        };
        items
            .get(index)
            .cloned()
            .ok_or_else(|| ModelError::IndexOutOfBounds {
                feature: meta.name,
                index,
                len: items.len(),
            })
    }

    /// Insert into a many-valued feature. Fires one `Add` notification with
    /// the insertion index.
    pub fn insert(&self, feature: usize, index: usize, value: Value) -> Result<(), ModelError> {
        let meta = self.many_feature(feature)?;
        self.check_value(&meta, &value)?;

        let note = {
            let mut inner = self.inner.borrow_mut();
            let Slot::Many(items) = &mut inner.slots[feature] else {
                unreachable!("many-valued feature backed by single slot");
            };
            if index > items.len() {
                return Err(ModelError::IndexOutOfBounds {
                    feature: meta.name,
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value.clone());
            Notification::new(
                self.clone(),
                feature,
                EventKind::Add,
                Value::Nil,
                value,
                Some(index),
            )
        };
        self.dispatch(&note);
        Ok(())
    }

    /// Append to a many-valued feature.
    pub fn push(&self, feature: usize, value: Value) -> Result<(), ModelError> {
        let index = self.len_of(feature)?;
        self.insert(feature, index, value)
    }

    /// Append several values. One value fires a plain `Add`; more fire a
    /// single `AddMany` whose position is the index of the first insertion.
    pub fn extend(&self, feature: usize, values: Vec<Value>) -> Result<(), ModelError> {
        if values.is_empty() {
            self.many_feature(feature)?;
            return Ok(());
        }
        if values.len() == 1 {
            return self.push(feature, values.into_iter().next().unwrap());
        }
        let meta = self.many_feature(feature)?;
        for value in &values {
            self.check_value(&meta, value)?;
        }

        let note = {
            let mut inner = self.inner.borrow_mut();
            let Slot::Many(items) = &mut inner.slots[feature] else {
                unreachable!("many-valued feature backed by single slot");
            };
            let start = items.len();
            items.extend(values.iter().cloned());
            Notification::new(
                self.clone(),
                feature,
                EventKind::AddMany,
                Value::Nil,
                Value::List(values),
                Some(start),
            )
        };
        self.dispatch(&note);
        Ok(())
    }

    /// Remove by index. Fires one `Remove` notification carrying the removed
    /// value and the index it held prior to removal.
    pub fn remove_at(&self, feature: usize, index: usize) -> Result<Value, ModelError> {
        let meta = self.many_feature(feature)?;

        let (note, removed) = {
            let mut inner = self.inner.borrow_mut();
            let Slot::Many(items) = &mut inner.slots[feature] else {
                unreachable!("many-valued feature backed by single slot");
            };
            if index >= items.len() {
                return Err(ModelError::IndexOutOfBounds {
                    feature: meta.name,
                    index,
                    len: items.len(),
                });
            }
            let removed = items.remove(index);
            (
                Notification::new(
                    self.clone(),
                    feature,
                    EventKind::Remove,
                    removed.clone(),
                    Value::Nil,
                    Some(index),
                ),
                removed,
            )
        };
        self.dispatch(&note);
        Ok(removed)
    }

    /// Remove the first occurrence of `value`. Returns whether anything was
    /// removed; absence is not an error.
    pub fn remove_value(&self, feature: usize, value: &Value) -> Result<bool, ModelError> {
        let position = {
            let inner = self.inner.borrow();
            let meta = inner.feature(feature)?;
            match &inner.slots[feature] {
                Slot::Many(items) => items.iter().position(|v| v == value),
                Slot::Single(_) => {
                    return Err(ModelError::NotManyValued {
                        class: inner.class().name.clone(),
                        feature: meta.name,
                    })
                }
            }
        };
        match position {
            Some(index) => self.remove_at(feature, index).map(|_| true),
            None => Ok(false),
        }
    }

    /// Empty a many-valued feature. One remaining value fires a plain
    /// `Remove`; more fire a single positionless `RemoveMany`.
    pub fn clear(&self, feature: usize) -> Result<(), ModelError> {
        let len = self.len_of(feature)?;
        match len {
            0 => return Ok(()),
            1 => {
                self.remove_at(feature, 0)?;
                return Ok(());
            }
            _ => {}
        }
        let note = {
            let mut inner = self.inner.borrow_mut();
            let Slot::Many(items) = &mut inner.slots[feature] else {
                unreachable!("many-valued feature backed by single slot");
            };
            let removed = std::mem::take(items);
            Notification::new(
                self.clone(),
                feature,
                EventKind::RemoveMany,
                Value::List(removed),
                Value::Nil,
                None,
            )
        };
        self.dispatch(&note);
        Ok(())
    }

    /// Direct children reachable through containment features, in feature
    /// declaration order then list order.
    pub fn contained_objects(&self) -> Vec<Object> {
        let inner = self.inner.borrow();
        let mut children = Vec::new();
        for feature in &inner.class().features {
            if !feature.is_containment() {
                continue;
            }
            match &inner.slots[feature.id] {
                Slot::Single(Value::Object(child)) => children.push(child.clone()),
                Slot::Many(items) => {
                    for item in items {
                        if let Value::Object(child) = item {
                            children.push(child.clone());
                        }
                    }
                }
                _ => {}
            }
        }
        children
    }

    // --- adapters ---

    /// Attach an adapter and point its target back at this object. Attaching
    /// an already-attached adapter is a no-op.
    pub fn attach_adapter(&self, adapter: AdapterRef) {
        if self.attach_adapter_silent(adapter.clone()) {
            adapter.set_target(Some(self.clone()));
        }
    }

    /// Detach an adapter and clear its target. Detaching an adapter that was
    /// never attached is a no-op.
    pub fn detach_adapter(&self, adapter: &AdapterRef) {
        if self.detach_adapter_silent(adapter) {
            adapter.set_target(None);
        }
    }

    pub fn has_adapter(&self, adapter: &AdapterRef) -> bool {
        self.inner
            .borrow()
            .adapters
            .iter()
            .any(|a| same_adapter(a, adapter))
    }

    pub fn adapter_count(&self) -> usize {
        self.inner.borrow().adapters.len()
    }

    /// Returns false when the adapter was already attached.
    pub(crate) fn attach_adapter_silent(&self, adapter: AdapterRef) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.adapters.iter().any(|a| same_adapter(a, &adapter)) {
            return false;
        }
        inner.adapters.push(adapter);
        true
    }

    /// Returns false when the adapter was not attached.
    pub(crate) fn detach_adapter_silent(&self, adapter: &AdapterRef) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.adapters.iter().position(|a| same_adapter(a, adapter)) {
            Some(index) => {
                inner.adapters.remove(index);
                true
            }
            None => false,
        }
    }

    fn dispatch(&self, note: &Notification) {
        // Snapshot so handlers can attach/detach adapters mid-dispatch.
        let adapters: Vec<AdapterRef> = self.inner.borrow().adapters.clone();
        for adapter in adapters {
            adapter.notify_changed(note);
        }
    }

    // --- validation helpers ---

    fn checked_feature(&self, id: usize) -> Result<Feature, ModelError> {
        self.inner.borrow().feature(id)
    }

    fn many_feature(&self, id: usize) -> Result<Feature, ModelError> {
        let meta = self.checked_feature(id)?;
        if !meta.is_many() {
            return Err(ModelError::NotManyValued {
                class: self.class_name(),
                feature: meta.name,
            });
        }
        Ok(meta)
    }

    fn check_value(&self, meta: &Feature, value: &Value) -> Result<(), ModelError> {
        if value.is_nil() {
            return Ok(());
        }
        let fits = match &meta.kind {
            FeatureKind::Attribute(AttrType::Str) => matches!(value, Value::Str(_)),
            FeatureKind::Attribute(AttrType::Int) => matches!(value, Value::Int(_)),
            FeatureKind::Attribute(AttrType::Bool) => matches!(value, Value::Bool(_)),
            FeatureKind::Reference { target, .. } => match value {
                Value::Object(object) => object.class_name() == *target,
                _ => false,
            },
        };
        if fits {
            Ok(())
        } else {
            Err(ModelError::TypeMismatch {
                class: self.class_name(),
                feature: meta.name.clone(),
                value: value.kind_name().to_string(),
            })
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class_name())
            .field("ptr", &Rc::as_ptr(&self.inner))
            .finish()
    }
}
