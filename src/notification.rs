use crate::metamodel::Feature;
use crate::object::Object;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Set,
    Add,
    Remove,
    AddMany,
    RemoveMany,
}

/// An immutable description of one feature mutation, delivered synchronously
/// to every adapter attached to the notifier.
///
/// `position` is `Some(index)` for ordered-container events and `None` for
/// `Set` and for unordered bulk removal.
#[derive(Clone, Debug)]
pub struct Notification {
    notifier: Object,
    feature: usize,
    kind: EventKind,
    old: Value,
    new: Value,
    position: Option<usize>,
}

impl Notification {
    pub(crate) fn new(
        notifier: Object,
        feature: usize,
        kind: EventKind,
        old: Value,
        new: Value,
        position: Option<usize>,
    ) -> Self {
        Notification {
            notifier,
            feature,
            kind,
            old,
            new,
            position,
        }
    }

    /// The object that changed.
    pub fn notifier(&self) -> &Object {
        &self.notifier
    }

    pub fn feature_id(&self) -> usize {
        self.feature
    }

    /// Metadata of the mutated feature, resolved from the notifier's class.
    pub fn feature(&self) -> Option<Feature> {
        self.notifier.feature(self.feature)
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn old_value(&self) -> &Value {
        &self.old
    }

    pub fn new_value(&self) -> &Value {
        &self.new
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }
}
