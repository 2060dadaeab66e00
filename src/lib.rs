mod adapter;
mod content;
mod copy;
mod error;
mod metamodel;
mod notification;
mod object;
mod registry;
mod value;
mod xml;

pub use adapter::{Adapter, AdapterRef, FnAdapter};
pub use content::ContentAdapter;
pub use copy::{deep_copy, deep_equals};
pub use error::ModelError;
pub use metamodel::{AttrType, Class, ClassBuilder, Feature, FeatureKind, Package, PackageBuilder};
pub use notification::{EventKind, Notification};
pub use object::{Object, WeakObject};
pub use registry::PackageRegistry;
pub use value::Value;
pub use xml::{Diagnostic, NamespaceStyle, Resource, XmlProcessor};
