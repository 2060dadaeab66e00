use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::object::Object;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrType {
    Str,
    Int,
    Bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FeatureKind {
    Attribute(AttrType),
    Reference {
        /// Name of the class instances must belong to.
        target: String,
        containment: bool,
        many: bool,
    },
}

/// A structural feature: a named, typed slot addressed by a stable integer id.
/// The id is the feature's index in its class's declaration order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: usize,
    pub name: String,
    pub kind: FeatureKind,
}

impl Feature {
    pub fn is_attribute(&self) -> bool {
        matches!(self.kind, FeatureKind::Attribute(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, FeatureKind::Reference { .. })
    }

    pub fn is_containment(&self) -> bool {
        matches!(self.kind, FeatureKind::Reference { containment: true, .. })
    }

    pub fn is_many(&self) -> bool {
        matches!(self.kind, FeatureKind::Reference { many: true, .. })
    }

    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            FeatureKind::Reference { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn attr_type(&self) -> Option<AttrType> {
        match self.kind {
            FeatureKind::Attribute(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    pub features: Vec<Feature>,
}

impl Class {
    pub fn feature(&self, id: usize) -> Option<&Feature> {
        self.features.get(id)
    }

    pub fn feature_named(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name == name)
    }
}

/// A metamodel package: a namespace plus the classes declared under it.
/// Doubles as the factory for instances of its classes.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub ns_uri: String,
    pub ns_prefix: String,
    pub classes: Vec<Class>,
}

impl Package {
    /// Load a package from its JSON description, validating feature ids and
    /// reference targets.
    pub fn from_json(text: &str) -> Result<Rc<Package>, ModelError> {
        let package: Package =
            serde_json::from_str(text).map_err(|e| ModelError::InvalidMetamodel(e.to_string()))?;
        validate(&package)?;
        Ok(Rc::new(package))
    }

    pub fn class_named(&self, name: &str) -> Option<&Class> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub(crate) fn class_index(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|c| c.name == name)
    }

    /// Create a fresh instance of the named class with all features unset.
    pub fn create(self: &Rc<Self>, class_name: &str) -> Result<Object, ModelError> {
        let index = self
            .class_index(class_name)
            .ok_or_else(|| ModelError::UnknownClass {
                package: self.name.clone(),
                class: class_name.to_string(),
            })?;
        Ok(Object::from_parts(Rc::clone(self), index))
    }
}

fn validate(package: &Package) -> Result<(), ModelError> {
    for (i, class) in package.classes.iter().enumerate() {
        if package.classes[..i].iter().any(|c| c.name == class.name) {
            return Err(ModelError::InvalidMetamodel(format!(
                "duplicate class name {}",
                class.name
            )));
        }
        for (id, feature) in class.features.iter().enumerate() {
            if feature.id != id {
                return Err(ModelError::InvalidMetamodel(format!(
                    "feature {}.{} has id {}, expected {}",
                    class.name, feature.name, feature.id, id
                )));
            }
            if let Some(target) = feature.target() {
                if !package.classes.iter().any(|c| c.name == target) {
                    return Err(ModelError::InvalidMetamodel(format!(
                        "feature {}.{} targets unknown class {}",
                        class.name, feature.name, target
                    )));
                }
            }
        }
    }
    Ok(())
}

pub struct PackageBuilder {
    package: Package,
}

impl PackageBuilder {
    pub fn new(
        name: impl Into<String>,
        ns_uri: impl Into<String>,
        ns_prefix: impl Into<String>,
    ) -> Self {
        PackageBuilder {
            package: Package {
                name: name.into(),
                ns_uri: ns_uri.into(),
                ns_prefix: ns_prefix.into(),
                classes: Vec::new(),
            },
        }
    }

    /// Start a class; features declared on the returned builder get ids in
    /// declaration order.
    pub fn class(&mut self, name: impl Into<String>) -> ClassBuilder<'_> {
        self.package.classes.push(Class {
            name: name.into(),
            features: Vec::new(),
        });
        let class = self.package.classes.last_mut().unwrap();
        ClassBuilder { class }
    }

    pub fn build(self) -> Result<Rc<Package>, ModelError> {
        validate(&self.package)?;
        Ok(Rc::new(self.package))
    }
}

pub struct ClassBuilder<'a> {
    class: &'a mut Class,
}

impl ClassBuilder<'_> {
    fn push(self, name: impl Into<String>, kind: FeatureKind) -> Self {
        let id = self.class.features.len();
        self.class.features.push(Feature {
            id,
            name: name.into(),
            kind,
        });
        self
    }

    pub fn attr(self, name: impl Into<String>, attr_type: AttrType) -> Self {
        self.push(name, FeatureKind::Attribute(attr_type))
    }

    pub fn reference(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.push(
            name,
            FeatureKind::Reference {
                target: target.into(),
                containment: false,
                many: false,
            },
        )
    }

    pub fn reference_many(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.push(
            name,
            FeatureKind::Reference {
                target: target.into(),
                containment: false,
                many: true,
            },
        )
    }

    pub fn containment(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.push(
            name,
            FeatureKind::Reference {
                target: target.into(),
                containment: true,
                many: false,
            },
        )
    }

    pub fn containment_many(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.push(
            name,
            FeatureKind::Reference {
                target: target.into(),
                containment: true,
                many: true,
            },
        )
    }
}
