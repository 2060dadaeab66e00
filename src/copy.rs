use std::collections::HashMap;

use crate::error::ModelError;
use crate::metamodel::FeatureKind;
use crate::object::Object;
use crate::value::Value;

/// Copy a containment tree. Attributes are copied by value, containment
/// children recursively; cross-references are remapped to the copied object
/// when the referent lies inside the tree and left pointing at the original
/// otherwise. Adapters are not copied.
pub fn deep_copy(root: &Object) -> Result<Object, ModelError> {
    let mut copies = HashMap::new();
    let copy = copy_containment(root, &mut copies)?;
    rewire_references(root, &copies)?;
    Ok(copy)
}

fn copy_containment(
    object: &Object,
    copies: &mut HashMap<usize, Object>,
) -> Result<Object, ModelError> {
    let package = object.package();
    let copy = package.create(&object.class_name())?;
    copies.insert(object.key(), copy.clone());

    for feature in &object.class().features {
        match &feature.kind {
            FeatureKind::Attribute(_) => {
                let value = object.get(feature.id)?;
                if !value.is_nil() {
                    copy.set(feature.id, value)?;
                }
            }
            FeatureKind::Reference {
                containment: true,
                many,
                ..
            } => {
                if *many {
                    for index in 0..object.len_of(feature.id)? {
                        if let Value::Object(child) = object.get_at(feature.id, index)? {
                            let child_copy = copy_containment(&child, copies)?;
                            copy.push(feature.id, Value::Object(child_copy))?;
                        }
                    }
                } else if let Value::Object(child) = object.get(feature.id)? {
                    let child_copy = copy_containment(&child, copies)?;
                    copy.set(feature.id, Value::Object(child_copy))?;
                }
            }
            FeatureKind::Reference { .. } => {} // second pass
        }
    }
    Ok(copy)
}

fn rewire_references(object: &Object, copies: &HashMap<usize, Object>) -> Result<(), ModelError> {
    let Some(copy) = copies.get(&object.key()).cloned() else {
        return Ok(());
    };

    for feature in &object.class().features {
        match &feature.kind {
            FeatureKind::Reference {
                containment: false,
                many,
                ..
            } => {
                if *many {
                    for index in 0..object.len_of(feature.id)? {
                        if let Value::Object(referent) = object.get_at(feature.id, index)? {
                            copy.push(feature.id, Value::Object(remap(&referent, copies)))?;
                        }
                    }
                } else if let Value::Object(referent) = object.get(feature.id)? {
                    copy.set(feature.id, Value::Object(remap(&referent, copies)))?;
                }
            }
            FeatureKind::Reference {
                containment: true,
                many,
                ..
            } => {
                if *many {
                    for index in 0..object.len_of(feature.id)? {
                        if let Value::Object(child) = object.get_at(feature.id, index)? {
                            rewire_references(&child, copies)?;
                        }
                    }
                } else if let Value::Object(child) = object.get(feature.id)? {
                    rewire_references(&child, copies)?;
                }
            }
            FeatureKind::Attribute(_) => {}
        }
    }
    Ok(())
}

fn remap(referent: &Object, copies: &HashMap<usize, Object>) -> Object {
    copies
        .get(&referent.key())
        .cloned()
        .unwrap_or_else(|| referent.clone())
}

/// Structural equality independent of identity: classes and attributes must
/// match, containment trees are compared pairwise, and cross-references are
/// equal when they point at the same position within their respective trees
/// (or at the identical object when the referent lies outside the tree).
pub fn deep_equals(a: &Object, b: &Object) -> bool {
    equals_within(a, b, a, b)
}

fn equals_within(a: &Object, b: &Object, root_a: &Object, root_b: &Object) -> bool {
    if a.class_name() != b.class_name() {
        return false;
    }
    for feature in &a.class().features {
        let (Ok(va), Ok(vb)) = (a.get(feature.id), b.get(feature.id)) else {
            return false;
        };
        match &feature.kind {
            FeatureKind::Attribute(_) => {
                if va != vb {
                    return false;
                }
            }
            FeatureKind::Reference {
                containment: true, ..
            } => {
                if !containment_equals(&va, &vb, root_a, root_b) {
                    return false;
                }
            }
            FeatureKind::Reference { .. } => {
                if !reference_equals(&va, &vb, root_a, root_b) {
                    return false;
                }
            }
        }
    }
    true
}

fn containment_equals(va: &Value, vb: &Value, root_a: &Object, root_b: &Object) -> bool {
    match (va, vb) {
        (Value::Nil, Value::Nil) => true,
        (Value::Object(ca), Value::Object(cb)) => equals_within(ca, cb, root_a, root_b),
        (Value::List(la), Value::List(lb)) => {
            la.len() == lb.len()
                && la
                    .iter()
                    .zip(lb)
                    .all(|(ia, ib)| containment_equals(ia, ib, root_a, root_b))
        }
        _ => false,
    }
}

fn reference_equals(va: &Value, vb: &Value, root_a: &Object, root_b: &Object) -> bool {
    match (va, vb) {
        (Value::Nil, Value::Nil) => true,
        (Value::Object(ra), Value::Object(rb)) => {
            match (path_to(root_a, ra), path_to(root_b, rb)) {
                (Some(pa), Some(pb)) => pa == pb,
                (None, None) => ra == rb,
                _ => false,
            }
        }
        (Value::List(la), Value::List(lb)) => {
            la.len() == lb.len()
                && la
                    .iter()
                    .zip(lb)
                    .all(|(ia, ib)| reference_equals(ia, ib, root_a, root_b))
        }
        _ => false,
    }
}

/// Position of `target` within the containment tree under `root`, as
/// (feature id, index) steps; `None` when the target is not contained.
fn path_to(root: &Object, target: &Object) -> Option<Vec<(usize, usize)>> {
    if root == target {
        return Some(Vec::new());
    }
    for feature in &root.class().features {
        if !feature.is_containment() {
            continue;
        }
        let Ok(value) = root.get(feature.id) else {
            continue;
        };
        match value {
            Value::Object(child) => {
                if let Some(mut path) = path_to(&child, target) {
                    path.insert(0, (feature.id, 0));
                    return Some(path);
                }
            }
            Value::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if let Value::Object(child) = item {
                        if let Some(mut path) = path_to(child, target) {
                            path.insert(0, (feature.id, index));
                            return Some(path);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    None
}
