use std::collections::HashMap;
use std::fmt::Write;

use crate::error::ModelError;
use crate::metamodel::{Feature, FeatureKind};
use crate::object::Object;
use crate::value::Value;
use crate::xml::resource::NamespaceStyle;

const PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Serialize a containment tree. Output is deterministic: the prolog is
/// fixed, attributes and child elements follow declared feature order, list
/// order is preserved, nesting is indented two spaces per level, and elements
/// without children self-close. Cross-references are written as fragment
/// paths relative to the root.
pub(crate) fn write_document(root: &Object, style: NamespaceStyle) -> Result<String, ModelError> {
    let mut paths = HashMap::new();
    collect_paths(root, "/", &mut paths);

    let package = root.package();
    let (tag, xmlns) = match style {
        NamespaceStyle::Default => (
            root.class_name(),
            format!(" xmlns=\"{}\"", escape(&package.ns_uri)),
        ),
        NamespaceStyle::Prefixed => (
            format!("{}:{}", package.ns_prefix, root.class_name()),
            format!(
                " xmlns:{}=\"{}\"",
                package.ns_prefix,
                escape(&package.ns_uri)
            ),
        ),
    };

    let mut out = String::from(PROLOG);
    write_element(&mut out, root, &tag, Some(&xmlns), 0, &paths)?;
    Ok(out)
}

fn write_element(
    out: &mut String,
    object: &Object,
    tag: &str,
    xmlns: Option<&str>,
    depth: usize,
    paths: &HashMap<usize, String>,
) -> Result<(), ModelError> {
    let indent = "  ".repeat(depth);
    let _ = write!(out, "{}<{}", indent, tag);
    if let Some(xmlns) = xmlns {
        out.push_str(xmlns);
    }

    let class = object.class();
    for feature in &class.features {
        match &feature.kind {
            FeatureKind::Attribute(_) => {
                let value = object.get(feature.id)?;
                if let Some(text) = attr_text(&value) {
                    let _ = write!(out, " {}=\"{}\"", feature.name, escape(&text));
                }
            }
            FeatureKind::Reference {
                containment: false,
                many,
                ..
            } => {
                if *many {
                    let mut fragments = Vec::new();
                    for index in 0..object.len_of(feature.id)? {
                        if let Value::Object(referent) = object.get_at(feature.id, index)? {
                            fragments.push(fragment_of(&referent, feature, paths)?);
                        }
                    }
                    if !fragments.is_empty() {
                        let _ = write!(out, " {}=\"{}\"", feature.name, fragments.join(" "));
                    }
                } else if let Value::Object(referent) = object.get(feature.id)? {
                    let fragment = fragment_of(&referent, feature, paths)?;
                    let _ = write!(out, " {}=\"{}\"", feature.name, fragment);
                }
            }
            FeatureKind::Reference {
                containment: true, ..
            } => {}
        }
    }

    let mut children = Vec::new();
    for feature in &class.features {
        if !feature.is_containment() {
            continue;
        }
        match object.get(feature.id)? {
            Value::Object(child) => children.push((feature.name.clone(), child)),
            Value::List(items) => {
                for item in items {
                    if let Value::Object(child) = item {
                        children.push((feature.name.clone(), child));
                    }
                }
            }
            _ => {}
        }
    }

    if children.is_empty() {
        out.push_str("/>\n");
    } else {
        out.push_str(">\n");
        for (name, child) in &children {
            write_element(out, child, name, None, depth + 1, paths)?;
        }
        let _ = writeln!(out, "{}</{}>", indent, tag);
    }
    Ok(())
}

fn fragment_of(
    referent: &Object,
    feature: &Feature,
    paths: &HashMap<usize, String>,
) -> Result<String, ModelError> {
    paths
        .get(&referent.key())
        .cloned()
        .ok_or_else(|| ModelError::DanglingReference {
            feature: feature.name.clone(),
        })
}

/// Assign every object in the containment tree its fragment path: `/` for
/// the root, then `//@feature.index` segments.
fn collect_paths(object: &Object, path: &str, paths: &mut HashMap<usize, String>) {
    paths.insert(object.key(), path.to_string());
    for feature in &object.class().features {
        if !feature.is_containment() {
            continue;
        }
        let Ok(value) = object.get(feature.id) else {
            continue;
        };
        match value {
            Value::Object(child) => {
                let child_path = join_path(path, &feature.name, None);
                collect_paths(&child, &child_path, paths);
            }
            Value::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if let Value::Object(child) = item {
                        let child_path = join_path(path, &feature.name, Some(index));
                        collect_paths(child, &child_path, paths);
                    }
                }
            }
            _ => {}
        }
    }
}

fn join_path(parent: &str, feature: &str, index: Option<usize>) -> String {
    let segment = match index {
        Some(index) => format!("@{}.{}", feature, index),
        None => format!("@{}", feature),
    };
    if parent == "/" {
        format!("//{}", segment)
    } else {
        format!("{}/{}", parent, segment)
    }
}

fn attr_text(value: &Value) -> Option<String> {
    match value {
        Value::Nil => None,
        Value::Str(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(_) | Value::List(_) => None,
    }
}

pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
