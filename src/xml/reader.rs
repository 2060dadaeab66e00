use std::rc::Rc;

use crate::metamodel::{AttrType, Feature, FeatureKind, Package};
use crate::object::Object;
use crate::registry::PackageRegistry;
use crate::value::Value;
use crate::xml::resource::{Diagnostic, NamespaceStyle, Resource};

/// Parse an XML document into an object graph, resolving classes and
/// features through the registry. Best-effort: unknown attributes and
/// elements become warnings and are skipped, everything else that goes wrong
/// becomes an error diagnostic. Only a document whose root cannot be built
/// at all comes back unloaded.
pub(crate) fn load_document(registry: &PackageRegistry, uri: &str, text: &str) -> Resource {
    let raw = match parse(text) {
        Ok(raw) => raw,
        Err(diag) => return Resource::failed(uri, vec![diag]),
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let (style, prefix, class_name) = match raw.name.split_once(':') {
        Some((prefix, local)) => (NamespaceStyle::Prefixed, Some(prefix), local),
        None => (NamespaceStyle::Default, None, raw.name.as_str()),
    };

    let xmlns_key = match prefix {
        Some(prefix) => format!("xmlns:{}", prefix),
        None => "xmlns".to_string(),
    };
    let Some(ns_uri) = raw.attr(&xmlns_key) else {
        return Resource::failed(
            uri,
            vec![Diagnostic::new(
                format!("root element {} declares no {}", raw.name, xmlns_key),
                raw.line,
            )],
        );
    };

    let Some(package) = registry.lookup(ns_uri) else {
        return Resource::failed(
            uri,
            vec![Diagnostic::new(
                format!("no package registered for namespace '{}'", ns_uri),
                raw.line,
            )],
        );
    };
    if let Some(prefix) = prefix {
        if prefix != package.ns_prefix {
            warnings.push(Diagnostic::new(
                format!(
                    "document prefix '{}' differs from package prefix '{}'",
                    prefix, package.ns_prefix
                ),
                raw.line,
            ));
        }
    }

    let root = match package.create(class_name) {
        Ok(root) => root,
        Err(e) => {
            return Resource::failed(uri, vec![Diagnostic::new(e.to_string(), raw.line)]);
        }
    };

    let mut pending = Vec::new();
    build(
        &root,
        &raw,
        &package,
        &mut pending,
        &mut errors,
        &mut warnings,
    );
    resolve_pending(&root, pending, &mut errors);

    Resource::loaded(uri, root, style, errors, warnings)
}

/// A cross-reference attribute waiting for the whole tree to exist.
struct PendingRef {
    object: Object,
    feature: Feature,
    text: String,
    line: usize,
}

fn build(
    object: &Object,
    raw: &RawElement,
    package: &Rc<Package>,
    pending: &mut Vec<PendingRef>,
    errors: &mut Vec<Diagnostic>,
    warnings: &mut Vec<Diagnostic>,
) {
    let class = object.class();

    for (name, value) in &raw.attrs {
        if name == "xmlns" || name.starts_with("xmlns:") {
            continue;
        }
        let Some(feature) = class.feature_named(name).cloned() else {
            warnings.push(Diagnostic::new(
                format!("unknown attribute '{}' on {} ignored", name, class.name),
                raw.line,
            ));
            continue;
        };
        match &feature.kind {
            FeatureKind::Attribute(attr_type) => {
                match parse_attr(*attr_type, value) {
                    Ok(parsed) => {
                        if let Err(e) = object.set(feature.id, parsed) {
                            errors.push(Diagnostic::new(e.to_string(), raw.line));
                        }
                    }
                    Err(message) => errors.push(Diagnostic::new(
                        format!("attribute '{}': {}", name, message),
                        raw.line,
                    )),
                }
            }
            FeatureKind::Reference {
                containment: false, ..
            } => pending.push(PendingRef {
                object: object.clone(),
                feature,
                text: value.clone(),
                line: raw.line,
            }),
            FeatureKind::Reference {
                containment: true, ..
            } => errors.push(Diagnostic::new(
                format!(
                    "containment feature '{}' cannot appear as an attribute",
                    name
                ),
                raw.line,
            )),
        }
    }

    for child in &raw.children {
        let Some(feature) = class.feature_named(&child.name).cloned() else {
            warnings.push(Diagnostic::new(
                format!("unknown element '{}' under {} ignored", child.name, class.name),
                child.line,
            ));
            continue;
        };
        let FeatureKind::Reference {
            containment: true,
            many,
            target,
        } = &feature.kind
        else {
            errors.push(Diagnostic::new(
                format!("feature '{}' is not a containment reference", child.name),
                child.line,
            ));
            continue;
        };
        let contained = match package.create(target) {
            Ok(contained) => contained,
            Err(e) => {
                errors.push(Diagnostic::new(e.to_string(), child.line));
                continue;
            }
        };
        build(&contained, child, package, pending, errors, warnings);
        let result = if *many {
            object.push(feature.id, Value::Object(contained))
        } else {
            object.set(feature.id, Value::Object(contained))
        };
        if let Err(e) = result {
            errors.push(Diagnostic::new(e.to_string(), child.line));
        }
    }
}

fn resolve_pending(root: &Object, pending: Vec<PendingRef>, errors: &mut Vec<Diagnostic>) {
    for entry in pending {
        let fragments: Vec<&str> = if entry.feature.is_many() {
            entry.text.split_whitespace().collect()
        } else {
            vec![entry.text.as_str()]
        };
        for fragment in fragments {
            let Some(referent) = resolve_fragment(root, fragment) else {
                errors.push(Diagnostic::new(
                    format!("unresolved reference '{}'", fragment),
                    entry.line,
                ));
                continue;
            };
            let result = if entry.feature.is_many() {
                entry.object.push(entry.feature.id, Value::Object(referent))
            } else {
                entry.object.set(entry.feature.id, Value::Object(referent))
            };
            if let Err(e) = result {
                errors.push(Diagnostic::new(e.to_string(), entry.line));
            }
        }
    }
}

/// Resolve a fragment path (`/`, `//@feature.index/@feature...`) against the
/// root object.
fn resolve_fragment(root: &Object, fragment: &str) -> Option<Object> {
    if fragment == "/" {
        return Some(root.clone());
    }
    let rest = fragment.strip_prefix("//")?;
    let mut current = root.clone();
    for segment in rest.split('/') {
        let segment = segment.strip_prefix('@')?;
        let (name, index) = match segment.rsplit_once('.') {
            Some((name, digits)) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                (name, Some(digits.parse::<usize>().ok()?))
            }
            _ => (segment, None),
        };
        let feature = current.feature_id(name)?;
        let value = match index {
            Some(index) => current.get_at(feature, index).ok()?,
            None => current.get(feature).ok()?,
        };
        current = value.as_object()?.clone();
    }
    Some(current)
}

fn parse_attr(attr_type: AttrType, text: &str) -> Result<Value, String> {
    match attr_type {
        AttrType::Str => Ok(Value::Str(text.to_string())),
        AttrType::Int => text
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("'{}' is not an integer", text)),
        AttrType::Bool => match text {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("'{}' is not a boolean", text)),
        },
    }
}

// --- lexical layer ---

struct RawElement {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<RawElement>,
    line: usize,
}

impl RawElement {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Cursor {
            bytes: text.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
        }
        Some(byte)
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.bytes[self.pos..].starts_with(prefix.as_bytes())
    }

    fn advance(&mut self, len: usize) {
        for _ in 0..len {
            self.bump();
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.bump();
        }
    }

    /// Skip past the first occurrence of `marker`, or fail at end of input.
    fn skip_past(&mut self, marker: &str) -> Result<(), Diagnostic> {
        while self.pos < self.bytes.len() {
            if self.starts_with(marker) {
                self.advance(marker.len());
                return Ok(());
            }
            self.bump();
        }
        Err(Diagnostic::new(
            format!("unexpected end of input looking for '{}'", marker),
            self.line,
        ))
    }

    fn error(&self, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(message, self.line)
    }
}

fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b':' | b'_' | b'-' | b'.')
}

fn parse(text: &str) -> Result<RawElement, Diagnostic> {
    let mut cursor = Cursor::new(text);
    cursor.skip_whitespace();
    if cursor.starts_with("<?xml") {
        cursor.skip_past("?>")?;
    }
    skip_misc(&mut cursor)?;
    if cursor.peek() != Some(b'<') {
        return Err(cursor.error("expected a root element"));
    }
    let root = parse_element(&mut cursor)?;
    skip_misc(&mut cursor)?;
    if cursor.pos < cursor.bytes.len() {
        return Err(cursor.error("unexpected content after the root element"));
    }
    Ok(root)
}

/// Skip whitespace and comments between markup.
fn skip_misc(cursor: &mut Cursor) -> Result<(), Diagnostic> {
    loop {
        cursor.skip_whitespace();
        if cursor.starts_with("<!--") {
            cursor.skip_past("-->")?;
        } else {
            return Ok(());
        }
    }
}

fn parse_name(cursor: &mut Cursor) -> Result<String, Diagnostic> {
    let start = cursor.pos;
    while cursor.peek().is_some_and(is_name_byte) {
        cursor.bump();
    }
    if cursor.pos == start {
        return Err(cursor.error("expected a name"));
    }
    Ok(String::from_utf8_lossy(&cursor.bytes[start..cursor.pos]).into_owned())
}

fn parse_element(cursor: &mut Cursor) -> Result<RawElement, Diagnostic> {
    let line = cursor.line;
    cursor.bump(); // consume '<'
    let name = parse_name(cursor)?;
    let mut element = RawElement {
        name,
        attrs: Vec::new(),
        children: Vec::new(),
        line,
    };

    loop {
        cursor.skip_whitespace();
        match cursor.peek() {
            Some(b'/') => {
                cursor.bump();
                if cursor.peek() != Some(b'>') {
                    return Err(cursor.error(format!("malformed tag '{}'", element.name)));
                }
                cursor.bump();
                return Ok(element);
            }
            Some(b'>') => {
                cursor.bump();
                parse_children(cursor, &mut element)?;
                return Ok(element);
            }
            Some(byte) if is_name_byte(byte) => {
                let attr_name = parse_name(cursor)?;
                cursor.skip_whitespace();
                if cursor.peek() != Some(b'=') {
                    return Err(cursor.error(format!("attribute '{}' has no value", attr_name)));
                }
                cursor.bump();
                cursor.skip_whitespace();
                if cursor.peek() != Some(b'"') {
                    return Err(cursor.error(format!("attribute '{}' is not quoted", attr_name)));
                }
                cursor.bump();
                let start = cursor.pos;
                while cursor.peek().is_some_and(|b| b != b'"') {
                    cursor.bump();
                }
                if cursor.peek().is_none() {
                    return Err(cursor.error(format!("attribute '{}' is not closed", attr_name)));
                }
                let raw_value =
                    String::from_utf8_lossy(&cursor.bytes[start..cursor.pos]).into_owned();
                cursor.bump(); // closing quote
                element.attrs.push((attr_name, unescape(&raw_value)));
            }
            _ => {
                return Err(cursor.error(format!(
                    "unexpected end of input inside tag '{}'",
                    element.name
                )))
            }
        }
    }
}

fn parse_children(cursor: &mut Cursor, element: &mut RawElement) -> Result<(), Diagnostic> {
    loop {
        skip_misc(cursor)?;
        if cursor.starts_with("</") {
            let line = cursor.line;
            cursor.advance(2);
            let close = parse_name(cursor)?;
            if close != element.name {
                return Err(Diagnostic::new(
                    format!(
                        "closing tag '{}' does not match opening tag '{}'",
                        close, element.name
                    ),
                    line,
                ));
            }
            cursor.skip_whitespace();
            if cursor.peek() != Some(b'>') {
                return Err(cursor.error(format!("malformed closing tag '{}'", close)));
            }
            cursor.bump();
            return Ok(());
        }
        match cursor.peek() {
            Some(b'<') => element.children.push(parse_element(cursor)?),
            Some(_) => {
                return Err(cursor.error(format!(
                    "unexpected text content inside element '{}'",
                    element.name
                )))
            }
            None => {
                return Err(cursor.error(format!("element '{}' is never closed", element.name)))
            }
        }
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let replaced = [
            ("&amp;", "&"),
            ("&lt;", "<"),
            ("&gt;", ">"),
            ("&quot;", "\""),
            ("&apos;", "'"),
        ]
        .iter()
        .find(|(entity, _)| rest.starts_with(entity));
        match replaced {
            Some((entity, replacement)) => {
                out.push_str(replacement);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::PackageBuilder;

    fn registry() -> PackageRegistry {
        let mut builder = PackageBuilder::new("graph", "urn:graph", "g");
        builder
            .class("Node")
            .attr("label", AttrType::Str)
            .attr("weight", AttrType::Int)
            .attr("active", AttrType::Bool)
            .containment_many("children", "Node")
            .reference("link", "Node");
        let mut registry = PackageRegistry::new();
        registry.register(builder.build().unwrap());
        registry
    }

    #[test]
    fn loads_nested_document() {
        let registry = registry();
        let resource = load_document(
            &registry,
            "doc.xml",
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <g:Node xmlns:g=\"urn:graph\" label=\"root\" weight=\"3\" active=\"true\">\n\
             \x20 <children label=\"kid\"/>\n\
             </g:Node>\n",
        );
        assert!(resource.is_loaded());
        assert!(resource.errors().is_empty());
        assert!(resource.warnings().is_empty());
        assert_eq!(resource.style(), NamespaceStyle::Prefixed);

        let root = resource.root().unwrap();
        assert_eq!(root.get(0).unwrap(), Value::from("root"));
        assert_eq!(root.get(1).unwrap(), Value::from(3));
        assert_eq!(root.get(2).unwrap(), Value::from(true));
        assert_eq!(root.len_of(3).unwrap(), 1);
        let child = root.get_at(3, 0).unwrap();
        assert_eq!(child.as_object().unwrap().get(0).unwrap(), Value::from("kid"));
    }

    #[test]
    fn default_namespace_detected() {
        let registry = registry();
        let resource = load_document(
            &registry,
            "doc.xml",
            "<Node xmlns=\"urn:graph\" label=\"x\"/>",
        );
        assert!(resource.is_loaded());
        assert_eq!(resource.style(), NamespaceStyle::Default);
    }

    #[test]
    fn cross_reference_resolved_after_build() {
        let registry = registry();
        let resource = load_document(
            &registry,
            "doc.xml",
            "<g:Node xmlns:g=\"urn:graph\" link=\"//@children.1\">\n\
             \x20 <children label=\"a\"/>\n\
             \x20 <children label=\"b\"/>\n\
             </g:Node>",
        );
        assert!(resource.errors().is_empty());
        let root = resource.root().unwrap();
        let link = root.get(4).unwrap();
        let second = root.get_at(3, 1).unwrap();
        assert_eq!(link, second);
    }

    #[test]
    fn unresolved_reference_is_an_error() {
        let registry = registry();
        let resource = load_document(
            &registry,
            "doc.xml",
            "<g:Node xmlns:g=\"urn:graph\" link=\"//@children.7\"/>",
        );
        assert!(resource.is_loaded());
        assert_eq!(resource.errors().len(), 1);
        assert!(resource.errors()[0]
            .message()
            .contains("unresolved reference"));
    }

    #[test]
    fn unknown_attribute_is_a_warning() {
        let registry = registry();
        let resource = load_document(
            &registry,
            "doc.xml",
            "<g:Node xmlns:g=\"urn:graph\" nickname=\"n\"/>",
        );
        assert!(resource.is_loaded());
        assert!(resource.errors().is_empty());
        assert_eq!(resource.warnings().len(), 1);
        assert!(resource.warnings()[0].message().contains("nickname"));
    }

    #[test]
    fn bad_typed_attribute_is_an_error() {
        let registry = registry();
        let resource = load_document(
            &registry,
            "doc.xml",
            "<g:Node xmlns:g=\"urn:graph\" weight=\"heavy\"/>",
        );
        assert!(resource.is_loaded());
        assert_eq!(resource.errors().len(), 1);
        assert!(resource.errors()[0].message().contains("not an integer"));
    }

    #[test]
    fn mismatched_tags_fail_the_load() {
        let registry = registry();
        let resource = load_document(
            &registry,
            "doc.xml",
            "<g:Node xmlns:g=\"urn:graph\">\n</g:Other>",
        );
        assert!(!resource.is_loaded());
        assert_eq!(resource.errors().len(), 1);
        assert_eq!(resource.errors()[0].line(), 2);
    }

    #[test]
    fn unregistered_namespace_fails_the_load() {
        let registry = PackageRegistry::new();
        let resource = load_document(&registry, "doc.xml", "<g:Node xmlns:g=\"urn:graph\"/>");
        assert!(!resource.is_loaded());
        assert!(resource.errors()[0]
            .message()
            .contains("no package registered"));
    }

    #[test]
    fn unknown_class_fails_the_load() {
        let registry = registry();
        let resource = load_document(&registry, "doc.xml", "<g:Blob xmlns:g=\"urn:graph\"/>");
        assert!(!resource.is_loaded());
        assert!(resource.errors()[0].message().contains("Blob"));
    }

    #[test]
    fn comments_and_entities() {
        let registry = registry();
        let resource = load_document(
            &registry,
            "doc.xml",
            "<!-- header -->\n<g:Node xmlns:g=\"urn:graph\" label=\"a &amp; b\"/>\n<!-- footer -->",
        );
        assert!(resource.errors().is_empty());
        assert_eq!(
            resource.root().unwrap().get(0).unwrap(),
            Value::from("a & b")
        );
    }

    #[test]
    fn fragment_resolution() {
        let registry = registry();
        let resource = load_document(
            &registry,
            "doc.xml",
            "<g:Node xmlns:g=\"urn:graph\">\n\
             \x20 <children label=\"a\">\n\
             \x20   <children label=\"aa\"/>\n\
             \x20 </children>\n\
             </g:Node>",
        );
        let root = resource.root().unwrap();
        assert_eq!(resolve_fragment(root, "/").unwrap(), *root);
        let deep = resolve_fragment(root, "//@children.0/@children.0").unwrap();
        assert_eq!(deep.get(0).unwrap(), Value::from("aa"));
        assert!(resolve_fragment(root, "//@children.5").is_none());
        assert!(resolve_fragment(root, "bogus").is_none());
    }
}
