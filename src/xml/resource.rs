use std::fmt;
use std::fs;
use std::io::Write;

use crate::error::ModelError;
use crate::object::Object;
use crate::xml::writer::write_document;

/// How the root element declares its namespace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NamespaceStyle {
    /// `<Library xmlns="...">`
    Default,
    /// `<lib:Library xmlns:lib="...">`
    #[default]
    Prefixed,
}

/// A structured load problem with a human-readable message. Line 0 means the
/// problem is not tied to a location (e.g. an unreadable file).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    message: String,
    line: usize,
}

impl Diagnostic {
    pub(crate) fn new(message: impl Into<String>, line: usize) -> Self {
        Diagnostic {
            message: message.into(),
            line,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "line {}: {}", self.line, self.message)
        }
    }
}

/// An object graph bound to a URI, together with the diagnostics its load
/// produced. Loading is best-effort: problems accumulate in `errors()` and
/// `warnings()` instead of failing fast, so callers check `errors().is_empty()`.
pub struct Resource {
    uri: String,
    root: Option<Object>,
    style: NamespaceStyle,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    loaded: bool,
}

impl Resource {
    /// A resource built in memory, ready to save.
    pub fn new(uri: impl Into<String>, root: Object, style: NamespaceStyle) -> Self {
        Resource {
            uri: uri.into(),
            root: Some(root),
            style,
            errors: Vec::new(),
            warnings: Vec::new(),
            loaded: true,
        }
    }

    pub(crate) fn loaded(
        uri: impl Into<String>,
        root: Object,
        style: NamespaceStyle,
        errors: Vec<Diagnostic>,
        warnings: Vec<Diagnostic>,
    ) -> Self {
        Resource {
            uri: uri.into(),
            root: Some(root),
            style,
            errors,
            warnings,
            loaded: true,
        }
    }

    pub(crate) fn failed(uri: impl Into<String>, errors: Vec<Diagnostic>) -> Self {
        Resource {
            uri: uri.into(),
            root: None,
            style: NamespaceStyle::default(),
            errors,
            warnings: Vec::new(),
            loaded: false,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn root(&self) -> Option<&Object> {
        self.root.as_ref()
    }

    pub fn style(&self) -> NamespaceStyle {
        self.style
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Serialize the root to XML text. Deterministic: attribute and element
    /// order mirror declared feature order, so equal graphs produce equal
    /// bytes.
    pub fn to_xml(&self) -> Result<String, ModelError> {
        let root = self.root.as_ref().ok_or(ModelError::NoRoot)?;
        write_document(root, self.style)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ModelError> {
        let text = self.to_xml()?;
        writer
            .write_all(text.as_bytes())
            .map_err(|e| ModelError::Io(e.to_string()))
    }

    /// Write the serialized document to the resource's URI as a file path.
    pub fn save(&self) -> Result<(), ModelError> {
        let text = self.to_xml()?;
        fs::write(&self.uri, text).map_err(|e| ModelError::Io(e.to_string()))
    }
}
