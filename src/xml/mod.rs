mod reader;
mod resource;
mod writer;

use std::fs;
use std::path::Path;

use crate::error::ModelError;
use crate::object::Object;
use crate::registry::PackageRegistry;

pub use resource::{Diagnostic, NamespaceStyle, Resource};

/// Loads and saves object graphs as XML documents. Holds the package
/// registry used to resolve root element namespaces to metamodels.
pub struct XmlProcessor {
    registry: PackageRegistry,
}

impl XmlProcessor {
    pub fn new(registry: PackageRegistry) -> Self {
        XmlProcessor { registry }
    }

    pub fn registry(&self) -> &PackageRegistry {
        &self.registry
    }

    /// Read and parse the file at `path`. Never returns Err: an unreadable
    /// file comes back as an unloaded resource carrying the io error as a
    /// diagnostic, like any other load problem.
    pub fn load(&self, path: impl AsRef<Path>) -> Resource {
        let path = path.as_ref();
        let uri = path.display().to_string();
        match fs::read_to_string(path) {
            Ok(text) => reader::load_document(&self.registry, &uri, &text),
            Err(e) => Resource::failed(&uri, vec![Diagnostic::new(e.to_string(), 0)]),
        }
    }

    /// Parse XML text directly, recording `uri` as the resource's origin.
    pub fn load_str(&self, uri: &str, text: &str) -> Resource {
        reader::load_document(&self.registry, uri, text)
    }

    /// Serialize `root` and write it to `path`.
    pub fn save(
        &self,
        path: impl AsRef<Path>,
        root: &Object,
        style: NamespaceStyle,
    ) -> Result<(), ModelError> {
        let uri = path.as_ref().display().to_string();
        Resource::new(uri, root.clone(), style).save()
    }
}
