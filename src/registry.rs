use std::collections::HashMap;
use std::rc::Rc;

use crate::metamodel::Package;

/// Maps namespace URIs to packages. Handed explicitly to the XML processor
/// rather than living in process-global state; registration must happen
/// before any load or save that references the metamodel.
#[derive(Default)]
pub struct PackageRegistry {
    packages: HashMap<String, Rc<Package>>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        PackageRegistry::default()
    }

    /// Register under the package's own namespace URI. Returns the package
    /// previously registered under that URI, if any.
    pub fn register(&mut self, package: Rc<Package>) -> Option<Rc<Package>> {
        self.packages.insert(package.ns_uri.clone(), package)
    }

    pub fn lookup(&self, ns_uri: &str) -> Option<Rc<Package>> {
        self.packages.get(ns_uri).cloned()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
