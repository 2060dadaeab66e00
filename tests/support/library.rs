use std::rc::Rc;

use modelkit::{AttrType, ModelError, Object, Package, PackageBuilder, Value};

/// Feature ids, by class, in declaration order.
pub mod ids {
    pub mod library {
        pub const NAME: usize = 0;
        pub const ADDRESS: usize = 1;
        pub const EMPLOYEES: usize = 2;
        pub const OWNER: usize = 3;
    }

    pub mod employee {
        pub const FIRST_NAME: usize = 0;
        pub const LAST_NAME: usize = 1;
        pub const ADDRESS: usize = 2;
        pub const TASKS: usize = 3;
    }

    pub mod task {
        pub const DESCRIPTION: usize = 0;
        pub const PRIORITY: usize = 1;
        pub const DONE: usize = 2;
    }

    pub mod writer {
        pub const FIRST_NAME: usize = 0;
        pub const LAST_NAME: usize = 1;
    }
}

pub const NS_URI: &str = "http://www.example.org/library";

/// A small publishing-house metamodel exercising every feature shape:
/// attributes of each type, single and many containment, and a single-valued
/// cross-reference.
pub fn library_package() -> Rc<Package> {
    let mut builder = PackageBuilder::new("library", NS_URI, "lib");
    builder
        .class("Library")
        .attr("name", AttrType::Str)
        .attr("address", AttrType::Str)
        .containment_many("employees", "Employee")
        .reference("owner", "Employee");
    builder
        .class("Employee")
        .attr("firstName", AttrType::Str)
        .attr("lastName", AttrType::Str)
        .attr("address", AttrType::Str)
        .containment_many("tasks", "Task");
    builder
        .class("Task")
        .attr("description", AttrType::Str)
        .attr("priority", AttrType::Int)
        .attr("done", AttrType::Bool);
    builder
        .class("Writer")
        .attr("firstName", AttrType::Str)
        .attr("lastName", AttrType::Str);
    builder.build().unwrap()
}

pub fn new_library(pkg: &Rc<Package>, name: &str) -> Object {
    let library = pkg.create("Library").unwrap();
    library.set(ids::library::NAME, Value::from(name)).unwrap();
    library
}

pub fn new_employee(pkg: &Rc<Package>, first: &str, last: &str) -> Object {
    let employee = pkg.create("Employee").unwrap();
    employee
        .set(ids::employee::FIRST_NAME, Value::from(first))
        .unwrap();
    employee
        .set(ids::employee::LAST_NAME, Value::from(last))
        .unwrap();
    employee
}

pub fn new_task(pkg: &Rc<Package>, description: &str, priority: i64) -> Object {
    let task = pkg.create("Task").unwrap();
    task.set(ids::task::DESCRIPTION, Value::from(description))
        .unwrap();
    task.set(ids::task::PRIORITY, Value::from(priority)).unwrap();
    task
}

pub const NAME_SEPARATOR: &str = "--";

/// A typed view over a `Writer` object exposing `name` as an attribute
/// derived from `firstName` and `lastName`.
///
/// The derived getter composes on every read; the setter decomposes and
/// writes only the components that actually change, so observers see one
/// notification per changed component and none for a rewrite of the same
/// name.
pub struct Writer {
    object: Object,
}

impl Writer {
    pub fn new(pkg: &Rc<Package>) -> Self {
        Writer {
            object: pkg.create("Writer").unwrap(),
        }
    }

    pub fn object(&self) -> &Object {
        &self.object
    }

    pub fn first_name(&self) -> String {
        text(&self.object, ids::writer::FIRST_NAME)
    }

    pub fn last_name(&self) -> String {
        text(&self.object, ids::writer::LAST_NAME)
    }

    pub fn set_first_name(&self, first: &str) -> Result<(), ModelError> {
        self.object.set(ids::writer::FIRST_NAME, Value::from(first))
    }

    pub fn set_last_name(&self, last: &str) -> Result<(), ModelError> {
        self.object.set(ids::writer::LAST_NAME, Value::from(last))
    }

    pub fn name(&self) -> String {
        format!("{}{}{}", self.first_name(), NAME_SEPARATOR, self.last_name())
    }

    /// Decompose `name` into its components. A name without the separator is
    /// ignored: no component changes and no notification fires.
    pub fn set_name(&self, name: &str) -> Result<(), ModelError> {
        let Some((first, last)) = name.split_once(NAME_SEPARATOR) else {
            return Ok(());
        };
        self.set_first_name(first)?;
        self.set_last_name(last)
    }
}

fn text(object: &Object, feature: usize) -> String {
    match object.get(feature).unwrap() {
        Value::Str(s) => s,
        _ => String::new(),
    }
}
