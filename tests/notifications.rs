mod support;

use std::cell::RefCell;
use std::rc::Rc;

use modelkit::{Adapter, AdapterRef, EventKind, FnAdapter, Notification, Object, Value};
use support::library::{self, ids, new_employee, new_library, new_task};

fn record(object: &Object) -> Rc<RefCell<Vec<Notification>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    object.attach_adapter(FnAdapter::new(move |n: &Notification| {
        sink.borrow_mut().push(n.clone())
    }));
    log
}

#[test]
fn every_mutation_is_announced_before_the_call_returns() {
    let pkg = library::library_package();
    let library = new_library(&pkg, "City Library");
    let seen = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&seen);
    let observed = library.clone();
    library.attach_adapter(FnAdapter::new(move |n: &Notification| {
        // the new state is already visible while the handler runs
        assert_eq!(observed.get(n.feature_id()).unwrap(), *n.new_value());
        sink.borrow_mut().push(n.kind());
    }));

    library
        .set(ids::library::ADDRESS, Value::from("1 Main St"))
        .unwrap();
    assert_eq!(*seen.borrow(), vec![EventKind::Set]);
}

#[test]
fn notification_carries_the_full_story() {
    let pkg = library::library_package();
    let library = new_library(&pkg, "City Library");
    let log = record(&library);

    library
        .set(ids::library::NAME, Value::from("County Library"))
        .unwrap();

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    let note = &log[0];
    assert_eq!(*note.notifier(), library);
    assert_eq!(note.feature_id(), ids::library::NAME);
    assert_eq!(note.feature().unwrap().name, "name");
    assert_eq!(note.kind(), EventKind::Set);
    assert_eq!(*note.old_value(), Value::from("City Library"));
    assert_eq!(*note.new_value(), Value::from("County Library"));
    assert_eq!(note.position(), None);
}

#[test]
fn every_attached_adapter_hears_each_change() {
    let pkg = library::library_package();
    let library = new_library(&pkg, "lib");
    let first = record(&library);
    let second = record(&library);
    let third = record(&library);

    let employee = new_employee(&pkg, "Ada", "Lovelace");
    library
        .insert(ids::library::EMPLOYEES, 0, Value::from(employee.clone()))
        .unwrap();

    for log in [&first, &second, &third] {
        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind(), EventKind::Add);
        assert_eq!(log[0].position(), Some(0));
        assert_eq!(*log[0].new_value(), Value::from(employee.clone()));
    }
}

#[test]
fn setting_the_current_value_is_silent() {
    let pkg = library::library_package();
    let employee = new_employee(&pkg, "Ada", "Lovelace");
    let log = record(&employee);

    employee
        .set(ids::employee::FIRST_NAME, Value::from("Ada"))
        .unwrap();
    assert!(log.borrow().is_empty());
}

#[test]
fn list_events_carry_positions() {
    let pkg = library::library_package();
    let library = new_library(&pkg, "lib");
    let a = new_employee(&pkg, "Ada", "Lovelace");
    let b = new_employee(&pkg, "Grace", "Hopper");
    let log = record(&library);

    library
        .push(ids::library::EMPLOYEES, Value::from(a.clone()))
        .unwrap();
    library
        .insert(ids::library::EMPLOYEES, 0, Value::from(b.clone()))
        .unwrap();
    library.remove_at(ids::library::EMPLOYEES, 1).unwrap();

    let log = log.borrow();
    assert_eq!(log.len(), 3);

    assert_eq!(log[0].kind(), EventKind::Add);
    assert_eq!(log[0].position(), Some(0));
    assert_eq!(*log[0].new_value(), Value::from(a.clone()));

    assert_eq!(log[1].kind(), EventKind::Add);
    assert_eq!(log[1].position(), Some(0));
    assert_eq!(*log[1].new_value(), Value::from(b));

    // a slid to index 1 before being removed
    assert_eq!(log[2].kind(), EventKind::Remove);
    assert_eq!(log[2].position(), Some(1));
    assert_eq!(*log[2].old_value(), Value::from(a));
}

#[test]
fn bulk_operations_fire_one_event() {
    let pkg = library::library_package();
    let employee = new_employee(&pkg, "Ada", "Lovelace");
    let chores: Vec<Value> = (0..3)
        .map(|i| Value::from(new_task(&pkg, "chore", i)))
        .collect();
    let log = record(&employee);

    employee
        .extend(ids::employee::TASKS, chores.clone())
        .unwrap();
    employee.clear(ids::employee::TASKS).unwrap();

    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].kind(), EventKind::AddMany);
    assert_eq!(log[0].position(), Some(0));
    assert_eq!(*log[0].new_value(), Value::List(chores.clone()));
    assert_eq!(log[1].kind(), EventKind::RemoveMany);
    assert_eq!(log[1].position(), None);
    assert_eq!(*log[1].old_value(), Value::List(chores));
}

#[test]
fn detached_adapter_hears_nothing_more() {
    let pkg = library::library_package();
    let library = new_library(&pkg, "lib");

    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let adapter: AdapterRef = FnAdapter::new(move |n: &Notification| {
        sink.borrow_mut().push(n.kind())
    });

    library.attach_adapter(adapter.clone());
    library
        .set(ids::library::ADDRESS, Value::from("a"))
        .unwrap();
    library.detach_adapter(&adapter);
    library
        .set(ids::library::ADDRESS, Value::from("b"))
        .unwrap();

    assert_eq!(log.borrow().len(), 1);

    // detaching again, or detaching from an object it never observed, is fine
    library.detach_adapter(&adapter);
    new_library(&pkg, "other").detach_adapter(&adapter);
}

#[test]
fn adapter_target_follows_attachment() {
    let pkg = library::library_package();
    let library = new_library(&pkg, "lib");
    let adapter = FnAdapter::new(|_| {});

    assert!(adapter.target().is_none());

    let as_ref: AdapterRef = adapter.clone();
    library.attach_adapter(as_ref.clone());
    assert_eq!(adapter.target(), Some(library.clone()));

    library.detach_adapter(&as_ref);
    assert!(adapter.target().is_none());
}

#[test]
fn handler_may_mutate_the_object_it_observes() {
    let pkg = library::library_package();
    let library = new_library(&pkg, "lib");

    // mirror the name into the address, once
    let observed = library.clone();
    library.attach_adapter(FnAdapter::new(move |n: &Notification| {
        if n.feature_id() == ids::library::NAME {
            observed
                .set(ids::library::ADDRESS, n.new_value().clone())
                .unwrap();
        }
    }));

    library
        .set(ids::library::NAME, Value::from("Renamed"))
        .unwrap();
    assert_eq!(
        library.get(ids::library::ADDRESS).unwrap(),
        Value::from("Renamed")
    );
}
