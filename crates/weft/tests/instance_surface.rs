//! Instance surface: the watch/computed registration API, filters and
//! partials, directive binding, and the numeric conveniences.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use weft::{
    Change, Component, Computed, DirectiveBinding, MemoryTarget, NodeRef, Options, Registry,
    RenderTarget, Value, Watcher,
};

fn data(fixture: serde_json::Value) -> Value {
    serde_json::from_value(fixture).unwrap()
}

fn mount(component: &Rc<Component>) -> (Rc<RefCell<MemoryTarget>>, NodeRef) {
    let target = Rc::new(RefCell::new(MemoryTarget::new()));
    let root = target.borrow_mut().create_root("div");
    component
        .mount(Rc::clone(&target) as Rc<RefCell<dyn RenderTarget>>, root)
        .unwrap();
    (target, root)
}

fn view(
    template: &str,
    fixture: serde_json::Value,
) -> (Rc<Component>, Rc<RefCell<MemoryTarget>>, NodeRef) {
    view_with(Rc::new(Registry::new()), template, fixture)
}

fn view_with(
    registry: Rc<Registry>,
    template: &str,
    fixture: serde_json::Value,
) -> (Rc<Component>, Rc<RefCell<MemoryTarget>>, NodeRef) {
    let component = Component::new(Options::new(template, data(fixture)), registry).unwrap();
    let (target, root) = mount(&component);
    (component, target, root)
}

fn recorder() -> (Rc<RefCell<Vec<String>>>, Watcher) {
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    let sink = Rc::clone(&log);
    let watcher: Watcher = Rc::new(move |change: &Change<'_>| {
        sink.borrow_mut().push(format!(
            "{}:{}<-{}",
            change.keypath, change.new_value, change.old_value
        ));
    });
    (log, watcher)
}

#[test]
fn sync_watch_fires_immediately_with_the_current_value() {
    let (component, _target, _root) = view("<div>{{name}}</div>", json!({ "name": "weft" }));
    let (log, watcher) = recorder();
    component.watch("name", watcher, true);
    assert_eq!(log.borrow().as_slice(), ["name:weft<-"]);
}

#[test]
fn watch_once_observes_a_single_transition() {
    let (component, _target, _root) = view("<div>{{n}}</div>", json!({ "n": 1 }));
    let (log, watcher) = recorder();
    component.watch_once("n", watcher);

    component.set("n", Value::from(2.0));
    component.tick();
    component.set("n", Value::from(3.0));
    component.tick();

    assert_eq!(log.borrow().as_slice(), ["n:2<-1"]);
}

#[test]
fn unwatch_removes_by_identity() {
    let (component, _target, _root) = view("<div>{{n}}</div>", json!({ "n": 1 }));
    let (log, watcher) = recorder();
    component.watch("n", Rc::clone(&watcher), false);

    component.set("n", Value::from(2.0));
    component.tick();
    component.unwatch("n", &watcher);
    component.set("n", Value::from(3.0));
    component.tick();

    assert_eq!(log.borrow().as_slice(), ["n:2<-1"]);
}

#[test]
fn wildcard_watchers_capture_segments() {
    let (component, _target, _root) = view("<div></div>", json!({ "user": { "name": "a" } }));
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    let sink = Rc::clone(&log);
    component.watch(
        "user.*",
        Rc::new(move |change: &Change<'_>| {
            sink.borrow_mut()
                .push(format!("{}={}", change.captures.join(","), change.new_value));
        }),
        false,
    );

    component.set("user.name", Value::from("b"));
    component.tick();
    assert_eq!(log.borrow().as_slice(), ["name=b"]);
}

#[test]
fn computed_reevaluates_after_its_deps_fire() {
    let registry = Rc::new(Registry::new());
    let component = Component::new(
        Options::new("<div>{{total}}</div>", data(json!({ "a": 1, "b": 2 }))),
        registry,
    )
    .unwrap();
    let weak = Rc::downgrade(&component);
    component.add_computed(
        "total",
        Computed::new(move || {
            let instance = weak.upgrade().unwrap();
            Value::from(instance.get("a").to_number() + instance.get("b").to_number())
        }),
    );
    let (target, root) = mount(&component);
    assert_eq!(target.borrow().markup(root), "<div>3</div>");

    let (log, watcher) = recorder();
    component.watch("total", watcher, false);
    component.set("a", Value::from(5.0));
    component.tick();

    assert_eq!(log.borrow().as_slice(), ["total:7<-3"]);
    assert_eq!(target.borrow().markup(root), "<div>7</div>");
}

#[test]
fn computed_chain_settles_base_dependencies_first() {
    let registry = Rc::new(Registry::new());
    let component = Component::new(
        Options::new("<div>{{double}}</div>", data(json!({ "n": 2 }))),
        registry,
    )
    .unwrap();
    let weak = Rc::downgrade(&component);
    component.add_computed(
        "total",
        Computed::new(move || {
            let instance = weak.upgrade().unwrap();
            Value::from(instance.get("n").to_number() * 2.0)
        }),
    );
    let weak = Rc::downgrade(&component);
    component.add_computed(
        "double",
        Computed::new(move || {
            let instance = weak.upgrade().unwrap();
            Value::from(instance.get("n").to_number() * 2.0 + instance.get("total").to_number())
        }),
    );
    let (target, root) = mount(&component);
    assert_eq!(target.borrow().markup(root), "<div>8</div>");

    let (log, watcher) = recorder();
    component.watch("total", Rc::clone(&watcher), false);
    component.watch("double", watcher, false);
    component.set("n", Value::from(3.0));
    component.tick();

    assert_eq!(log.borrow().as_slice(), ["total:6<-4", "double:12<-8"]);
    assert_eq!(target.borrow().markup(root), "<div>12</div>");
}

#[test]
fn computed_setter_routes_writes() {
    let registry = Rc::new(Registry::new());
    let component = Component::new(
        Options::new("<div>{{full}}</div>", data(json!({ "first": "a", "last": "b" }))),
        registry,
    )
    .unwrap();
    let getter = Rc::downgrade(&component);
    let setter = Rc::downgrade(&component);
    component.add_computed(
        "full",
        Computed::new(move || {
            let instance = getter.upgrade().unwrap();
            Value::from(format!("{} {}", instance.get("first"), instance.get("last")))
        })
        .setter(move |value| {
            let instance = setter.upgrade().unwrap();
            let text = value.to_string();
            let (first, last) = text.split_once(' ').unwrap_or((text.as_str(), ""));
            instance.set("first", Value::from(first));
            instance.set("last", Value::from(last));
        }),
    );
    let (target, root) = mount(&component);
    assert_eq!(target.borrow().markup(root), "<div>a b</div>");

    component.set("full", Value::from("x y"));
    component.tick();

    assert_eq!(component.get("first"), Value::from("x"));
    assert_eq!(component.get("last"), Value::from("y"));
    assert_eq!(target.borrow().markup(root), "<div>x y</div>");
}

#[test]
fn global_filters_apply_and_local_ones_win() {
    let registry = Rc::new(Registry::new());
    registry.add_filter("shout", |args| {
        Value::from(format!(
            "{}!",
            args.first().map(|v| v.to_string()).unwrap_or_default()
        ))
    });
    let (component, target, root) = view_with(
        Rc::clone(&registry),
        "<div>{{shout(name)}}</div>",
        json!({ "name": "weft" }),
    );
    assert_eq!(target.borrow().markup(root), "<div>weft!</div>");

    component.add_filter("shout", |args| {
        Value::from(format!(
            "{}?",
            args.first().map(|v| v.to_string()).unwrap_or_default()
        ))
    });
    component.force_update();
    assert_eq!(target.borrow().markup(root), "<div>weft?</div>");
}

#[test]
fn partials_resolve_local_first() {
    let registry = Rc::new(Registry::new());
    registry.add_partial("badge", "<b>global</b>");
    let (component, target, root) = view_with(
        Rc::clone(&registry),
        "<div>{{>badge}}</div>",
        json!({ "name": "weft" }),
    );
    assert_eq!(target.borrow().markup(root), "<div><b>global</b></div>");

    component.add_partial("badge", "<b>{{name}}</b>");
    component.force_update();
    assert_eq!(target.borrow().markup(root), "<div><b>weft</b></div>");
}

#[test]
fn directives_bind_once_and_tear_down_on_removal() {
    let registry = Rc::new(Registry::new());
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    let events = Rc::clone(&log);
    registry.add_directive(
        "event",
        Rc::new(move |_node: NodeRef, binding: &DirectiveBinding| {
            events
                .borrow_mut()
                .push(format!("bind:{}", binding.modifier.clone().unwrap_or_default()));
            let undo = Rc::clone(&events);
            Some(Box::new(move || undo.borrow_mut().push("unbind".to_string())))
        }),
    );
    let (component, target, root) = view_with(
        registry,
        r#"<div>{{n}}{{#if show}}<span on-click="go"></span>{{/if}}</div>"#,
        json!({ "n": 1, "show": true }),
    );
    assert_eq!(log.borrow().as_slice(), ["bind:click"]);

    // A re-render with unchanged directive values does not re-bind.
    component.set("n", Value::from(2.0));
    component.tick();
    assert_eq!(log.borrow().as_slice(), ["bind:click"]);

    component.set("show", Value::from(false));
    component.tick();
    assert_eq!(log.borrow().as_slice(), ["bind:click", "unbind"]);
    assert_eq!(target.borrow().markup(root), "<div>2</div>");
}

#[test]
fn toggle_flips_truthiness() {
    let (component, _target, _root) = view("<div></div>", json!({ "on": false }));
    assert!(component.toggle("on"));
    assert_eq!(component.get("on"), Value::from(true));
    assert!(!component.toggle("on"));
    assert_eq!(component.get("on"), Value::from(false));
}

#[test]
fn increase_and_decrease_respect_bounds() {
    let (component, _target, _root) = view("<div></div>", json!({ "n": 1 }));
    assert_eq!(component.increase("n", 2.0, None), 3.0);
    assert_eq!(component.get("n"), Value::from(3.0));

    // Out of bound: the value is computed but not written back.
    assert_eq!(component.increase("n", 10.0, Some(5.0)), 13.0);
    assert_eq!(component.get("n"), Value::from(3.0));

    assert_eq!(component.decrease("n", 1.0, Some(0.0)), 2.0);
    assert_eq!(component.get("n"), Value::from(2.0));

    // A missing keypath counts as zero.
    assert_eq!(component.increase("fresh", 1.0, None), 1.0);
    assert_eq!(component.get("fresh"), Value::from(1.0));
}

#[test]
fn destroy_makes_the_instance_inert() {
    let (component, target, root) = view("<div>{{name}}</div>", json!({ "name": "weft" }));
    let (log, watcher) = recorder();
    component.watch("name", watcher, false);

    component.destroy();
    assert!(component.is_destroyed());
    assert_eq!(target.borrow().markup(root), "<div></div>");

    component.set("name", Value::from("after"));
    assert_eq!(component.tick(), 0);
    assert!(log.borrow().is_empty());
    assert_eq!(component.get("name"), Value::from("weft"));
}
