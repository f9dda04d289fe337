//! The instance: data store, watchers, computeds, and the update cycle.
//!
//! A [`Component`] owns one template and one data tree. Writes land in
//! the store immediately, are logged per keypath while a batch is open,
//! and surface as collapsed old/new transitions at the flush boundary.
//! A flush that marked the view dirty re-renders through the host
//! factory and patches the render target; one that did not recurses into
//! child instances instead, so a parent re-render supersedes the
//! children's own pending flushes.
//!
//! # Invariants
//!
//! - Watchers observe at most one transition per keypath per batch.
//! - Within a flush, a computed is re-evaluated after the keypaths it
//!   depends on have fired.
//! - Directive binds and child mounts run after the patch that placed
//!   their nodes, never while the render target is borrowed.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use ahash::{AHashMap, AHashSet};
use tracing::{debug, warn};

use weft_core::{DepsMap, Value, keypath};
use weft_dom::{Hook, Hooks, NodeRef, Patcher, RenderTarget, VNode};
use weft_reactive::{
    Change, Computed, ComputedRegistry, Defer, Emitter, Scheduler, TaskQueue, WatchCache, Watcher,
};
use weft_render::{
    DirectiveBinding, ElementOut, NodeFactory, PartialSource, RenderError, parse_style, render,
};
use weft_template::{CompileError, DIRECTIVE_KEY, Node};

use crate::registry::Registry;

/// What it takes to create an instance: template source and the initial
/// data tree. Component registrations store these for later spawning.
#[derive(Debug, Clone)]
pub struct Options {
    pub template: String,
    pub data: Value,
}

impl Options {
    pub fn new(template: impl Into<String>, data: Value) -> Options {
        Options {
            template: template.into(),
            data,
        }
    }
}

/// Directive state bound to one concrete node.
struct BoundDirectives {
    values: Vec<DirectiveBinding>,
    teardowns: Vec<crate::registry::Teardown>,
}

/// Work queued by vnode hooks during a patch and drained right after it,
/// once the render-target borrow is released.
enum PendingHook {
    Bind {
        node: NodeRef,
        directives: Rc<Vec<DirectiveBinding>>,
    },
    Rebind {
        node: NodeRef,
        directives: Rc<Vec<DirectiveBinding>>,
    },
    Teardown {
        node: NodeRef,
    },
    Mount {
        node: NodeRef,
        name: String,
        props: Vec<(String, Value)>,
    },
    Update {
        node: NodeRef,
        props: Vec<(String, Value)>,
    },
    Unmount {
        node: NodeRef,
    },
}

/// A component element waiting to become a child instance.
struct ChildSpawn {
    name: String,
    props: Vec<(String, Value)>,
}

/// One live instance.
pub struct Component {
    weak: Weak<Component>,
    registry: Rc<Registry>,
    template: Rc<Vec<Node>>,

    data: RefCell<Value>,
    emitter: Emitter,
    pending: WatchCache,
    scheduler: Rc<Scheduler>,
    defer: Rc<dyn Defer>,
    queue: Option<Rc<TaskQueue>>,

    computeds: ComputedRegistry,
    computed_watchers: RefCell<AHashMap<String, Watcher>>,
    invalidated: RefCell<Vec<String>>,

    filters: RefCell<AHashMap<String, Value>>,
    partials: RefCell<AHashMap<String, String>>,
    components: RefCell<AHashMap<String, Options>>,

    patcher: Patcher,
    target: RefCell<Option<Rc<RefCell<dyn RenderTarget>>>>,
    current: RefCell<Option<VNode>>,
    view_deps: RefCell<AHashSet<String>>,
    view_watcher: Watcher,
    dirty: Rc<Cell<bool>>,

    pending_hooks: RefCell<Vec<PendingHook>>,
    bindings: RefCell<AHashMap<NodeRef, BoundDirectives>>,
    mounted: RefCell<AHashMap<NodeRef, Rc<Component>>>,

    children: RefCell<Vec<Rc<Component>>>,
    parent: RefCell<Weak<Component>>,
    destroyed: Cell<bool>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("children", &self.children.borrow().len())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

impl Component {
    /// Instance with the default pump-on-demand task queue; callers drive
    /// deferred flushes through [`Component::tick`].
    pub fn new(options: Options, registry: Rc<Registry>) -> Result<Rc<Component>, CompileError> {
        let queue = Rc::new(TaskQueue::new());
        Component::build(
            options,
            registry,
            Rc::clone(&queue) as Rc<dyn Defer>,
            Some(queue),
        )
    }

    /// Instance deferring through a caller-supplied primitive.
    pub fn with_defer(
        options: Options,
        registry: Rc<Registry>,
        defer: Rc<dyn Defer>,
    ) -> Result<Rc<Component>, CompileError> {
        Component::build(options, registry, defer, None)
    }

    fn build(
        options: Options,
        registry: Rc<Registry>,
        defer: Rc<dyn Defer>,
        queue: Option<Rc<TaskQueue>>,
    ) -> Result<Rc<Component>, CompileError> {
        let template = registry.templates().compile(&options.template)?;
        let dirty = Rc::new(Cell::new(false));
        let flag = Rc::clone(&dirty);
        let view_watcher: Watcher = Rc::new(move |_: &Change<'_>| flag.set(true));
        Ok(Rc::new_cyclic(|weak| Component {
            weak: weak.clone(),
            registry,
            template,
            data: RefCell::new(options.data),
            emitter: Emitter::new(),
            pending: WatchCache::new(),
            scheduler: Scheduler::new(Rc::clone(&defer)),
            defer,
            queue,
            computeds: ComputedRegistry::new(),
            computed_watchers: RefCell::new(AHashMap::default()),
            invalidated: RefCell::new(Vec::new()),
            filters: RefCell::new(AHashMap::default()),
            partials: RefCell::new(AHashMap::default()),
            components: RefCell::new(AHashMap::default()),
            patcher: Patcher::new(),
            target: RefCell::new(None),
            current: RefCell::new(None),
            view_deps: RefCell::new(AHashSet::new()),
            view_watcher,
            dirty,
            pending_hooks: RefCell::new(Vec::new()),
            bindings: RefCell::new(AHashMap::default()),
            mounted: RefCell::new(AHashMap::default()),
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            destroyed: Cell::new(false),
        }))
    }

    /// Spawn an instance sharing this one's registry and defer primitive,
    /// linked as a child for flush recursion and destroy.
    pub fn create_child(
        self: &Rc<Self>,
        options: Options,
    ) -> Result<Rc<Component>, CompileError> {
        let child = Component::build(
            options,
            Rc::clone(&self.registry),
            Rc::clone(&self.defer),
            self.queue.clone(),
        )?;
        *child.parent.borrow_mut() = Rc::downgrade(self);
        self.children.borrow_mut().push(Rc::clone(&child));
        Ok(child)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    // --- data surface -----------------------------------------------------

    /// Read one keypath. Computed keypaths evaluate (or serve their
    /// cache); anything else resolves against the data tree. Reads inside
    /// a computed getter are recorded as its dependencies.
    pub fn get(&self, keypath: &str) -> Value {
        let keypath = keypath::normalize(keypath);
        self.computeds.record(&keypath);
        if self.computeds.contains(&keypath) {
            return self.read_computed(&keypath);
        }
        self.data
            .borrow()
            .get_keypath(&keypath)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    /// Write one keypath and join (or open) the current batch.
    pub fn set(self: &Rc<Self>, keypath: &str, value: Value) {
        self.update_model(vec![(keypath.to_string(), value)]);
    }

    /// Write several keypaths in one batch.
    pub fn set_many(self: &Rc<Self>, entries: impl IntoIterator<Item = (String, Value)>) {
        self.update_model(entries.into_iter().collect());
    }

    fn update_model(self: &Rc<Self>, entries: Vec<(String, Value)>) {
        if self.destroyed.get() {
            return;
        }
        for (keypath, value) in entries {
            let keypath = keypath::normalize(&keypath);
            if self.computeds.set(&keypath, &value) {
                continue;
            }
            let old = self
                .data
                .borrow()
                .get_keypath(&keypath)
                .cloned()
                .unwrap_or(Value::Undefined);
            let watched = self.emitter.has(&keypath);
            self.data.borrow_mut().set_keypath(&keypath, value.clone(), true);
            if watched {
                self.pending.record(&keypath, &old, value);
            }
        }
        if !self.pending.is_empty() {
            self.schedule_flush();
        }
    }

    /// Flush the open batch in place instead of waiting for the defer
    /// boundary; with nothing pending, re-render unconditionally.
    pub fn force_update(self: &Rc<Self>) {
        if self.destroyed.get() {
            return;
        }
        if self.pending.is_empty() {
            self.update_view();
            return;
        }
        let instance = Rc::clone(self);
        self.scheduler.flush_now(move || instance.flush());
    }

    // --- watch surface ----------------------------------------------------

    /// Watch a keypath or wildcard pattern. `sync` invokes the watcher
    /// right away with the current value.
    pub fn watch(&self, keypath: &str, watcher: Watcher, sync: bool) {
        let keypath = keypath::normalize(keypath);
        self.emitter.on(keypath.clone(), Rc::clone(&watcher));
        if sync {
            let current = self.get(&keypath);
            watcher(&Change {
                keypath: &keypath,
                new_value: &current,
                old_value: &Value::Undefined,
                captures: &[],
            });
        }
    }

    /// Watch for a single transition.
    pub fn watch_once(&self, keypath: &str, watcher: Watcher) {
        self.emitter.once(keypath::normalize(keypath), watcher);
    }

    /// Remove one watcher by identity.
    pub fn unwatch(&self, keypath: &str, watcher: &Watcher) {
        self.emitter.off(&keypath::normalize(keypath), Some(watcher));
    }

    // --- computed surface -------------------------------------------------

    /// Register a computed under a keypath. The first evaluation runs
    /// here, seeding the cache and subscribing the captured dependencies.
    pub fn add_computed(self: &Rc<Self>, keypath: &str, computed: Computed) {
        let keypath = keypath::normalize(keypath);
        self.computeds.define(keypath.clone(), computed);
        let weak = self.weak.clone();
        let invalidates = keypath.clone();
        let watcher: Watcher = Rc::new(move |_: &Change<'_>| {
            if let Some(instance) = weak.upgrade() {
                if instance.computeds.invalidate(&invalidates) {
                    instance.invalidated.borrow_mut().push(invalidates.clone());
                }
            }
        });
        self.computed_watchers
            .borrow_mut()
            .insert(keypath.clone(), watcher);
        self.read_computed(&keypath);
    }

    fn read_computed(&self, keypath: &str) -> Value {
        let Some(evaluation) = self.computeds.evaluate(keypath) else {
            return Value::Undefined;
        };
        if let Some(change) = evaluation.deps {
            let watcher = self.computed_watchers.borrow().get(keypath).cloned();
            if let Some(watcher) = watcher {
                for dep in &change.removed {
                    self.emitter.off(dep, Some(&watcher));
                }
                for dep in change.added {
                    self.emitter.on(dep, Rc::clone(&watcher));
                }
            }
        }
        evaluation.value
    }

    // --- local registries -------------------------------------------------

    /// Instance-local filter; wins over a same-named global one.
    pub fn add_filter(&self, name: impl Into<String>, filter: impl Fn(&[Value]) -> Value + 'static) {
        self.filters.borrow_mut().insert(
            name.into(),
            Value::Function(weft_core::NativeFn::new(filter)),
        );
    }

    /// Instance-local partial; wins over a same-named global one.
    pub fn add_partial(&self, name: impl Into<String>, template: impl Into<String>) {
        self.partials
            .borrow_mut()
            .insert(name.into(), template.into());
    }

    /// Instance-local component definition; wins over a global one.
    pub fn add_component(&self, name: impl Into<String>, options: Options) {
        self.components.borrow_mut().insert(name.into(), options);
    }

    fn component_options(&self, name: &str) -> Option<Options> {
        self.components
            .borrow()
            .get(name)
            .cloned()
            .or_else(|| self.registry.component(name))
    }

    // --- scheduling -------------------------------------------------------

    /// Queue a task at the defer boundary, after any pending flush.
    pub fn next_tick(&self, task: impl FnOnce() + 'static) {
        self.defer.defer(Box::new(task));
    }

    /// Pump the default task queue, running pending flushes. Returns how
    /// many tasks ran; no-op for instances built with a custom defer.
    pub fn tick(&self) -> usize {
        self.queue.as_ref().map_or(0, |queue| queue.pump())
    }

    fn schedule_flush(self: &Rc<Self>) {
        let weak = self.weak.clone();
        self.scheduler.schedule(Box::new(move || {
            if let Some(instance) = weak.upgrade() {
                instance.flush();
            }
        }));
    }

    /// One flush: collapse pending logs, fire watchers, settle computeds,
    /// then either re-render or recurse into children. Writes landed by
    /// watchers during the flush are processed before it returns.
    fn flush(self: &Rc<Self>) {
        loop {
            for keypath in self.pending.keys() {
                if let Some((old, new)) = self.pending.take(&keypath) {
                    if !old.strict_eq(&new) {
                        self.emitter.fire(&keypath, &new, &old);
                    }
                }
            }
            self.settle_computeds();
            if self.dirty.replace(false) {
                self.update_view();
            } else {
                let children: Vec<Rc<Component>> = self.children.borrow().clone();
                for child in children {
                    child.flush();
                }
            }
            if self.pending.is_empty() {
                return;
            }
            debug!("flush re-enters for writes landed by watchers");
        }
    }

    /// Re-evaluate invalidated computeds, base dependencies first, firing
    /// the ones whose value changed. Fires may invalidate further
    /// computeds; the loop runs until none are left.
    fn settle_computeds(&self) {
        loop {
            let mut pending: Vec<String> = Vec::new();
            for keypath in self.invalidated.borrow_mut().drain(..) {
                if !pending.contains(&keypath) {
                    pending.push(keypath);
                }
            }
            if pending.is_empty() {
                return;
            }
            for keypath in self.order_computeds(pending) {
                let Some(evaluation) = self.computeds.evaluate(&keypath) else {
                    continue;
                };
                if let Some(change) = evaluation.deps {
                    let watcher = self.computed_watchers.borrow().get(&keypath).cloned();
                    if let Some(watcher) = watcher {
                        for dep in &change.removed {
                            self.emitter.off(dep, Some(&watcher));
                        }
                        for dep in change.added {
                            self.emitter.on(dep, Rc::clone(&watcher));
                        }
                    }
                }
                if let Some(old) = evaluation.old {
                    if !old.strict_eq(&evaluation.value) {
                        self.emitter.fire(&keypath, &evaluation.value, &old);
                    }
                }
            }
        }
    }

    /// Order so that a computed whose dependency set names another
    /// pending computed comes after it. Falls back to list order on a
    /// dependency cycle.
    fn order_computeds(&self, mut pending: Vec<String>) -> Vec<String> {
        let mut ordered = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let pick = pending
                .iter()
                .position(|keypath| {
                    self.computeds.deps(keypath).is_none_or(|deps| {
                        !deps
                            .iter()
                            .any(|dep| dep != keypath && pending.contains(dep))
                    })
                })
                .unwrap_or(0);
            ordered.push(pending.remove(pick));
        }
        ordered
    }

    // --- view -------------------------------------------------------------

    /// First render: patch against the bare root and subscribe the view
    /// dependencies.
    pub fn mount(
        self: &Rc<Self>,
        target: Rc<RefCell<dyn RenderTarget>>,
        root: NodeRef,
    ) -> Result<(), RenderError> {
        *self.target.borrow_mut() = Some(Rc::clone(&target));
        let mut factory = HostFactory { component: self };
        let output = render(self.template.as_slice(), self.render_data(), &mut factory)?;
        let mut node = output
            .nodes
            .into_iter()
            .next()
            .unwrap_or_else(|| VNode::comment(""));
        self.update_view_deps(&output.deps);
        self.patcher.mount(&mut *target.borrow_mut(), root, &mut node);
        *self.current.borrow_mut() = Some(node);
        self.drain_hooks();
        Ok(())
    }

    fn update_view(self: &Rc<Self>) {
        let Some(target) = self.target.borrow().clone() else {
            return;
        };
        let mut factory = HostFactory { component: self };
        let output = match render(self.template.as_slice(), self.render_data(), &mut factory) {
            Ok(output) => output,
            Err(err) => {
                warn!(error = %err, "render failed, view left unchanged");
                return;
            }
        };
        let mut next = output
            .nodes
            .into_iter()
            .next()
            .unwrap_or_else(|| VNode::comment(""));
        self.update_view_deps(&output.deps);
        let Some(previous) = self.current.borrow_mut().take() else {
            return;
        };
        self.patcher
            .patch(&mut *target.borrow_mut(), previous, &mut next);
        *self.current.borrow_mut() = Some(next);
        self.drain_hooks();
    }

    /// The render context: global filters, then local filters, then the
    /// data tree, then computed values. Later entries win name clashes.
    fn render_data(&self) -> Value {
        let mut entries: Vec<(String, Value)> = self.registry.filters();
        for (name, filter) in self.filters.borrow().iter() {
            entries.push((name.clone(), filter.clone()));
        }
        {
            let data = self.data.borrow();
            if let Some(object) = data.as_object() {
                for (key, value) in object {
                    entries.push((key.clone(), value.clone()));
                }
            }
        }
        for keypath in self.computeds.keypaths() {
            let value = self.read_computed(&keypath);
            entries.push((keypath, value));
        }
        Value::object(entries)
    }

    /// Move the view watcher to the keypaths this render touched.
    fn update_view_deps(&self, deps: &DepsMap) {
        let mut current = self.view_deps.borrow_mut();
        let gone: Vec<String> = current
            .iter()
            .filter(|keypath| !deps.contains_key(*keypath))
            .cloned()
            .collect();
        for keypath in gone {
            self.emitter.off(&keypath, Some(&self.view_watcher));
            current.remove(&keypath);
        }
        for keypath in deps.keys() {
            if current.insert(keypath.clone()) {
                self.emitter.on(keypath.clone(), Rc::clone(&self.view_watcher));
            }
        }
    }

    // --- hooks queued by the patch ----------------------------------------

    fn view_hooks(&self, spawn: Option<ChildSpawn>, directives: Vec<DirectiveBinding>) -> Hooks {
        let spawn = spawn.map(Rc::new);
        let directives = (!directives.is_empty()).then(|| Rc::new(directives));
        if spawn.is_none() && directives.is_none() {
            return Hooks::default();
        }

        let weak = self.weak.clone();
        let (on_spawn, on_bind) = (spawn.clone(), directives.clone());
        let insert: Hook = Rc::new(move |node| {
            let Some(instance) = weak.upgrade() else { return };
            let mut queue = instance.pending_hooks.borrow_mut();
            if let Some(spawn) = &on_spawn {
                queue.push(PendingHook::Mount {
                    node,
                    name: spawn.name.clone(),
                    props: spawn.props.clone(),
                });
            }
            if let Some(directives) = &on_bind {
                queue.push(PendingHook::Bind {
                    node,
                    directives: Rc::clone(directives),
                });
            }
        });

        let weak = self.weak.clone();
        let (on_spawn, on_bind) = (spawn.clone(), directives.clone());
        let postpatch: Hook = Rc::new(move |node| {
            let Some(instance) = weak.upgrade() else { return };
            let mut queue = instance.pending_hooks.borrow_mut();
            if let Some(spawn) = &on_spawn {
                queue.push(PendingHook::Update {
                    node,
                    props: spawn.props.clone(),
                });
            }
            if let Some(directives) = &on_bind {
                queue.push(PendingHook::Rebind {
                    node,
                    directives: Rc::clone(directives),
                });
            }
        });

        let weak = self.weak.clone();
        let destroy: Hook = Rc::new(move |node| {
            let Some(instance) = weak.upgrade() else { return };
            let mut queue = instance.pending_hooks.borrow_mut();
            if spawn.is_some() {
                queue.push(PendingHook::Unmount { node });
            }
            if directives.is_some() {
                queue.push(PendingHook::Teardown { node });
            }
        });

        Hooks {
            prepatch: None,
            postpatch: Some(postpatch),
            insert: Some(insert),
            destroy: Some(destroy),
        }
    }

    fn drain_hooks(self: &Rc<Self>) {
        loop {
            let batch: Vec<PendingHook> = {
                let mut queue = self.pending_hooks.borrow_mut();
                queue.drain(..).collect()
            };
            if batch.is_empty() {
                return;
            }
            for entry in batch {
                match entry {
                    PendingHook::Bind { node, directives } => {
                        self.bind_directives(node, &directives);
                    }
                    PendingHook::Rebind { node, directives } => {
                        self.rebind_directives(node, &directives);
                    }
                    PendingHook::Teardown { node } => self.teardown_directives(node),
                    PendingHook::Mount { node, name, props } => {
                        self.mount_child(node, &name, props);
                    }
                    PendingHook::Update { node, props } => self.update_child(node, props),
                    PendingHook::Unmount { node } => self.unmount_child(node),
                }
            }
        }
    }

    fn bind_directives(&self, node: NodeRef, directives: &[DirectiveBinding]) {
        let mut teardowns = Vec::new();
        for directive in directives {
            let Some(bind) = self.registry.directive(&directive.name) else {
                continue;
            };
            if let Some(teardown) = bind(node, directive) {
                teardowns.push(teardown);
            }
        }
        self.bindings.borrow_mut().insert(
            node,
            BoundDirectives {
                values: directives.to_vec(),
                teardowns,
            },
        );
    }

    /// Re-bind only when a directive value actually changed since the
    /// last bind.
    fn rebind_directives(&self, node: NodeRef, directives: &[DirectiveBinding]) {
        let unchanged = self
            .bindings
            .borrow()
            .get(&node)
            .is_some_and(|bound| bound.values == directives);
        if unchanged {
            return;
        }
        self.teardown_directives(node);
        self.bind_directives(node, directives);
    }

    fn teardown_directives(&self, node: NodeRef) {
        if let Some(bound) = self.bindings.borrow_mut().remove(&node) {
            for teardown in bound.teardowns {
                teardown();
            }
        }
    }

    fn mount_child(self: &Rc<Self>, node: NodeRef, name: &str, props: Vec<(String, Value)>) {
        let Some(mut options) = self.component_options(name) else {
            warn!(name, "unknown component, placeholder left empty");
            return;
        };
        for (keypath, value) in props {
            options.data.set_keypath(&keypath, value, true);
        }
        let child = match self.create_child(options) {
            Ok(child) => child,
            Err(err) => {
                warn!(name, error = %err, "component template failed to compile");
                return;
            }
        };
        let Some(target) = self.target.borrow().clone() else {
            return;
        };
        if let Err(err) = child.mount(target, node) {
            warn!(name, error = %err, "component failed to render");
            return;
        }
        self.mounted.borrow_mut().insert(node, child);
    }

    fn update_child(self: &Rc<Self>, node: NodeRef, props: Vec<(String, Value)>) {
        let child = self.mounted.borrow().get(&node).cloned();
        if let Some(child) = child {
            child.set_many(props);
        }
    }

    fn unmount_child(self: &Rc<Self>, node: NodeRef) {
        let child = self.mounted.borrow_mut().remove(&node);
        if let Some(child) = child {
            child.teardown(false);
        }
    }

    // --- numeric conveniences ---------------------------------------------

    /// Flip a keypath to the negation of its truthiness. Returns the new
    /// value.
    pub fn toggle(self: &Rc<Self>, keypath: &str) -> bool {
        let flipped = !self.get(keypath).truthy();
        self.set(keypath, Value::from(flipped));
        flipped
    }

    /// Add `step`, writing back only while the result stays within
    /// `max`. Non-numeric current values count as zero. Returns the
    /// computed value either way.
    pub fn increase(self: &Rc<Self>, keypath: &str, step: f64, max: Option<f64>) -> f64 {
        let base = self.get(keypath).to_number();
        let next = if base.is_nan() { step } else { base + step };
        if max.is_none_or(|max| next <= max) {
            self.set(keypath, Value::from(next));
        }
        next
    }

    /// Counterpart of [`Component::increase`] with a lower bound.
    pub fn decrease(self: &Rc<Self>, keypath: &str, step: f64, min: Option<f64>) -> f64 {
        let base = self.get(keypath).to_number();
        let next = if base.is_nan() { -step } else { base - step };
        if min.is_none_or(|min| next >= min) {
            self.set(keypath, Value::from(next));
        }
        next
    }

    // --- destroy ----------------------------------------------------------

    /// Tear the instance down: children first, then the view (firing
    /// destroy hooks and directive teardowns), then every subscription.
    pub fn destroy(self: &Rc<Self>) {
        self.teardown(true);
    }

    fn teardown(self: &Rc<Self>, unmount: bool) {
        if self.destroyed.replace(true) {
            return;
        }
        let children: Vec<Rc<Component>> = self.children.borrow_mut().drain(..).collect();
        for child in children.into_iter().rev() {
            child.teardown(false);
        }
        if unmount {
            self.clear_view();
        }
        if let Some(parent) = self.parent.borrow().upgrade() {
            parent
                .children
                .borrow_mut()
                .retain(|sibling| !Rc::ptr_eq(sibling, self));
            parent
                .mounted
                .borrow_mut()
                .retain(|_, child| !Rc::ptr_eq(child, self));
        }
        self.emitter.off_all();
        self.pending.clear();
        self.invalidated.borrow_mut().clear();
        self.computeds.clear();
        self.computed_watchers.borrow_mut().clear();
        self.view_deps.borrow_mut().clear();
        let leftover: Vec<BoundDirectives> = self
            .bindings
            .borrow_mut()
            .drain()
            .map(|(_, bound)| bound)
            .collect();
        for bound in leftover {
            for teardown in bound.teardowns {
                teardown();
            }
        }
        let orphans: Vec<Rc<Component>> = self
            .mounted
            .borrow_mut()
            .drain()
            .map(|(_, child)| child)
            .collect();
        for child in orphans {
            child.teardown(false);
        }
    }

    /// Patch the mounted tree against an empty shell of itself, which
    /// removes every child node and fires destroy hooks bottom-up.
    fn clear_view(self: &Rc<Self>) {
        let Some(target) = self.target.borrow_mut().take() else {
            return;
        };
        let Some(previous) = self.current.borrow_mut().take() else {
            return;
        };
        let mut shell = VNode::element(previous.sel.clone());
        shell.key = previous.key.clone();
        shell.children = Some(Vec::new());
        self.patcher
            .patch(&mut *target.borrow_mut(), previous, &mut shell);
        self.drain_hooks();
    }
}

/// [`NodeFactory`] wired to one instance: elements carry directive
/// hooks, component tags become placeholders that spawn children, and
/// partial imports resolve local-first.
struct HostFactory<'a> {
    component: &'a Rc<Component>,
}

impl NodeFactory for HostFactory<'_> {
    fn element(&mut self, out: ElementOut) -> VNode {
        let instance = self.component;
        let mut node = if out.component {
            VNode::element("div")
        } else {
            VNode::element(out.name.clone())
        };

        let mut spawn = None;
        if out.component {
            let mut props: Vec<(String, Value)> = out.props.into_iter().collect();
            for binding in out.attributes {
                props.push((binding.name, binding.value));
            }
            spawn = Some(ChildSpawn {
                name: out.name,
                props,
            });
            node.children = Some(Vec::new());
        } else {
            node.data.props = out.props;
            for binding in out.attributes {
                if binding.name == "style" {
                    node.data.style = parse_style(&binding.value.to_string());
                } else {
                    node.data.attrs.insert(binding.name, binding.value);
                }
            }
            node.children = Some(out.children);
        }

        let mut bound = Vec::new();
        for directive in out.directives {
            if directive.name == DIRECTIVE_KEY {
                node.key = Some(directive.value.to_string());
            } else if instance.registry.directive(&directive.name).is_some() {
                bound.push(directive);
            } else {
                warn!(name = %directive.name, "no handler for directive, binding skipped");
            }
        }

        node.data.hooks = instance.view_hooks(spawn, bound);
        node
    }

    fn resolve_partial(&mut self, name: &str) -> Option<PartialSource> {
        let local = self.component.partials.borrow().get(name).cloned();
        local
            .or_else(|| self.component.registry.partial(name))
            .map(PartialSource::Text)
    }
}
