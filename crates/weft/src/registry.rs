//! Process-scoped registries.
//!
//! Filters, partials, component definitions, and directive handlers live
//! in one [`Registry`] shared by every instance that holds an `Rc` to it,
//! together with the template cache. The registry is populated at startup,
//! read-mostly afterwards, and cleared only through [`Registry::reset`].
//!
//! Instances layer their own local filter/partial/component stores on
//! top; local entries win on name clashes.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use weft_core::{NativeFn, Value};
use weft_dom::NodeRef;
use weft_render::DirectiveBinding;
use weft_template::TemplateCache;

use crate::component::Options;

/// Undo callback returned by a directive bind.
pub type Teardown = Box<dyn FnOnce()>;

/// Directive handler: called once per mount with the concrete node and
/// the rendered binding, returns the teardown to run at unbind.
pub type DirectiveBind = Rc<dyn Fn(NodeRef, &DirectiveBinding) -> Option<Teardown>>;

/// Shared stores passed by reference into every instance.
#[derive(Default)]
pub struct Registry {
    templates: TemplateCache,
    filters: RefCell<AHashMap<String, Value>>,
    partials: RefCell<AHashMap<String, String>>,
    components: RefCell<AHashMap<String, Options>>,
    directives: RefCell<AHashMap<String, DirectiveBind>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("templates", &self.templates.len())
            .field("filters", &self.filters.borrow().len())
            .field("partials", &self.partials.borrow().len())
            .field("components", &self.components.borrow().len())
            .field("directives", &self.directives.borrow().len())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// The shared template compile cache.
    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }

    pub fn add_filter(&self, name: impl Into<String>, filter: impl Fn(&[Value]) -> Value + 'static) {
        self.filters
            .borrow_mut()
            .insert(name.into(), Value::Function(NativeFn::new(filter)));
    }

    pub fn filter(&self, name: &str) -> Option<Value> {
        self.filters.borrow().get(name).cloned()
    }

    /// Every registered filter, for render-context assembly.
    pub fn filters(&self) -> Vec<(String, Value)> {
        self.filters
            .borrow()
            .iter()
            .map(|(name, filter)| (name.clone(), filter.clone()))
            .collect()
    }

    pub fn add_partial(&self, name: impl Into<String>, template: impl Into<String>) {
        self.partials.borrow_mut().insert(name.into(), template.into());
    }

    pub fn partial(&self, name: &str) -> Option<String> {
        self.partials.borrow().get(name).cloned()
    }

    pub fn add_component(&self, name: impl Into<String>, options: Options) {
        self.components.borrow_mut().insert(name.into(), options);
    }

    pub fn component(&self, name: &str) -> Option<Options> {
        self.components.borrow().get(name).cloned()
    }

    pub fn add_directive(&self, name: impl Into<String>, bind: DirectiveBind) {
        self.directives.borrow_mut().insert(name.into(), bind);
    }

    pub fn directive(&self, name: &str) -> Option<DirectiveBind> {
        self.directives.borrow().get(name).cloned()
    }

    /// Drop every registration and cached template. Test isolation.
    pub fn reset(&self) {
        self.templates.clear();
        self.filters.borrow_mut().clear();
        self.partials.borrow_mut().clear();
        self.components.borrow_mut().clear();
        self.directives.borrow_mut().clear();
    }
}
