//! Associated-data modules.
//!
//! A [`DataModule`] diffs one slice of a vnode's data bag against the
//! previous vnode and pushes the difference into the render target. The
//! diff is a symmetric key union: changed keys are written, vanished keys
//! are removed. Modules run in registration order.

use weft_core::Value;

use crate::target::{NodeRef, RenderTarget};
use crate::vnode::VData;

/// Property name the raw-markup assignment rides on.
pub const PROP_INNER_HTML: &str = "innerHTML";

/// Attributes that clear via removal when set falsy.
const BOOLEAN_ATTRS: &[&str] = &[
    "async", "autofocus", "autoplay", "checked", "controls", "defer", "disabled", "hidden",
    "loop", "multiple", "muted", "open", "readonly", "required", "reversed", "selected",
];

fn is_boolean_attr(name: &str) -> bool {
    BOOLEAN_ATTRS.contains(&name)
}

/// One create/update pair over a vnode's data bag.
pub trait DataModule {
    /// First mount: diff against an empty bag.
    fn create(&self, target: &mut dyn RenderTarget, node: NodeRef, data: &VData) {
        self.update(target, node, &VData::default(), data);
    }

    fn update(&self, target: &mut dyn RenderTarget, node: NodeRef, old: &VData, new: &VData);
}

/// Plain attributes, with boolean-attribute clearing.
pub struct AttrsModule;

impl DataModule for AttrsModule {
    fn update(&self, target: &mut dyn RenderTarget, node: NodeRef, old: &VData, new: &VData) {
        for (name, value) in &new.attrs {
            if old.attrs.get(name) != Some(value) {
                if is_boolean_attr(name) && !value.truthy() {
                    target.remove_attribute(node, name);
                } else {
                    target.set_attribute(node, name, &value.to_string());
                }
            }
        }
        for name in old.attrs.keys() {
            if !new.attrs.contains_key(name) {
                target.remove_attribute(node, name);
            }
        }
    }
}

/// Node properties. [`PROP_INNER_HTML`] routes to the raw-markup setter.
pub struct PropsModule;

impl DataModule for PropsModule {
    fn update(&self, target: &mut dyn RenderTarget, node: NodeRef, old: &VData, new: &VData) {
        for (name, value) in &new.props {
            if old.props.get(name) != Some(value) {
                if name == PROP_INNER_HTML {
                    target.set_inner_html(node, &value.to_string());
                } else {
                    target.set_property(node, name, value);
                }
            }
        }
        for name in old.props.keys() {
            if !new.props.contains_key(name) {
                target.remove_property(node, name);
            }
        }
    }
}

/// Inline style entries.
pub struct StyleModule;

impl DataModule for StyleModule {
    fn update(&self, target: &mut dyn RenderTarget, node: NodeRef, old: &VData, new: &VData) {
        for (name, value) in &new.style {
            if old.style.get(name) != Some(value) {
                target.set_style(node, name, value);
            }
        }
        for name in old.style.keys() {
            if !new.style.contains_key(name) {
                target.remove_style(node, name);
            }
        }
    }
}

/// The built-in module set, in the order the patcher registers them.
pub fn default_modules() -> Vec<Box<dyn DataModule>> {
    vec![Box::new(AttrsModule), Box::new(PropsModule), Box::new(StyleModule)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTarget;

    fn data_with_attr(name: &str, value: Value) -> VData {
        let mut data = VData::default();
        data.attrs.insert(name.to_string(), value);
        data
    }

    #[test]
    fn attrs_update_writes_changed_and_removes_vanished() {
        let mut target = MemoryTarget::new();
        let el = target.create_root("div");
        let mut old = VData::default();
        old.attrs.insert("class".into(), Value::from("a"));
        old.attrs.insert("title".into(), Value::from("t"));
        let mut new = VData::default();
        new.attrs.insert("class".into(), Value::from("b"));

        AttrsModule.create(&mut target, el, &old);
        target.ops.reset();
        AttrsModule.update(&mut target, el, &old, &new);

        assert_eq!(target.attr(el, "class"), Some("b"));
        assert_eq!(target.attr(el, "title"), None);
        assert_eq!(target.ops.attr_writes, 2);
    }

    #[test]
    fn unchanged_attr_is_not_rewritten() {
        let mut target = MemoryTarget::new();
        let el = target.create_root("div");
        let data = data_with_attr("class", Value::from("same"));
        AttrsModule.create(&mut target, el, &data);
        target.ops.reset();
        AttrsModule.update(&mut target, el, &data, &data);
        assert_eq!(target.ops.attr_writes, 0);
    }

    #[test]
    fn boolean_attr_clears_on_falsy() {
        let mut target = MemoryTarget::new();
        let el = target.create_root("input");
        let on = data_with_attr("disabled", Value::Bool(true));
        let off = data_with_attr("disabled", Value::Bool(false));

        AttrsModule.create(&mut target, el, &on);
        assert_eq!(target.attr(el, "disabled"), Some("true"));

        AttrsModule.update(&mut target, el, &on, &off);
        assert_eq!(target.attr(el, "disabled"), None);
    }

    #[test]
    fn inner_html_prop_routes_to_raw_markup() {
        let mut target = MemoryTarget::new();
        let el = target.create_root("div");
        let mut data = VData::default();
        data.props
            .insert(PROP_INNER_HTML.into(), Value::from("<b>x</b>"));
        PropsModule.create(&mut target, el, &data);
        assert_eq!(target.html_of(el), Some("<b>x</b>"));
        assert_eq!(target.prop(el, PROP_INNER_HTML), None);
    }

    #[test]
    fn style_diff_touches_changed_keys_only() {
        let mut target = MemoryTarget::new();
        let el = target.create_root("div");
        let mut old = VData::default();
        old.style.insert("color".into(), "red".into());
        old.style.insert("width".into(), "10px".into());
        let mut new = VData::default();
        new.style.insert("color".into(), "blue".into());

        StyleModule.create(&mut target, el, &old);
        StyleModule.update(&mut target, el, &old, &new);

        assert_eq!(target.style_of(el, "color"), Some("blue"));
        assert_eq!(target.style_of(el, "width"), None);
    }
}
