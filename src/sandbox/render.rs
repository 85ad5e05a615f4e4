//! Virtual-tree renderer with per-instance hook state.
//!
//! DESIGN
//! ======
//! A [`RenderSession`] owns the mounted instance tree of one compiled unit.
//! Every commit renders from the root. Component instances are keyed by
//! their position path plus component identity, so state survives re-renders
//! while a different component at the same position mounts fresh. Instances
//! a render no longer reaches are unmounted and their effect cleanups run.
//!
//! A commit is: render, unmount stale instances, run scheduled effects. It
//! repeats while state updates are pending, up to the re-render cap.
//!
//! Each render pass, effect, event handler and timer callback gets its own
//! [`Interp`] and therefore its own fuel budget.
//!
//! Timers registered by the unit only run from [`RenderSession::advance`],
//! which plays the unit's virtual clock forward and commits after every
//! callback that updated state.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use serde::Serialize;

use super::capabilities::{Hook, HookFrame, HookStore, PendingEffect};
use super::interp::{Interp, Limits};
use super::promise;
use super::timers::TimerQueue;
use super::value::{ElementType, Function, Object, Throw, Value};

/// Nested elements, components and child arrays allowed in one render.
pub const MAX_TREE_DEPTH: usize = 512;

/// Timer callbacks run by one [`RenderSession::advance`]. Anything still due
/// waits for the next advance.
pub const MAX_TIMER_FIRES: usize = 1000;

/// One node of the rendered tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VNode {
    Text { text: String },
    Element { tag: String, attrs: Vec<(String, String)>, handlers: Vec<Handler>, children: Vec<VNode> },
}

/// An event listener attached to a host element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handler {
    /// DOM event name, lowercase (`click`, `change`).
    pub event: String,
    /// Id to pass to [`RenderSession::dispatch`].
    pub id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no handler `{0}` in the current render")]
    UnknownHandler(String),
    #[error("{}", .0.message())]
    Thrown(Throw),
}

struct Instance {
    store: HookStore,
    seen: bool,
}

pub struct RenderSession {
    component: Function,
    limits: Limits,
    max_rerenders: usize,
    instances: IndexMap<String, Instance>,
    handlers: HashMap<String, (String, Value)>,
    tree: Vec<VNode>,
    dirty: Arc<AtomicBool>,
    renders: u64,
    timers: TimerQueue,
    depth: usize,
}

impl RenderSession {
    #[must_use]
    pub fn new(component: Function, limits: Limits, max_rerenders: usize) -> Self {
        Self {
            component,
            limits,
            max_rerenders,
            instances: IndexMap::new(),
            handlers: HashMap::new(),
            tree: Vec::new(),
            dirty: Arc::new(AtomicBool::new(false)),
            renders: 0,
            timers: TimerQueue::default(),
            depth: 0,
        }
    }

    /// Drive `timers`, the queue the unit's timer globals register on.
    #[must_use]
    pub fn with_timers(mut self, timers: TimerQueue) -> Self {
        self.timers = timers;
        self
    }

    /// First render plus post-mount effects.
    ///
    /// # Errors
    ///
    /// Whatever the component or one of its effects throws.
    pub fn mount(&mut self) -> Result<(), Throw> {
        self.commit()
    }

    /// Run the event handler registered under `id` and re-render if it
    /// updated state.
    ///
    /// # Errors
    ///
    /// `UnknownHandler` for ids not present in the latest render, `Thrown`
    /// for anything the handler, the re-render or an effect throws.
    pub fn dispatch(&mut self, id: &str, payload: &serde_json::Value) -> Result<(), DispatchError> {
        let (event, handler) =
            self.handlers.get(id).cloned().ok_or_else(|| DispatchError::UnknownHandler(id.to_owned()))?;
        self.dirty.store(false, Ordering::SeqCst);
        let mut interp = Interp::new(self.limits);
        let returned =
            interp.call(&handler, Value::Undefined, &[event_object(&event, payload)]).map_err(DispatchError::Thrown)?;
        if let Some(reason) = promise::rejection(&returned) {
            tracing::warn!(handler = id, reason = %reason.inspect(), "async event handler rejected");
        }
        if self.dirty.load(Ordering::SeqCst) {
            self.commit().map_err(DispatchError::Thrown)?;
        }
        Ok(())
    }

    /// Move the virtual clock forward by `ms` and run the timers that come
    /// due, committing after each callback that updated state. Returns how
    /// many callbacks ran.
    ///
    /// # Errors
    ///
    /// Whatever a callback, the resulting re-render or an effect throws.
    pub fn advance(&mut self, ms: f64) -> Result<usize, Throw> {
        let step = if ms.is_finite() { ms.max(0.0) } else { 0.0 };
        let until = self.timers.now() + step;
        let mut fired = 0;
        while fired < MAX_TIMER_FIRES {
            let Some(due) = self.timers.pop_due(until) else {
                self.timers.settle_clock(until);
                break;
            };
            fired += 1;
            self.dirty.store(false, Ordering::SeqCst);
            let mut interp = Interp::new(self.limits);
            interp.call(&due.callback, Value::Undefined, &due.args)?;
            if self.dirty.load(Ordering::SeqCst) {
                self.commit()?;
            }
        }
        tracing::debug!(fired, clock = self.timers.now(), pending = self.timers.pending(), "advanced timers");
        Ok(fired)
    }

    /// Timers registered and not yet cleared or fired.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Current virtual time in ms.
    #[must_use]
    pub fn clock(&self) -> f64 {
        self.timers.now()
    }

    /// Unmount every instance, running effect cleanups, and drop pending
    /// timers. Cleanup failures are logged; the session is discarded either
    /// way.
    pub fn unmount(&mut self) {
        for (_, instance) in self.instances.drain(..).rev() {
            if let Err(err) = run_cleanups(self.limits, &instance.store) {
                tracing::warn!(error = %err.describe(), "effect cleanup threw during unmount");
            }
        }
        self.handlers.clear();
        self.tree.clear();
        self.timers.clear_all();
    }

    #[must_use]
    pub fn tree(&self) -> &[VNode] {
        &self.tree
    }

    #[must_use]
    pub fn html(&self) -> String {
        to_html(&self.tree)
    }

    /// Number of completed render passes.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    fn commit(&mut self) -> Result<(), Throw> {
        for _ in 0..=self.max_rerenders {
            self.dirty.store(false, Ordering::SeqCst);
            let effects = self.render_pass()?;
            self.run_effects(effects)?;
            if !self.dirty.load(Ordering::SeqCst) {
                return Ok(());
            }
        }
        Err(Throw::error(
            "Error",
            "Too many re-renders. React limits the number of renders to prevent an infinite loop.",
        ))
    }

    fn render_pass(&mut self) -> Result<Vec<PendingEffect>, Throw> {
        for instance in self.instances.values_mut() {
            instance.seen = false;
        }
        self.handlers.clear();

        let mut interp = Interp::new(self.limits);
        let mut effects = Vec::new();
        let mut tree = Vec::new();
        let root = self.component.clone();
        self.render_component(&mut interp, &root, Object::new(), "0", &mut tree, &mut effects)?;

        self.tree = tree;
        self.renders += 1;
        self.unmount_stale()?;
        Ok(effects)
    }

    fn render_component(
        &mut self,
        interp: &mut Interp,
        component: &Function,
        props: Object,
        path: &str,
        out: &mut Vec<VNode>,
        effects: &mut Vec<PendingEffect>,
    ) -> Result<(), Throw> {
        let id = format!("{path}#{:x}", component.id());
        let (store, mounting) = match self.instances.get_mut(&id) {
            Some(instance) => {
                instance.seen = true;
                (instance.store.clone(), false)
            }
            None => {
                let store = HookStore::default();
                self.instances.insert(id.clone(), Instance { store: store.clone(), seen: true });
                (store, true)
            }
        };

        let outer = interp.frame.replace(HookFrame::new(store.clone(), mounting, self.dirty.clone()));
        let result = interp.call(&Value::Function(component.clone()), Value::Undefined, &[Value::Object(props)]);
        let frame = std::mem::replace(&mut interp.frame, outer);
        let output = result?;
        let Some(frame) = frame else { return Ok(()) };

        if frame.cursor < store.lock().len() {
            return Err(Throw::error(
                "Error",
                "Rendered fewer hooks than expected. This may be caused by an accidental early return statement.",
            ));
        }
        effects.extend(frame.effects);
        self.render_node(interp, &output, &id, out, effects)
    }

    fn render_node(
        &mut self,
        interp: &mut Interp,
        value: &Value,
        path: &str,
        out: &mut Vec<VNode>,
        effects: &mut Vec<PendingEffect>,
    ) -> Result<(), Throw> {
        if self.depth >= MAX_TREE_DEPTH {
            return Err(Throw::range_error("Rendered tree is nested too deeply"));
        }
        self.depth += 1;
        let result = self.render_value(interp, value, path, out, effects);
        self.depth -= 1;
        result
    }

    fn render_value(
        &mut self,
        interp: &mut Interp,
        value: &Value,
        path: &str,
        out: &mut Vec<VNode>,
        effects: &mut Vec<PendingEffect>,
    ) -> Result<(), Throw> {
        match value {
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Function(_) => Ok(()),
            Value::Number(_) | Value::Str(_) => {
                out.push(VNode::Text { text: value.to_js_string() });
                Ok(())
            }
            Value::Array(items) => {
                for (i, child) in items.snapshot().iter().enumerate() {
                    let child_path = match child {
                        Value::Element(el) if el.key.is_some() => {
                            format!("{path}.k:{}", el.key.as_deref().unwrap_or_default())
                        }
                        _ => format!("{path}.{i}"),
                    };
                    self.render_node(interp, child, &child_path, out, effects)?;
                }
                Ok(())
            }
            Value::Element(el) => match &el.kind {
                ElementType::Host(tag) => self.render_host(interp, tag, &el.props, path, out, effects),
                ElementType::Component(f) => {
                    let props = Object::from_entries(el.props.entries());
                    self.render_component(interp, f, props, path, out, effects)
                }
            },
            Value::Object(_) => Err(Throw::error(
                "Error",
                format!(
                    "Objects are not valid as a React child (found: {}). If you meant to render a collection of children, use an array instead.",
                    value.inspect()
                ),
            )),
        }
    }

    fn render_host(
        &mut self,
        interp: &mut Interp,
        tag: &str,
        props: &Object,
        path: &str,
        out: &mut Vec<VNode>,
        effects: &mut Vec<PendingEffect>,
    ) -> Result<(), Throw> {
        let mut attrs = Vec::new();
        let mut handlers = Vec::new();
        let mut children = Value::Undefined;

        for (name, value) in props.entries() {
            match name.as_str() {
                "children" => {
                    children = value;
                    continue;
                }
                "key" | "ref" | "dangerouslySetInnerHTML" => continue,
                _ => {}
            }
            if let Some(event) = event_name(&name) {
                if matches!(value, Value::Function(_)) {
                    let id = format!("h{}", self.handlers.len());
                    self.handlers.insert(id.clone(), (event.clone(), value));
                    handlers.push(Handler { event, id });
                }
                continue;
            }
            let attr = match name.as_str() {
                "className" => "class".to_owned(),
                "htmlFor" => "for".to_owned(),
                other => other.to_owned(),
            };
            match value {
                Value::Bool(true) => attrs.push((attr, String::new())),
                Value::Bool(false) | Value::Null | Value::Undefined | Value::Function(_) => {}
                Value::Object(style) if name == "style" => attrs.push((attr, style_text(&style))),
                other => attrs.push((attr, other.to_js_string())),
            }
        }

        let mut rendered = Vec::new();
        let child_path = format!("{path}.{tag}");
        self.render_node(interp, &children, &child_path, &mut rendered, effects)?;
        out.push(VNode::Element { tag: tag.to_owned(), attrs, handlers, children: rendered });
        Ok(())
    }

    fn unmount_stale(&mut self) -> Result<(), Throw> {
        let stale: Vec<String> =
            self.instances.iter().filter(|(_, instance)| !instance.seen).map(|(id, _)| id.clone()).collect();
        let mut first_error = None;
        for id in stale {
            if let Some(instance) = self.instances.shift_remove(&id) {
                if let Err(err) = run_cleanups(self.limits, &instance.store) {
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn run_effects(&self, effects: Vec<PendingEffect>) -> Result<(), Throw> {
        for effect in effects {
            let previous = match effect.store.lock().get_mut(effect.index) {
                Some(Hook::Effect { cleanup, .. }) => std::mem::take(cleanup),
                _ => Value::Undefined,
            };
            let mut interp = Interp::new(self.limits);
            if matches!(previous, Value::Function(_)) {
                interp.call(&previous, Value::Undefined, &[])?;
            }
            let cleanup = interp.call(&effect.create, Value::Undefined, &[])?;
            if matches!(cleanup, Value::Function(_)) {
                if let Some(Hook::Effect { cleanup: slot, .. }) = effect.store.lock().get_mut(effect.index) {
                    *slot = cleanup;
                }
            }
        }
        Ok(())
    }
}

fn run_cleanups(limits: Limits, store: &HookStore) -> Result<(), Throw> {
    let cleanups: Vec<Value> = store
        .lock()
        .iter_mut()
        .filter_map(|hook| match hook {
            Hook::Effect { cleanup, .. } => Some(std::mem::take(cleanup)),
            _ => None,
        })
        .filter(|cleanup| matches!(cleanup, Value::Function(_)))
        .collect();
    let mut interp = Interp::new(limits);
    for cleanup in cleanups {
        interp.call(&cleanup, Value::Undefined, &[])?;
    }
    Ok(())
}

/// `onClick` -> `click`.
fn event_name(prop: &str) -> Option<String> {
    let rest = prop.strip_prefix("on")?;
    rest.chars().next().filter(char::is_ascii_uppercase)?;
    Some(rest.to_ascii_lowercase())
}

fn event_object(event: &str, payload: &serde_json::Value) -> Value {
    let object = match Value::from_json(payload) {
        Value::Object(object) => object,
        _ => Object::new(),
    };
    let target = match object.get("target") {
        Some(Value::Object(target)) => target,
        _ => {
            let target = Object::new();
            for key in ["value", "checked", "name"] {
                if let Some(value) = object.get(key) {
                    target.set(key, value);
                }
            }
            target
        }
    };
    object.set("target", Value::Object(target.clone()));
    object.set("currentTarget", Value::Object(target));
    if !object.has("type") {
        object.set("type", Value::from(event));
    }
    let noop = Value::Function(Function::native("noop", |_, _, _| Ok(Value::Undefined)));
    object.set("preventDefault", noop.clone());
    object.set("stopPropagation", noop);
    Value::Object(object)
}

const UNITLESS: [&str; 10] =
    ["opacity", "zIndex", "fontWeight", "flex", "flexGrow", "flexShrink", "lineHeight", "order", "zoom", "gridRow"];

fn style_text(style: &Object) -> String {
    let mut css = String::new();
    for (name, value) in style.entries() {
        let text = match &value {
            Value::Number(n) if !UNITLESS.contains(&name.as_str()) && *n != 0.0 => format!("{}px", value.to_js_string()),
            Value::Number(_) | Value::Str(_) => value.to_js_string(),
            _ => continue,
        };
        if !css.is_empty() {
            css.push_str("; ");
        }
        let _ = write!(css, "{}: {text}", kebab_case(&name));
    }
    css
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

const VOID_ELEMENTS: [&str; 8] = ["br", "hr", "img", "input", "meta", "link", "area", "source"];

/// Serialise a rendered tree to HTML. Handlers appear as
/// `data-on-<event>="<id>"` attributes.
#[must_use]
pub fn to_html(nodes: &[VNode]) -> String {
    let mut html = String::new();
    for node in nodes {
        write_node(&mut html, node);
    }
    html
}

fn write_node(html: &mut String, node: &VNode) {
    match node {
        VNode::Text { text } => html.push_str(&escape(text)),
        VNode::Element { tag, attrs, handlers, children } => {
            html.push('<');
            html.push_str(tag);
            for (name, value) in attrs {
                if value.is_empty() {
                    let _ = write!(html, " {name}");
                } else {
                    let _ = write!(html, " {name}=\"{}\"", escape(value));
                }
            }
            for handler in handlers {
                let _ = write!(html, " data-on-{}=\"{}\"", handler.event, handler.id);
            }
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                html.push_str(" />");
                return;
            }
            html.push('>');
            for child in children {
                write_node(html, child);
            }
            let _ = write!(html, "</{tag}>");
        }
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
