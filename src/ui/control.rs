use serde::Serialize;
use std::fmt;
use crate::utils::error_handling::{PluginResult, PluginError};

/// Kinds of input the host is asked to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Toggle,
    Text,
    Number,
    Button,
}

/// Value carried by a control and by its change events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControlValue {
    Bool(bool),
    Text(String),
    Pressed,
}

impl ControlValue {
    fn accepted_by(&self, kind: ControlKind) -> bool {
        matches!(
            (kind, self),
            (ControlKind::Toggle, ControlValue::Bool(_))
                | (ControlKind::Text, ControlValue::Text(_))
                | (ControlKind::Number, ControlValue::Text(_))
                | (ControlKind::Button, ControlValue::Pressed)
        )
    }
}

pub type ChangeCallback = Box<dyn FnMut(&ControlValue) + Send>;

/// Description of a control to render
#[derive(Debug, Clone, Default)]
pub struct ControlSpec {
    pub id: String,
    pub name: String,
    pub description: String,
    pub placeholder: Option<String>,
}

impl ControlSpec {
    pub fn new(id: &str, name: &str) -> Self {
        ControlSpec {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }
}

/// A single rendered input owned by the host
pub trait Control {
    fn set_value(&mut self, value: ControlValue);
    fn value(&self) -> ControlValue;
    /// Register a callback fired on every user change
    fn on_change(&mut self, callback: ChangeCallback);
    fn set_disabled(&mut self, disabled: bool);
}

/// A surface the host renders controls into
pub trait Container {
    /// Remove every heading and control, dropping their callbacks
    fn empty(&mut self);
    fn add_heading(&mut self, text: &str);
    fn add_control(&mut self, kind: ControlKind, spec: ControlSpec) -> &mut dyn Control;
}

/// In-memory control used by [`HeadlessContainer`]
pub struct HeadlessControl {
    kind: ControlKind,
    spec: ControlSpec,
    value: ControlValue,
    disabled: bool,
    callbacks: Vec<ChangeCallback>,
}

impl HeadlessControl {
    fn new(kind: ControlKind, spec: ControlSpec) -> Self {
        let value = match kind {
            ControlKind::Toggle => ControlValue::Bool(false),
            ControlKind::Text | ControlKind::Number => ControlValue::Text(String::new()),
            ControlKind::Button => ControlValue::Pressed,
        };
        HeadlessControl {
            kind,
            spec,
            value,
            disabled: false,
            callbacks: Vec::new(),
        }
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn description(&self) -> &str {
        &self.spec.description
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn current_value(&self) -> &ControlValue {
        &self.value
    }
}

impl fmt::Debug for HeadlessControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessControl")
            .field("kind", &self.kind)
            .field("id", &self.spec.id)
            .field("value", &self.value)
            .field("disabled", &self.disabled)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl Control for HeadlessControl {
    fn set_value(&mut self, value: ControlValue) {
        self.value = value;
    }

    fn value(&self) -> ControlValue {
        self.value.clone()
    }

    fn on_change(&mut self, callback: ChangeCallback) {
        self.callbacks.push(callback);
    }

    fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }
}

/// Serializable view of one rendered control
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlView {
    pub kind: ControlKind,
    pub id: String,
    pub name: String,
    pub value: ControlValue,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Heading(String),
    Control(usize),
}

/// Container that keeps everything in memory and lets callers fire user events
#[derive(Debug, Default)]
pub struct HeadlessContainer {
    entries: Vec<Entry>,
    controls: Vec<HeadlessControl>,
}

impl HeadlessContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn control(&self, id: &str) -> Option<&HeadlessControl> {
        self.controls.iter().find(|c| c.id() == id)
    }

    pub fn has_control(&self, id: &str) -> bool {
        self.control(id).is_some()
    }

    /// Control ids in render order
    pub fn control_ids(&self) -> Vec<String> {
        self.controls.iter().map(|c| c.id().to_string()).collect()
    }

    pub fn headings(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Heading(text) => Some(text.clone()),
                Entry::Control(_) => None,
            })
            .collect()
    }

    pub fn views(&self) -> Vec<ControlView> {
        self.controls
            .iter()
            .map(|c| ControlView {
                kind: c.kind,
                id: c.spec.id.clone(),
                name: c.spec.name.clone(),
                value: c.value.clone(),
                disabled: c.disabled,
            })
            .collect()
    }

    /// Simulate a user edit: store the value and fire the control's callbacks
    pub fn change(&mut self, id: &str, value: ControlValue) -> PluginResult<()> {
        let control = self
            .controls
            .iter_mut()
            .find(|c| c.spec.id == id)
            .ok_or_else(|| PluginError::ui(&format!("No control with id '{}'", id)))?;

        if control.disabled {
            return Err(PluginError::ui(&format!("Control '{}' is disabled", id)));
        }
        if !value.accepted_by(control.kind) {
            return Err(PluginError::ui(&format!(
                "Control '{}' is a {:?} and cannot take {:?}",
                id, control.kind, value
            )));
        }

        control.value = value.clone();
        for callback in control.callbacks.iter_mut() {
            callback(&value);
        }
        Ok(())
    }

    /// Simulate a button click
    pub fn press(&mut self, id: &str) -> PluginResult<()> {
        self.change(id, ControlValue::Pressed)
    }
}

impl Container for HeadlessContainer {
    fn empty(&mut self) {
        self.entries.clear();
        self.controls.clear();
    }

    fn add_heading(&mut self, text: &str) {
        self.entries.push(Entry::Heading(text.to_string()));
    }

    fn add_control(&mut self, kind: ControlKind, spec: ControlSpec) -> &mut dyn Control {
        let index = self.controls.len();
        self.controls.push(HeadlessControl::new(kind, spec));
        self.entries.push(Entry::Control(index));
        &mut self.controls[index]
    }
}
