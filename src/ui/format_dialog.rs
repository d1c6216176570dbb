use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;
use crate::ui::control::{Container, ControlKind, ControlSpec, ControlValue};
use crate::utils::error_handling::{PluginResult, PluginError};

/// Id of the confirm button rendered by the dialog
pub const CONFIRM_BUTTON_ID: &str = "confirm";

/// Control id of the toggle for the label at `index`
pub fn toggle_id(index: usize) -> String {
    format!("format-{}", index)
}

/// How a dialog was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogOutcome {
    Confirmed,
    Dismissed,
}

/// Lifecycle of a single dialog instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    /// Constructed, not yet shown
    Ready,
    Open,
    Closed(DialogOutcome),
}

/// User input posted by rendered controls
#[derive(Debug, Clone, PartialEq)]
pub enum DialogEvent {
    Toggle { label: String, selected: bool },
    Confirm,
    Dismiss,
}

pub type ConfirmCallback = Box<dyn FnOnce(String) + Send>;

/// Transient multi-select over the known format labels.
///
/// The accumulator only changes through toggle events: turning a label on appends it,
/// turning it off removes its first occurrence. Duplicates are kept, so a label switched
/// on twice must be switched off twice to disappear. On confirm the accumulator is
/// handed to the callback joined with `,` (labels are not escaped).
pub struct MultiSelectDialog<C: Container> {
    id: Uuid,
    container: C,
    known_labels: Vec<String>,
    default_state: bool,
    selection: Vec<String>,
    state: DialogState,
    on_confirm: Option<ConfirmCallback>,
    sender: Option<UnboundedSender<DialogEvent>>,
    events: UnboundedReceiver<DialogEvent>,
}

impl<C: Container> MultiSelectDialog<C> {
    pub fn new<F>(container: C, known_labels: Vec<String>, on_confirm: F) -> Self
    where
        F: FnOnce(String) + Send + 'static,
    {
        let (sender, events) = mpsc::unbounded_channel();
        MultiSelectDialog {
            id: Uuid::new_v4(),
            container,
            known_labels,
            default_state: false,
            selection: Vec::new(),
            state: DialogState::Ready,
            on_confirm: Some(Box::new(on_confirm)),
            sender: Some(sender),
            events,
        }
    }

    /// Initial value of every toggle when the dialog opens.
    ///
    /// With `true` the accumulator starts with every known label, so the result always
    /// matches the toggles the host shows.
    pub fn with_default_state(mut self, selected: bool) -> Self {
        self.default_state = selected;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == DialogState::Open
    }

    pub fn known_labels(&self) -> &[String] {
        &self.known_labels
    }

    pub fn default_state(&self) -> bool {
        self.default_state
    }

    /// Current accumulator content
    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    /// Host access, e.g. to deliver user input to the rendered controls
    pub fn container_mut(&mut self) -> &mut C {
        &mut self.container
    }

    /// Render one toggle per known label plus the confirm button
    pub fn open(&mut self) -> PluginResult<()> {
        if self.state != DialogState::Ready {
            return Err(PluginError::dialog(&format!(
                "Dialog {} cannot be opened from {:?}",
                self.id, self.state
            )));
        }
        let sender = self
            .sender
            .clone()
            .ok_or_else(|| PluginError::dialog("Dialog event channel is closed"))?;

        self.container.empty();
        self.container.add_heading("Confirm");

        for (index, label) in self.known_labels.iter().enumerate() {
            let toggle = self
                .container
                .add_control(ControlKind::Toggle, ControlSpec::new(&toggle_id(index), label));
            toggle.set_value(ControlValue::Bool(self.default_state));

            let sender = sender.clone();
            let label = label.clone();
            toggle.on_change(Box::new(move |value: &ControlValue| {
                if let ControlValue::Bool(selected) = value {
                    let _ = sender.send(DialogEvent::Toggle {
                        label: label.clone(),
                        selected: *selected,
                    });
                }
            }));
        }

        let button = self
            .container
            .add_control(ControlKind::Button, ControlSpec::new(CONFIRM_BUTTON_ID, "Confirm"));
        button.on_change(Box::new(move |_: &ControlValue| {
            let _ = sender.send(DialogEvent::Confirm);
        }));

        self.selection = if self.default_state {
            self.known_labels.clone()
        } else {
            Vec::new()
        };
        self.state = DialogState::Open;
        log::debug!("Opened format dialog {} with {} labels", self.id, self.known_labels.len());
        Ok(())
    }

    /// Apply a toggle change. Returns false when ignored because the dialog is not open.
    pub fn on_toggle(&mut self, label: &str, selected: bool) -> bool {
        if !self.is_open() {
            log::debug!("Ignoring toggle of '{}' on dialog {} in {:?}", label, self.id, self.state);
            return false;
        }

        if selected {
            self.selection.push(label.to_string());
        } else if let Some(position) = self.selection.iter().position(|l| l == label) {
            self.selection.remove(position);
        }
        true
    }

    /// Close the dialog and hand the joined selection to the confirm callback
    pub fn confirm(&mut self) -> PluginResult<()> {
        self.ensure_open("confirm")?;

        let result = self.selection.join(",");
        let on_confirm = self.on_confirm.take();
        self.finish(DialogOutcome::Confirmed);

        log::info!("Format dialog {} confirmed: [{}]", self.id, result);
        if let Some(on_confirm) = on_confirm {
            on_confirm(result);
        }
        Ok(())
    }

    /// Close the dialog without reporting a selection
    pub fn close(&mut self) -> PluginResult<()> {
        self.ensure_open("close")?;
        self.finish(DialogOutcome::Dismissed);
        log::info!("Format dialog {} dismissed", self.id);
        Ok(())
    }

    /// Apply every event posted by the rendered controls, in order.
    ///
    /// Events arriving after the dialog closed are dropped. Returns the number applied.
    pub fn process_events(&mut self) -> PluginResult<usize> {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            if !self.is_open() {
                log::debug!("Dropping {:?} for closed dialog {}", event, self.id);
                continue;
            }

            match event {
                DialogEvent::Toggle { label, selected } => {
                    self.on_toggle(&label, selected);
                }
                DialogEvent::Confirm => self.confirm()?,
                DialogEvent::Dismiss => self.close()?,
            }
            applied += 1;
        }
        Ok(applied)
    }

    /// Sender for hosts that deliver input outside the rendered controls, e.g. an Esc key
    pub fn event_sender(&self) -> Option<UnboundedSender<DialogEvent>> {
        self.sender.clone()
    }

    fn ensure_open(&self, action: &str) -> PluginResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(PluginError::dialog(&format!(
                "Cannot {} dialog {} in {:?}",
                action, self.id, self.state
            )))
        }
    }

    fn finish(&mut self, outcome: DialogOutcome) {
        self.state = DialogState::Closed(outcome);
        self.container.empty();
        self.selection.clear();
        self.on_confirm = None;
        self.sender = None;
    }
}
