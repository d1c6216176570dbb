pub mod control;
pub mod format_dialog;
pub mod settings_panel;

pub use control::{
    ChangeCallback, Container, Control, ControlKind, ControlSpec, ControlValue, ControlView,
    HeadlessContainer, HeadlessControl,
};
pub use format_dialog::{
    toggle_id, DialogEvent, DialogOutcome, DialogState, MultiSelectDialog, CONFIRM_BUTTON_ID,
};
pub use settings_panel::SettingsPanel;
