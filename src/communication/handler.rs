use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use crate::communication::host_persistence::HostChannelPersistence;
use crate::communication::types::{Request, Response};
use crate::config::{SettingField, SettingValue};
use crate::ui::{toggle_id, ControlValue, HeadlessContainer, MultiSelectDialog, CONFIRM_BUTTON_ID};
use crate::utils::error_handling::{PluginResult, PluginError};
use crate::MovieManager;

/// Routes protocol requests to the plugin
pub struct MessageHandler {
    outbox: UnboundedSender<Response>,
    plugin: Option<MovieManager>,
    dialog: Option<MultiSelectDialog<HeadlessContainer>>,
    confirmed: Arc<Mutex<Option<String>>>,
    shut_down: bool,
}

impl MessageHandler {
    pub fn new(outbox: UnboundedSender<Response>) -> Self {
        MessageHandler {
            outbox,
            plugin: None,
            dialog: None,
            confirmed: Arc::new(Mutex::new(None)),
            shut_down: false,
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Handle one raw protocol line, sending the reply to the outbox.
    ///
    /// Returns true once the host asked to shut down.
    pub async fn handle_line(&mut self, line: &str) -> bool {
        let reply = match Request::parse(line) {
            Ok(request) => {
                log::debug!("Received {:?}", request);
                self.handle(request).await
            }
            Err(e) => Err(e),
        };

        match reply {
            Ok(response) => self.send(response),
            Err(e) => {
                log::error!("Request failed: {}", e);
                self.report_error(&e);
            }
        }
        self.shut_down
    }

    /// Tell the host about a failure that has no request to answer
    pub fn report_error(&self, error: &PluginError) {
        self.send(Response::Error { message: error.user_message() });
    }

    fn send(&self, response: Response) {
        if self.outbox.send(response).is_err() {
            log::error!("Host connection closed, dropping reply");
        }
    }

    /// Handle a parsed request and produce its reply
    pub async fn handle(&mut self, request: Request) -> PluginResult<Response> {
        if self.shut_down {
            return Err(PluginError::protocol("plugin has been shut down"));
        }

        match request {
            Request::Ping => Ok(Response::Pong),
            Request::Load { settings } => {
                if self.plugin.is_some() {
                    return Err(PluginError::protocol("settings are already loaded"));
                }
                self.start(Some(settings)).await?;
                self.settings_response().await
            }
            Request::GetSettings => self.settings_response().await,
            Request::SetField { field, value } => self.set_field(&field, value).await,
            Request::RenderSettings => {
                let panel = self.plugin().await?.settings_panel();
                let mut container = HeadlessContainer::new();
                panel.display(&mut container);
                Ok(Response::SettingsView {
                    headings: container.headings(),
                    controls: container.views(),
                })
            }
            Request::OpenFormats => self.open_formats().await,
            Request::ToggleFormat { label, value } => {
                let dialog = self.dialog_mut()?;
                let index = dialog
                    .known_labels()
                    .iter()
                    .position(|known| *known == label)
                    .ok_or_else(|| PluginError::dialog(&format!("Unknown format: {}", label)))?;
                dialog
                    .container_mut()
                    .change(&toggle_id(index), ControlValue::Bool(value))?;
                dialog.process_events()?;
                Ok(Response::FormatToggled {
                    selection: dialog.selection().to_vec(),
                })
            }
            Request::ConfirmFormats => {
                let dialog = self.dialog_mut()?;
                dialog.container_mut().press(CONFIRM_BUTTON_ID)?;
                dialog.process_events()?;
                self.dialog = None;

                let formats = self
                    .confirmed
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .take()
                    .ok_or_else(|| PluginError::dialog("Dialog closed without a selection"))?;
                Ok(Response::FormatsSelected { formats })
            }
            Request::CloseFormats => {
                self.dialog_mut()?.close()?;
                self.dialog = None;
                Ok(Response::FormatsClosed)
            }
            Request::Shutdown => {
                self.shutdown().await?;
                Ok(Response::Shutdown)
            }
        }
    }

    /// Flush settings and release the plugin
    pub async fn shutdown(&mut self) -> PluginResult<()> {
        self.shut_down = true;
        self.dialog = None;
        match self.plugin.take() {
            Some(plugin) => plugin.unload().await,
            None => Ok(()),
        }
    }

    async fn start(&mut self, stored: Option<Value>) -> PluginResult<&MovieManager> {
        let persistence = Arc::new(HostChannelPersistence::new(self.outbox.clone(), stored));
        let plugin = MovieManager::load(persistence).await?;
        Ok(&*self.plugin.insert(plugin))
    }

    /// The loaded plugin, starting from defaults if the host never sent `load`
    async fn plugin(&mut self) -> PluginResult<&MovieManager> {
        if self.plugin.is_none() {
            log::info!("No settings received from host, starting with defaults");
            self.start(None).await?;
        }
        self.plugin
            .as_ref()
            .ok_or_else(|| PluginError::config("plugin failed to start"))
    }

    async fn settings_response(&mut self) -> PluginResult<Response> {
        let settings = self.plugin().await?.settings().to_document()?;
        Ok(Response::Settings { settings })
    }

    async fn set_field(&mut self, key: &str, value: Value) -> PluginResult<Response> {
        let field: SettingField = key.parse()?;
        let store = self.plugin().await?.store();

        let receipt = match value {
            Value::Bool(b) => store.set(field, SettingValue::Bool(b))?,
            Value::String(text) => store.set_from_text(field, &text)?,
            Value::Number(n) => {
                let n = n
                    .as_i64()
                    .ok_or_else(|| PluginError::invalid_value(key, "expected a whole number"))?;
                store.set(field, SettingValue::Integer(n))?
            }
            Value::Array(items) => {
                let labels = items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(label) => Ok(label),
                        _ => Err(PluginError::invalid_value(key, "labels must be strings")),
                    })
                    .collect::<PluginResult<Vec<_>>>()?;
                store.set(field, SettingValue::Labels(labels))?
            }
            _ => return Err(PluginError::invalid_value(key, "unsupported value type")),
        };

        Ok(Response::FieldUpdated {
            field: field.key().to_string(),
            sequence: receipt.sequence(),
        })
    }

    async fn open_formats(&mut self) -> PluginResult<Response> {
        if self.dialog.is_some() {
            return Err(PluginError::dialog("A format dialog is already open"));
        }

        let slot = Arc::clone(&self.confirmed);
        *slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        let plugin = self.plugin().await?;
        let mut dialog = plugin.format_dialog(HeadlessContainer::new(), move |formats| {
            *slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(formats);
        });
        dialog.open()?;

        let response = Response::FormatsDialog {
            dialog_id: dialog.id(),
            labels: dialog.known_labels().to_vec(),
            default: dialog.default_state(),
        };
        self.dialog = Some(dialog);
        Ok(response)
    }

    fn dialog_mut(&mut self) -> PluginResult<&mut MultiSelectDialog<HeadlessContainer>> {
        self.dialog
            .as_mut()
            .ok_or_else(|| PluginError::dialog("No format dialog is open"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn handler() -> (MessageHandler, UnboundedReceiver<Response>) {
        let (outbox, outgoing) = mpsc::unbounded_channel();
        (MessageHandler::new(outbox), outgoing)
    }

    fn drain(outgoing: &mut UnboundedReceiver<Response>) -> Vec<Response> {
        let mut messages = Vec::new();
        while let Ok(message) = outgoing.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn test_load_then_get_settings() {
        let (mut handler, _outgoing) = handler();
        let reply = handler
            .handle(Request::Load { settings: json!({ "rootDir": "Media" }) })
            .await
            .unwrap();
        match reply {
            Response::Settings { settings } => {
                assert_eq!(settings["rootDirectory"], json!("Media"))
            }
            other => panic!("unexpected reply: {:?}", other),
        }

        assert!(handler.handle(Request::Load { settings: Value::Null }).await.is_err());
    }

    #[tokio::test]
    async fn test_set_field_emits_persist() {
        let (mut handler, mut outgoing) = handler();

        let reply = handler
            .handle(Request::SetField { field: "castCount".to_string(), value: json!("-1") })
            .await
            .unwrap();
        assert_eq!(reply, Response::FieldUpdated { field: "castCount".to_string(), sequence: 1 });

        handler.shutdown().await.unwrap();
        let persisted: Vec<_> = drain(&mut outgoing)
            .into_iter()
            .filter_map(|message| match message {
                Response::Persist { settings } => Some(settings),
                _ => None,
            })
            .collect();
        assert_eq!(persisted.len(), 2);
        assert!(persisted.iter().all(|settings| settings["castCount"] == json!(-1)));
    }

    #[tokio::test]
    async fn test_set_field_rejects_bad_input() {
        let (mut handler, _outgoing) = handler();

        assert!(handler
            .handle(Request::SetField { field: "castCount".to_string(), value: json!("abc") })
            .await
            .is_err());
        assert!(handler
            .handle(Request::SetField { field: "colour".to_string(), value: json!(true) })
            .await
            .is_err());

        match handler.handle(Request::GetSettings).await.unwrap() {
            Response::Settings { settings } => assert_eq!(settings["castCount"], json!(5)),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_format_dialog_round() {
        let (mut handler, _outgoing) = handler();

        match handler.handle(Request::OpenFormats).await.unwrap() {
            Response::FormatsDialog { labels, default, .. } => {
                assert_eq!(labels, vec!["DVD", "Blu-ray", "Plex"]);
                assert!(default);
            }
            other => panic!("unexpected reply: {:?}", other),
        }
        assert!(handler.handle(Request::OpenFormats).await.is_err());

        let reply = handler
            .handle(Request::ToggleFormat { label: "DVD".to_string(), value: false })
            .await
            .unwrap();
        assert_eq!(
            reply,
            Response::FormatToggled { selection: vec!["Blu-ray".to_string(), "Plex".to_string()] }
        );

        let reply = handler.handle(Request::ConfirmFormats).await.unwrap();
        assert_eq!(reply, Response::FormatsSelected { formats: "Blu-ray,Plex".to_string() });
        assert!(handler.handle(Request::ConfirmFormats).await.is_err());
    }

    #[tokio::test]
    async fn test_close_formats_reports_nothing() {
        let (mut handler, mut outgoing) = handler();
        handler.handle(Request::OpenFormats).await.unwrap();
        handler
            .handle(Request::ToggleFormat { label: "DVD".to_string(), value: true })
            .await
            .unwrap();

        assert_eq!(handler.handle(Request::CloseFormats).await.unwrap(), Response::FormatsClosed);
        assert!(handler.handle(Request::ConfirmFormats).await.is_err());
        assert!(handler
            .handle(Request::ToggleFormat { label: "Laserdisc".to_string(), value: true })
            .await
            .is_err());
        assert!(drain(&mut outgoing).is_empty());
    }

    #[tokio::test]
    async fn test_render_settings_lists_controls() {
        let (mut handler, _outgoing) = handler();
        match handler.handle(Request::RenderSettings).await.unwrap() {
            Response::SettingsView { headings, controls } => {
                assert!(headings.contains(&"Formats".to_string()));
                assert!(controls.iter().any(|c| c.id == "castCount"));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_report_error_reaches_host() {
        let (handler, mut outgoing) = handler();
        let err = PluginError::from(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad"));

        handler.report_error(&err);

        match drain(&mut outgoing).as_slice() {
            [Response::Error { message }] => assert!(message.contains("Host communication")),
            other => panic!("unexpected messages: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handle_line_replies_with_errors() {
        let (mut handler, mut outgoing) = handler();

        assert!(!handler.handle_line("{ nope").await);
        assert!(matches!(drain(&mut outgoing).as_slice(), [Response::Error { .. }]));

        assert!(handler.handle_line(r#"{"type":"shutdown"}"#).await);
        assert!(drain(&mut outgoing).contains(&Response::Shutdown));
        assert!(handler.handle(Request::Ping).await.is_err());
    }
}
