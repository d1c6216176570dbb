use std::sync::Arc;
use crate::utils::error_handling::PluginResult;

pub mod config;
pub mod ui;
pub mod utils;
pub mod communication;

use crate::config::{ConfigurationRecord, ConfigurationStore, SettingsPersistence};
use crate::ui::{Container, MultiSelectDialog, SettingsPanel};

/// Main plugin struct that coordinates all components
pub struct MovieManager {
    store: Arc<ConfigurationStore>,
}

impl MovieManager {
    /// Load stored settings (or defaults) through the host's persistence service
    pub async fn load(persistence: Arc<dyn SettingsPersistence>) -> PluginResult<Self> {
        log::info!("Loading movie-manager settings");
        let store = ConfigurationStore::load(persistence).await?;
        Ok(MovieManager { store })
    }

    /// Shared handle to the settings store
    pub fn store(&self) -> Arc<ConfigurationStore> {
        Arc::clone(&self.store)
    }

    pub fn settings(&self) -> ConfigurationRecord {
        self.store.get()
    }

    /// Settings tab bound to the store
    pub fn settings_panel(&self) -> SettingsPanel {
        SettingsPanel::new(self.store())
    }

    /// Format picker seeded with the configured labels.
    ///
    /// Every toggle starts as `defaultFormatsToTrue`, and so does the selection. The
    /// confirmed selection goes to `on_confirm` only; it is never written back to the settings.
    pub fn format_dialog<C, F>(&self, container: C, on_confirm: F) -> MultiSelectDialog<C>
    where
        C: Container,
        F: FnOnce(String) + Send + 'static,
    {
        let settings = self.store.get();
        MultiSelectDialog::new(container, settings.formats, on_confirm)
            .with_default_state(settings.default_formats_to_true)
    }

    /// Flush pending writes before the host unloads the plugin
    pub async fn unload(self) -> PluginResult<()> {
        log::info!("Unloading movie-manager, flushing settings");
        self.store.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemoryPersistence, SettingField, SettingValue};
    use crate::ui::{ControlValue, HeadlessContainer};
    use serde_json::json;
    use std::sync::Mutex;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_format_dialog_uses_configured_labels() {
        let persistence = Arc::new(MemoryPersistence::with_document(json!({
            "formats": ["4K", "Plex"],
            "defaultFormatsToTrue": false
        })));
        let plugin = MovieManager::load(persistence).await.unwrap();

        let mut dialog = plugin.format_dialog(HeadlessContainer::new(), |_| {});
        assert_eq!(dialog.known_labels(), ["4K", "Plex"]);
        assert!(!dialog.default_state());

        dialog.open().unwrap();
        assert_eq!(
            dialog.container().control("format-0").unwrap().current_value(),
            &ControlValue::Bool(false)
        );
    }

    #[tokio::test]
    async fn test_confirmed_selection_is_not_written_back() {
        let persistence = Arc::new(MemoryPersistence::new());
        let plugin = MovieManager::load(persistence.clone()).await.unwrap();
        let chosen = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&chosen);
        let mut dialog = plugin.format_dialog(HeadlessContainer::new(), move |formats| {
            *slot.lock().unwrap() = Some(formats);
        });
        dialog.open().unwrap();
        dialog.on_toggle("Blu-ray", false);
        dialog.confirm().unwrap();

        assert_eq!(chosen.lock().unwrap().as_deref(), Some("DVD,Plex"));
        assert_eq!(plugin.settings().formats, vec!["DVD", "Blu-ray", "Plex"]);
        assert_eq!(plugin.store().stats().issued, 0);
        assert_eq!(persistence.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unload_flushes_latest_settings() {
        let persistence = Arc::new(MemoryPersistence::new());
        let plugin = MovieManager::load(persistence.clone()).await.unwrap();

        plugin
            .store()
            .set(SettingField::ApiKey, SettingValue::Text("secret".to_string()))
            .unwrap();
        assert_ok!(plugin.unload().await);

        assert_eq!(persistence.stored().unwrap()["apiKey"], json!("secret"));
        assert_eq!(persistence.write_count(), 2);
    }

    #[tokio::test]
    async fn test_panel_and_dialog_share_the_store() {
        let plugin = MovieManager::load(Arc::new(MemoryPersistence::new())).await.unwrap();
        let panel = plugin.settings_panel();
        let mut container = HeadlessContainer::new();
        panel.display(&mut container);

        container
            .change("formats", ControlValue::Text("VHS,DVD".to_string()))
            .unwrap();

        let dialog = plugin.format_dialog(HeadlessContainer::new(), |_| {});
        assert_eq!(dialog.known_labels(), ["VHS", "DVD"]);
    }
}
