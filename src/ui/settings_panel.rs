use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use crate::config::{ConfigurationStore, SettingField, SettingValue};
use crate::ui::control::{Container, ControlKind, ControlSpec, ControlValue};

/// Placeholder features shown disabled at the bottom of the panel
const COMING_SOON: [(&str, &str, &str); 5] = [
    (
        "enumerateCast",
        "Enumerate Cast",
        "Creates a new file for each actor with all the details.",
    ),
    (
        "enumerateCollections",
        "Enumerate Collections",
        "Creates a new file for each collection with all the details.",
    ),
    (
        "enumerateSeasons",
        "Enumerate Seasons",
        "Creates a new file for each season with all the details.",
    ),
    (
        "keywords",
        "Keywords",
        "Creates a section of tags of keywords found for each title.",
    ),
    (
        "templates",
        "Templates",
        "Design your own template file and tweak each movie/series to look exactly how you \
         want it.",
    ),
];

/// Settings tab: one control per setting, each change committed to the store at once.
///
/// Control ids are the settings document keys. Toggles that decide whether other
/// controls are shown request a full redraw, performed by [`SettingsPanel::refresh`].
pub struct SettingsPanel {
    store: Arc<ConfigurationStore>,
    redraw_requested: Arc<AtomicBool>,
}

impl SettingsPanel {
    pub fn new(store: Arc<ConfigurationStore>) -> Self {
        SettingsPanel {
            store,
            redraw_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Toggles whose value changes which controls are visible
    pub fn governs_visibility(field: SettingField) -> bool {
        matches!(
            field,
            SettingField::AddSortTitle | SettingField::ShowCast | SettingField::ShowOwnedFormats
        )
    }

    pub fn needs_redraw(&self) -> bool {
        self.redraw_requested.load(Ordering::SeqCst)
    }

    /// Redraw if a governing toggle changed since the last display. Returns true if redrawn.
    pub fn refresh(&self, container: &mut dyn Container) -> bool {
        if self.redraw_requested.load(Ordering::SeqCst) {
            self.display(container);
            true
        } else {
            false
        }
    }

    /// Render the full panel from the current record
    pub fn display(&self, container: &mut dyn Container) {
        self.redraw_requested.store(false, Ordering::SeqCst);
        let settings = self.store.get();

        container.empty();

        self.add_text(
            container,
            ControlKind::Text,
            SettingField::ApiKey,
            ControlSpec::new(SettingField::ApiKey.key(), "API Key")
                .description("Your API key. Get one free at https://developer.themoviedb.org")
                .placeholder("api key"),
        );
        self.add_text(
            container,
            ControlKind::Text,
            SettingField::RootDirectory,
            ControlSpec::new(SettingField::RootDirectory.key(), "Root Directory")
                .description("The directory you want all titles to be added in.")
                .placeholder("/"),
        );

        container.add_heading("Front matter");
        self.add_toggle(
            container,
            SettingField::UseBanner,
            "Use Banner",
            "Adds the backdrop url to the front matter to be used with the Banners plugin.",
        );
        self.add_toggle(
            container,
            SettingField::UsePosterAsBanner,
            "Use Poster as Banner",
            "Use the movie/series poster instead of the backdrop (default).",
        );
        self.add_toggle(
            container,
            SettingField::AddMetadata,
            "Add Metadata",
            "Adds title details to the front matter.",
        );
        self.add_toggle(
            container,
            SettingField::AddSortTitle,
            "Add Sort Title",
            "Adds a custom sorting title to the front matter to be used with the \
             Custom File Explorer sorting plugin.",
        );
        if settings.add_sort_title {
            self.add_toggle(
                container,
                SettingField::IgnoreLeadingThe,
                "Ignore 'The' in Titles",
                "Ignore the word 'the' at the beginning of titles. \
                 Requires a sortspec that targets 'sort-title'.",
            );
        }

        container.add_heading("Collections");
        self.add_toggle(
            container,
            SettingField::ShowCollections,
            "Show Collections",
            "Adds the Collection section if the movie belongs to a Collection.",
        );
        self.add_toggle(
            container,
            SettingField::CreateCollectionFile,
            "Create Collection File",
            "Creates a note for the collection a movie belongs to.",
        );

        container.add_heading("Cast");
        self.add_toggle(container, SettingField::ShowCast, "Show Cast", "Adds the Cast section.");
        if settings.show_cast {
            self.add_text(
                container,
                ControlKind::Number,
                SettingField::CastCount,
                ControlSpec::new(SettingField::CastCount.key(), "Cast Count")
                    .description("The number of cast members to include. Specify -1 for all."),
            );
        }

        container.add_heading("Seasons");
        self.add_toggle(
            container,
            SettingField::ShowSeasons,
            "Show Seasons",
            "Adds the Seasons section to TV shows.",
        );

        container.add_heading("Production Companies");
        self.add_toggle(
            container,
            SettingField::ShowProductionCompanies,
            "Show Production Companies",
            "Add the Production Companies section.",
        );

        container.add_heading("Formats");
        self.add_toggle(
            container,
            SettingField::ShowOwnedFormats,
            "Show Formats",
            "Shows your Owned Formats section.",
        );
        if settings.show_owned_formats {
            self.add_text(
                container,
                ControlKind::Text,
                SettingField::Formats,
                ControlSpec::new(SettingField::Formats.key(), "Formats")
                    .description(
                        "A comma separated list of formats (tags) you want to add to the \
                         selection when a title is matched.",
                    )
                    .placeholder("Blu-ray,DVD,Plex"),
            );
            self.add_toggle(
                container,
                SettingField::DefaultFormatsToTrue,
                "Always Owned",
                "Set the Formats to always owned (true) in the Formats Modal.",
            );

            // Placeholders share the formats block, so they hide with it
            container.add_heading("Coming soon");
            for (id, name, description) in COMING_SOON {
                let control = container.add_control(
                    ControlKind::Toggle,
                    ControlSpec::new(id, name).description(description),
                );
                control.set_value(ControlValue::Bool(false));
                control.set_disabled(true);
            }
        }
    }

    fn add_toggle(
        &self,
        container: &mut dyn Container,
        field: SettingField,
        name: &str,
        description: &str,
    ) {
        let current = self.store.get().field(field);
        let control = container.add_control(
            ControlKind::Toggle,
            ControlSpec::new(field.key(), name).description(description),
        );
        if let SettingValue::Bool(value) = current {
            control.set_value(ControlValue::Bool(value));
        }

        let store = Arc::clone(&self.store);
        let redraw_requested = Arc::clone(&self.redraw_requested);
        control.on_change(Box::new(move |value: &ControlValue| {
            let ControlValue::Bool(selected) = value else {
                log::warn!("Toggle {} received {:?}", field, value);
                return;
            };
            match store.set(field, SettingValue::Bool(*selected)) {
                Ok(_) => {
                    if Self::governs_visibility(field) {
                        redraw_requested.store(true, Ordering::SeqCst);
                    }
                }
                Err(e) => log::warn!("Rejected change to {}: {}", field, e),
            }
        }));
    }

    fn add_text(
        &self,
        container: &mut dyn Container,
        kind: ControlKind,
        field: SettingField,
        spec: ControlSpec,
    ) {
        let current = self.store.get().field(field).to_display_string();
        let control = container.add_control(kind, spec);
        control.set_value(ControlValue::Text(current));

        let store = Arc::clone(&self.store);
        control.on_change(Box::new(move |value: &ControlValue| {
            let ControlValue::Text(text) = value else {
                log::warn!("Text field {} received {:?}", field, value);
                return;
            };
            if let Err(e) = store.set_from_text(field, text) {
                log::warn!("Rejected input for {}: {}", field, e);
            }
        }));
    }
}
