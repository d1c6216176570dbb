use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use crate::utils::error_handling::{PluginResult, PluginError};

/// Persisted plugin settings
///
/// Serialized with camelCase keys; reading goes through [`ConfigurationRecord::from_document`],
/// which also understands the keys written by earlier releases.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationRecord {
    pub api_key: String,
    pub root_directory: String,
    pub use_banner: bool,
    pub use_poster_as_banner: bool,
    pub add_metadata: bool,
    pub add_sort_title: bool,
    pub ignore_leading_the: bool,
    pub show_collections: bool,
    pub create_collection_file: bool,
    pub show_cast: bool,
    pub show_seasons: bool,
    /// Number of cast members to list, -1 for all of them
    pub cast_count: i64,
    pub show_production_companies: bool,
    pub show_owned_formats: bool,
    pub formats: Vec<String>,
    pub default_formats_to_true: bool,
}

impl Default for ConfigurationRecord {
    fn default() -> Self {
        ConfigurationRecord {
            api_key: String::new(),
            root_directory: "/".to_string(),
            use_banner: false,
            use_poster_as_banner: false,
            add_metadata: true,
            add_sort_title: true,
            ignore_leading_the: true,
            show_collections: true,
            create_collection_file: false,
            show_cast: true,
            show_seasons: false,
            cast_count: 5,
            show_production_companies: true,
            show_owned_formats: true,
            formats: vec!["DVD".to_string(), "Blu-ray".to_string(), "Plex".to_string()],
            default_formats_to_true: true,
        }
    }
}

/// Cast count value meaning "include the whole cast"
pub const ALL_CAST: i64 = -1;

/// Shape of a setting value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Integer,
    Text,
    Labels,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Text => "text",
            ValueKind::Labels => "label list",
        }
    }
}

/// A typed value for a single setting
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Text(String),
    Labels(Vec<String>),
}

impl SettingValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            SettingValue::Bool(_) => ValueKind::Bool,
            SettingValue::Integer(_) => ValueKind::Integer,
            SettingValue::Text(_) => ValueKind::Text,
            SettingValue::Labels(_) => ValueKind::Labels,
        }
    }

    /// Render the value the way a text control shows it
    pub fn to_display_string(&self) -> String {
        match self {
            SettingValue::Bool(b) => b.to_string(),
            SettingValue::Integer(n) => n.to_string(),
            SettingValue::Text(s) => s.clone(),
            SettingValue::Labels(labels) => labels.join(","),
        }
    }

    fn from_json(kind: ValueKind, value: &Value) -> Option<Self> {
        match kind {
            ValueKind::Bool => value.as_bool().map(SettingValue::Bool),
            ValueKind::Integer => value.as_i64().map(SettingValue::Integer),
            ValueKind::Text => value.as_str().map(|s| SettingValue::Text(s.to_string())),
            ValueKind::Labels => value.as_array().and_then(|items| {
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .map(SettingValue::Labels)
            }),
        }
    }
}

/// Every field of [`ConfigurationRecord`], addressable by its document key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingField {
    ApiKey,
    RootDirectory,
    UseBanner,
    UsePosterAsBanner,
    AddMetadata,
    AddSortTitle,
    IgnoreLeadingThe,
    ShowCollections,
    CreateCollectionFile,
    ShowCast,
    ShowSeasons,
    CastCount,
    ShowProductionCompanies,
    ShowOwnedFormats,
    Formats,
    DefaultFormatsToTrue,
}

impl SettingField {
    pub const ALL: [SettingField; 16] = [
        SettingField::ApiKey,
        SettingField::RootDirectory,
        SettingField::UseBanner,
        SettingField::UsePosterAsBanner,
        SettingField::AddMetadata,
        SettingField::AddSortTitle,
        SettingField::IgnoreLeadingThe,
        SettingField::ShowCollections,
        SettingField::CreateCollectionFile,
        SettingField::ShowCast,
        SettingField::ShowSeasons,
        SettingField::CastCount,
        SettingField::ShowProductionCompanies,
        SettingField::ShowOwnedFormats,
        SettingField::Formats,
        SettingField::DefaultFormatsToTrue,
    ];

    /// Key used in the persisted document
    pub fn key(self) -> &'static str {
        match self {
            SettingField::ApiKey => "apiKey",
            SettingField::RootDirectory => "rootDirectory",
            SettingField::UseBanner => "useBanner",
            SettingField::UsePosterAsBanner => "usePosterAsBanner",
            SettingField::AddMetadata => "addMetadata",
            SettingField::AddSortTitle => "addSortTitle",
            SettingField::IgnoreLeadingThe => "ignoreLeadingThe",
            SettingField::ShowCollections => "showCollections",
            SettingField::CreateCollectionFile => "createCollectionFile",
            SettingField::ShowCast => "showCast",
            SettingField::ShowSeasons => "showSeasons",
            SettingField::CastCount => "castCount",
            SettingField::ShowProductionCompanies => "showProductionCompanies",
            SettingField::ShowOwnedFormats => "showOwnedFormats",
            SettingField::Formats => "formats",
            SettingField::DefaultFormatsToTrue => "defaultFormatsToTrue",
        }
    }

    /// Key written by earlier releases, if it differs
    pub fn legacy_key(self) -> Option<&'static str> {
        match self {
            SettingField::ApiKey => Some("apikey"),
            SettingField::RootDirectory => Some("rootDir"),
            SettingField::UsePosterAsBanner => Some("userPosterAsBanner"),
            SettingField::AddMetadata => Some("addMeta"),
            SettingField::IgnoreLeadingThe => Some("ignoreThe"),
            _ => None,
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            SettingField::ApiKey | SettingField::RootDirectory => ValueKind::Text,
            SettingField::CastCount => ValueKind::Integer,
            SettingField::Formats => ValueKind::Labels,
            _ => ValueKind::Bool,
        }
    }

    /// Resolve a document key, accepting legacy spellings
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.key() == key || field.legacy_key() == Some(key))
    }

    /// Parse host text input into a value of this field's type
    pub fn parse_text(self, text: &str) -> PluginResult<SettingValue> {
        match self.kind() {
            ValueKind::Integer => parse_cast_count(text).map(SettingValue::Integer),
            ValueKind::Labels => Ok(SettingValue::Labels(split_labels(text))),
            ValueKind::Text => {
                if self == SettingField::RootDirectory {
                    validate_root_directory(text)?;
                }
                Ok(SettingValue::Text(text.to_string()))
            }
            ValueKind::Bool => text.trim().parse::<bool>().map(SettingValue::Bool).map_err(|_| {
                PluginError::invalid_value(self.key(), &format!("'{}' is not true or false", text))
            }),
        }
    }
}

impl fmt::Display for SettingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SettingField {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| PluginError::config(&format!("Unknown setting: {}", s)))
    }
}

/// Parse the cast count text field. Accepts -1 (all) or any non-negative integer.
pub fn parse_cast_count(text: &str) -> PluginResult<i64> {
    let value = text.trim().parse::<i64>().map_err(|_| {
        PluginError::invalid_value("castCount", &format!("'{}' is not a whole number", text))
    })?;
    validate_cast_count(value)?;
    Ok(value)
}

fn validate_cast_count(value: i64) -> PluginResult<()> {
    if value < ALL_CAST {
        return Err(PluginError::invalid_value(
            "castCount",
            "use -1 for all, or a count of 0 or more",
        ));
    }
    Ok(())
}

fn validate_root_directory(path: &str) -> PluginResult<()> {
    if path.is_empty() {
        return Err(PluginError::invalid_value("rootDirectory", "root directory cannot be empty"));
    }
    Ok(())
}

/// Split the comma separated format list. Labels are kept verbatim.
pub fn split_labels(text: &str) -> Vec<String> {
    text.split(',').map(str::to_string).collect()
}

impl ConfigurationRecord {
    /// Read one field as a typed value
    pub fn field(&self, field: SettingField) -> SettingValue {
        match field {
            SettingField::ApiKey => SettingValue::Text(self.api_key.clone()),
            SettingField::RootDirectory => SettingValue::Text(self.root_directory.clone()),
            SettingField::UseBanner => SettingValue::Bool(self.use_banner),
            SettingField::UsePosterAsBanner => SettingValue::Bool(self.use_poster_as_banner),
            SettingField::AddMetadata => SettingValue::Bool(self.add_metadata),
            SettingField::AddSortTitle => SettingValue::Bool(self.add_sort_title),
            SettingField::IgnoreLeadingThe => SettingValue::Bool(self.ignore_leading_the),
            SettingField::ShowCollections => SettingValue::Bool(self.show_collections),
            SettingField::CreateCollectionFile => SettingValue::Bool(self.create_collection_file),
            SettingField::ShowCast => SettingValue::Bool(self.show_cast),
            SettingField::ShowSeasons => SettingValue::Bool(self.show_seasons),
            SettingField::CastCount => SettingValue::Integer(self.cast_count),
            SettingField::ShowProductionCompanies => {
                SettingValue::Bool(self.show_production_companies)
            }
            SettingField::ShowOwnedFormats => SettingValue::Bool(self.show_owned_formats),
            SettingField::Formats => SettingValue::Labels(self.formats.clone()),
            SettingField::DefaultFormatsToTrue => SettingValue::Bool(self.default_formats_to_true),
        }
    }

    /// Write one field. Fails without touching the record if the value has the wrong
    /// type, is an out of range cast count or an empty root directory.
    pub fn apply(&mut self, field: SettingField, value: SettingValue) -> PluginResult<()> {
        if value.kind() != field.kind() {
            return Err(PluginError::TypeMismatch {
                field: field.key().to_string(),
                expected: field.kind().name(),
                actual: value.kind().name(),
            });
        }

        match (field, value) {
            (SettingField::ApiKey, SettingValue::Text(v)) => self.api_key = v,
            (SettingField::RootDirectory, SettingValue::Text(v)) => {
                validate_root_directory(&v)?;
                self.root_directory = v;
            }
            (SettingField::CastCount, SettingValue::Integer(v)) => {
                validate_cast_count(v)?;
                self.cast_count = v;
            }
            (SettingField::Formats, SettingValue::Labels(v)) => self.formats = v,
            (field, SettingValue::Bool(v)) => *self.flag_mut(field)? = v,
            (field, _) => {
                return Err(PluginError::config(&format!("No writer for {}", field)));
            }
        }
        Ok(())
    }

    fn flag_mut(&mut self, field: SettingField) -> PluginResult<&mut bool> {
        let flag = match field {
            SettingField::UseBanner => &mut self.use_banner,
            SettingField::UsePosterAsBanner => &mut self.use_poster_as_banner,
            SettingField::AddMetadata => &mut self.add_metadata,
            SettingField::AddSortTitle => &mut self.add_sort_title,
            SettingField::IgnoreLeadingThe => &mut self.ignore_leading_the,
            SettingField::ShowCollections => &mut self.show_collections,
            SettingField::CreateCollectionFile => &mut self.create_collection_file,
            SettingField::ShowCast => &mut self.show_cast,
            SettingField::ShowSeasons => &mut self.show_seasons,
            SettingField::ShowProductionCompanies => &mut self.show_production_companies,
            SettingField::ShowOwnedFormats => &mut self.show_owned_formats,
            SettingField::DefaultFormatsToTrue => &mut self.default_formats_to_true,
            other => return Err(PluginError::config(&format!("{} is not a toggle", other))),
        };
        Ok(flag)
    }

    /// Serialize to the flat key-value document handed to persistence
    pub fn to_document(&self) -> PluginResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Build a record from a stored document, applying defaults for absent keys.
    ///
    /// `null` (nothing stored yet) yields the defaults. Keys with the wrong type or an
    /// invalid value are logged and keep their default; unknown keys are ignored.
    pub fn from_document(document: &Value) -> PluginResult<Self> {
        let object: &Map<String, Value> = match document {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => {
                return Err(PluginError::config(&format!(
                    "Stored settings must be an object, found {}",
                    json_type_name(other)
                )))
            }
        };

        let mut record = Self::default();
        for field in SettingField::ALL {
            // Current keys win over legacy spellings when both are present
            let stored = object
                .get(field.key())
                .or_else(|| field.legacy_key().and_then(|key| object.get(key)));
            let Some(stored) = stored else {
                continue;
            };

            let applied = SettingValue::from_json(field.kind(), stored)
                .ok_or_else(|| PluginError::TypeMismatch {
                    field: field.key().to_string(),
                    expected: field.kind().name(),
                    actual: json_type_name(stored),
                })
                .and_then(|value| record.apply(field, value));

            if let Err(e) = applied {
                log::warn!("Ignoring stored value for {}: {}", field, e);
            }
        }

        for key in object.keys() {
            if SettingField::from_key(key).is_none() {
                log::debug!("Ignoring unknown settings key: {}", key);
            }
        }

        Ok(record)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
