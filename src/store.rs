use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::columns::ComputedColumn;
use crate::data::Row;
use crate::error::PicklistError;
use crate::order::SortDirection;
use crate::session::SessionState;

/// A named, timestamped snapshot of a picklist. Saving under an existing
/// name overwrites that record in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedPicklist {
    pub name: String,
    pub data: Vec<Row>,
    pub fields: Vec<String>,
    pub sort_order: String,
    pub sort_direction: SortDirection,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_columns: Option<Vec<ComputedColumn>>,
}

/// Injected persistence capability. The engine core calls through this
/// interface and never touches ambient storage directly.
pub trait StateStore {
    fn load_session(&self) -> Result<Option<SessionState>, PicklistError>;
    fn save_session(&self, state: &SessionState) -> Result<(), PicklistError>;
    fn load_columns(&self) -> Result<Vec<ComputedColumn>, PicklistError>;
    fn save_columns(&self, columns: &[ComputedColumn]) -> Result<(), PicklistError>;
    fn load_picklists(&self) -> Result<Vec<SavedPicklist>, PicklistError>;
    fn save_picklist(&self, record: SavedPicklist) -> Result<(), PicklistError>;
    fn delete_picklist(&self, name: &str) -> Result<bool, PicklistError>;
}

const SESSION_FILE: &str = "session.json";
const COLUMNS_FILE: &str = "computed_columns.json";
const PICKLISTS_FILE: &str = "picklists.json";

/// File-backed store: one JSON document per slot under a state directory.
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>, PicklistError> {
        let path = self.root.join(file);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).map_err(|err| {
            PicklistError::Persistence(format!("Failed to read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&text).map(Some).map_err(|err| {
            PicklistError::Persistence(format!("Failed to parse {}: {err}", path.display()))
        })
    }

    fn write<T: Serialize>(&self, file: &str, value: &T) -> Result<(), PicklistError> {
        fs::create_dir_all(&self.root).map_err(|err| {
            PicklistError::Persistence(format!(
                "Failed to create {}: {err}",
                self.root.display()
            ))
        })?;
        let path = self.root.join(file);
        let text = serde_json::to_string_pretty(value).map_err(|err| {
            PicklistError::Persistence(format!("Failed to serialize {}: {err}", path.display()))
        })?;
        fs::write(&path, text).map_err(|err| {
            PicklistError::Persistence(format!("Failed to write {}: {err}", path.display()))
        })
    }
}

impl StateStore for JsonStore {
    fn load_session(&self) -> Result<Option<SessionState>, PicklistError> {
        self.read(SESSION_FILE)
    }

    fn save_session(&self, state: &SessionState) -> Result<(), PicklistError> {
        self.write(SESSION_FILE, state)
    }

    fn load_columns(&self) -> Result<Vec<ComputedColumn>, PicklistError> {
        Ok(self.read(COLUMNS_FILE)?.unwrap_or_default())
    }

    fn save_columns(&self, columns: &[ComputedColumn]) -> Result<(), PicklistError> {
        self.write(COLUMNS_FILE, &columns)
    }

    fn load_picklists(&self) -> Result<Vec<SavedPicklist>, PicklistError> {
        Ok(self.read(PICKLISTS_FILE)?.unwrap_or_default())
    }

    fn save_picklist(&self, record: SavedPicklist) -> Result<(), PicklistError> {
        if record.name.is_empty() {
            return Err(PicklistError::Validation(
                "Please enter a picklist name.".to_string(),
            ));
        }
        if record.name.contains(' ') {
            return Err(PicklistError::Validation(
                "Picklist name cannot contain spaces.".to_string(),
            ));
        }
        let mut picklists = self.load_picklists()?;
        match picklists.iter().position(|p| p.name == record.name) {
            Some(idx) => picklists[idx] = record,
            None => picklists.push(record),
        }
        self.write(PICKLISTS_FILE, &picklists)
    }

    fn delete_picklist(&self, name: &str) -> Result<bool, PicklistError> {
        let mut picklists = self.load_picklists()?;
        let before = picklists.len();
        picklists.retain(|p| p.name != name);
        if picklists.len() == before {
            return Ok(false);
        }
        self.write(PICKLISTS_FILE, &picklists)?;
        Ok(true)
    }
}

pub fn timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}
