use serde::{Deserialize, Serialize};

use crate::models::Color;
use crate::storage::{StorageBackend, StorageError};

/// Storage key of the global preferences record.
pub const PREFERENCES_KEY: &str = "annotatorPrefs";

pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#ffff00";
pub const DEFAULT_DRAW_COLOR: &str = "#ff0000";
pub const DEFAULT_BRUSH_SIZE: f64 = 5.0;

/// Last-used colors and brush size, shared by every page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub highlight_color: Color,
    pub draw_color: Color,
    pub brush_size: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            highlight_color: Color::new(DEFAULT_HIGHLIGHT_COLOR),
            draw_color: Color::new(DEFAULT_DRAW_COLOR),
            brush_size: DEFAULT_BRUSH_SIZE,
        }
    }
}

impl Preferences {
    /// Reads the stored record. `Ok(None)` when nothing was saved yet;
    /// fields missing from an older record fall back to the defaults.
    pub fn load<S: StorageBackend>(backend: &S) -> Result<Option<Self>, StorageError> {
        backend
            .get(PREFERENCES_KEY)?
            .map(|value| serde_json::from_value(value).map_err(StorageError::from))
            .transpose()
    }

    pub fn save<S: StorageBackend>(&self, backend: &mut S) -> Result<(), StorageError> {
        backend.set(PREFERENCES_KEY, serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    #[test]
    fn test_load_without_record() {
        let storage = MemoryStorage::new();
        assert_eq!(Preferences::load(&storage).unwrap(), None);
    }

    #[test]
    fn test_save_and_load() {
        let mut storage = MemoryStorage::new();
        let prefs = Preferences {
            highlight_color: Color::new("#00ff00"),
            draw_color: Color::new("#0000ff"),
            brush_size: 12.0,
        };
        prefs.save(&mut storage).unwrap();

        assert_eq!(Preferences::load(&storage).unwrap(), Some(prefs));
        assert_eq!(
            storage.get(PREFERENCES_KEY).unwrap(),
            Some(json!({"highlightColor": "#00ff00", "drawColor": "#0000ff", "brushSize": 12.0}))
        );
    }

    #[test]
    fn test_partial_record_uses_defaults() {
        let mut storage = MemoryStorage::new();
        storage
            .set(PREFERENCES_KEY, json!({"drawColor": "#123456"}))
            .unwrap();

        let prefs = Preferences::load(&storage).unwrap().unwrap();
        assert_eq!(prefs.draw_color, Color::new("#123456"));
        assert_eq!(prefs.highlight_color, Color::new(DEFAULT_HIGHLIGHT_COLOR));
        assert_eq!(prefs.brush_size, DEFAULT_BRUSH_SIZE);
    }
}
