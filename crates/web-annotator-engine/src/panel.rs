//! The control panel: the popup side of the message channel.
//!
//! It owns the user's preferences, builds the requests sent to the page
//! agent, and turns annotation sets into export files and back.

use chrono::NaiveDate;

use crate::messages::{Mode, Request, Response};
use crate::models::{AnnotationSet, Color, Preferences};
use crate::storage::StorageBackend;

#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error("No annotations found to export")]
    NothingToExport,
    #[error("Invalid annotation file: {0}")]
    InvalidImport(serde_json::Error),
    #[error("Failed to serialize annotations: {0}")]
    Serialization(serde_json::Error),
}

pub struct ControlPanel<S> {
    backend: S,
    prefs: Preferences,
}

impl<S: StorageBackend> ControlPanel<S> {
    /// Opens the panel. When preferences were stored, the returned requests
    /// push them to the page so it matches what the panel shows.
    pub fn open(backend: S) -> (Self, Vec<Request>) {
        let stored = Preferences::load(&backend).unwrap_or_else(|e| {
            log::warn!("Could not read preferences, using defaults: {e}");
            None
        });
        let initial = stored
            .as_ref()
            .map(|prefs| {
                vec![
                    Request::SetHighlightColor(prefs.highlight_color.clone()),
                    Request::SetDrawColor(prefs.draw_color.clone()),
                    Request::SetBrushSize(prefs.brush_size),
                ]
            })
            .unwrap_or_default();
        let panel = Self {
            backend,
            prefs: stored.unwrap_or_default(),
        };
        (panel, initial)
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn into_backend(self) -> S {
        self.backend
    }

    pub fn set_mode(&self, mode: Mode) -> Request {
        Request::SetMode(mode)
    }

    pub fn set_highlight_color(&mut self, color: Color) -> Request {
        self.prefs.highlight_color = color.clone();
        self.save_prefs();
        Request::SetHighlightColor(color)
    }

    pub fn set_draw_color(&mut self, color: Color) -> Request {
        self.prefs.draw_color = color.clone();
        self.save_prefs();
        Request::SetDrawColor(color)
    }

    pub fn set_brush_size(&mut self, size: f64) -> Request {
        self.prefs.brush_size = size;
        self.save_prefs();
        Request::SetBrushSize(size)
    }

    /// The clear request, only once the user has confirmed.
    pub fn clear(&self, confirmed: bool) -> Option<Request> {
        confirmed.then_some(Request::ClearAnnotations)
    }

    /// Pretty-printed export of a `getAnnotations` reply.
    pub fn export(&self, response: &Response) -> Result<String, PanelError> {
        match response {
            Response::Data { data } => export_json(data),
            Response::Success { .. } => Err(PanelError::NothingToExport),
        }
    }

    /// Parses an export file into the request that imports it.
    pub fn import(&self, text: &str) -> Result<Request, PanelError> {
        let set = serde_json::from_str(text).map_err(PanelError::InvalidImport)?;
        Ok(Request::ImportAnnotations(set))
    }

    fn save_prefs(&mut self) {
        if let Err(e) = self.prefs.save(&mut self.backend) {
            log::error!("Failed to save preferences: {e}");
        }
    }
}

/// Export format: the set as indented JSON.
pub fn export_json(set: &AnnotationSet) -> Result<String, PanelError> {
    serde_json::to_string_pretty(set).map_err(PanelError::Serialization)
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("annotations-{}.json", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PREFERENCES_KEY;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_open_without_prefs_sends_nothing() {
        let (panel, initial) = ControlPanel::open(MemoryStorage::new());
        assert!(initial.is_empty());
        assert_eq!(panel.preferences(), &Preferences::default());
    }

    #[test]
    fn test_setters_persist_and_replay_on_open() {
        let (mut panel, _) = ControlPanel::open(MemoryStorage::new());
        assert_eq!(
            panel.set_draw_color(Color::new("#00ff00")),
            Request::SetDrawColor(Color::new("#00ff00"))
        );
        panel.set_brush_size(11.0);

        let (reopened, initial) = ControlPanel::open(panel.into_backend());

        assert_eq!(
            initial,
            vec![
                Request::SetHighlightColor(Color::new("#ffff00")),
                Request::SetDrawColor(Color::new("#00ff00")),
                Request::SetBrushSize(11.0),
            ]
        );
        assert_eq!(reopened.preferences().brush_size, 11.0);
    }

    #[test]
    fn test_unreadable_prefs_fall_back_to_defaults() {
        let mut storage = MemoryStorage::new();
        storage
            .set(PREFERENCES_KEY, serde_json::json!("not an object"))
            .unwrap();

        let (panel, initial) = ControlPanel::open(storage);

        assert!(initial.is_empty());
        assert_eq!(panel.preferences(), &Preferences::default());
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let (panel, _) = ControlPanel::open(MemoryStorage::new());
        assert_eq!(panel.clear(false), None);
        assert_eq!(panel.clear(true), Some(Request::ClearAnnotations));
    }

    #[test]
    fn test_export_needs_data() {
        let (panel, _) = ControlPanel::open(MemoryStorage::new());
        assert!(matches!(
            panel.export(&Response::success()),
            Err(PanelError::NothingToExport)
        ));

        let json = panel
            .export(&Response::Data {
                data: AnnotationSet::default(),
            })
            .unwrap();
        insta::assert_snapshot!(json, @r#"
        {
          "highlights": [],
          "drawings": []
        }
        "#);
    }

    #[test]
    fn test_export_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(export_file_name(date), "annotations-2024-03-07.json");
    }

    #[test]
    fn test_import_rejects_invalid_file() {
        let (panel, _) = ControlPanel::open(MemoryStorage::new());
        assert!(matches!(
            panel.import("[1, 2"),
            Err(PanelError::InvalidImport(_))
        ));
        assert_eq!(
            panel.import("{}").unwrap(),
            Request::ImportAnnotations(AnnotationSet::default())
        );
    }
}
