use crate::errors::Result;
use crate::traits::{FileSelector, Selection};
use rfd::FileDialog;
use std::path::PathBuf;

pub const DIALOG_TITLE: &str = "Select a JPEG or PNG image";

/// Dialog filters, first one active by default.
pub const IMAGE_FILTERS: &[(&str, &[&str])] = &[
    ("Image files", &["jpg", "jpeg", "png"]),
    ("JPEG only", &["jpg", "jpeg"]),
    ("PNG only", &["png"]),
    ("All files", &["*"]),
];

/// Native modal open-file dialog.
///
/// No check is made that the chosen file is readable or decodes as an image; the
/// preprocessor reports that.
#[derive(Debug, Clone)]
pub struct DialogSelector {
    initial_dir: PathBuf,
}

impl DialogSelector {
    pub fn new(initial_dir: impl Into<PathBuf>) -> Self {
        Self {
            initial_dir: initial_dir.into(),
        }
    }

    fn dialog(&self) -> FileDialog {
        IMAGE_FILTERS.iter().fold(
            FileDialog::new()
                .set_title(DIALOG_TITLE)
                .set_directory(&self.initial_dir),
            |dialog, (name, extensions)| dialog.add_filter(*name, *extensions),
        )
    }
}

impl FileSelector for DialogSelector {
    fn select(&mut self) -> Result<Selection> {
        tracing::debug!(initial_dir = %self.initial_dir.display(), "opening file dialog");
        Ok(match self.dialog().pick_file() {
            Some(path) => {
                tracing::info!(path = %path.display(), "image selected");
                Selection::Chosen(path)
            }
            None => Selection::Cancelled,
        })
    }
}
