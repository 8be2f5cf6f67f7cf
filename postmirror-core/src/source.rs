//! Local document enumeration.
//!
//! A [`DocumentSource`] yields every document to mirror. The directory-backed
//! [`MarkdownDirectory`] is non-recursive: only regular files directly inside
//! the directory whose name ends in the configured extension are documents.
//! Enumeration order is whatever the platform's `read_dir` yields and carries
//! no meaning.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SourceError;
use crate::front_matter;
use crate::types::Document;

/// Produces the local side of a reconciliation.
pub trait DocumentSource: Send + Sync {
    /// Every document, or the first failure. Never a partial list.
    fn list(&self) -> Result<Vec<Document>, SourceError>;
}

/// Title of a document file: the filename minus `.{extension}`.
///
/// `None` when the filename does not carry the extension. `extension` may be
/// given with or without its leading dot.
pub fn title_from_filename(filename: &str, extension: &str) -> Option<String> {
    let extension = extension.trim_start_matches('.');
    filename
        .strip_suffix(extension)
        .and_then(|stem| stem.strip_suffix('.'))
        .map(str::to_owned)
}

/// A flat directory of text documents.
#[derive(Debug, Clone)]
pub struct MarkdownDirectory {
    dir: PathBuf,
    extension: String,
    strip_front_matter: bool,
}

impl MarkdownDirectory {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
            strip_front_matter: false,
        }
    }

    /// Upload only the text after a front-matter block instead of the whole file.
    pub fn strip_front_matter(mut self, strip: bool) -> Self {
        self.strip_front_matter = strip;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_document(&self, path: PathBuf, title: String) -> Result<Document, SourceError> {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(source) => return Err(SourceError::Read { path, source }),
        };

        let parsed = front_matter::parse(&text);
        let metadata = parsed.front_matter;
        let body = if self.strip_front_matter {
            parsed.body.to_owned()
        } else {
            text
        };

        Ok(Document {
            title,
            body,
            metadata,
            path,
        })
    }
}

impl DocumentSource for MarkdownDirectory {
    fn list(&self) -> Result<Vec<Document>, SourceError> {
        let list_err = |source| SourceError::ListDir {
            path: self.dir.clone(),
            source,
        };

        let mut documents = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(list_err)? {
            let entry = entry.map_err(list_err)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!(path = %path.display(), "skipping non UTF-8 filename");
                continue;
            };
            let Some(title) = title_from_filename(name, &self.extension) else {
                continue;
            };
            documents.push(self.read_document(path, title)?);
        }

        tracing::debug!(
            dir = %self.dir.display(),
            documents = documents.len(),
            "listed local documents"
        );
        Ok(documents)
    }
}
