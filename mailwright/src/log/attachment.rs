use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A pointer to a file that was attached to a logged email.
///
/// `exists` is checked when the reference is created and again whenever it is
/// deserialized; the file may have moved since the email was sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredAttachment")]
pub struct AttachmentRef {
    location: PathBuf,
    basename: String,
    filename: String,
    extension: String,
    #[serde(skip_serializing)]
    exists: bool,
}

/// Serialized shape. Carries no existence flag.
#[derive(Deserialize)]
struct StoredAttachment {
    location: PathBuf,
    #[serde(default)]
    basename: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    extension: String,
}

impl From<StoredAttachment> for AttachmentRef {
    fn from(stored: StoredAttachment) -> Self {
        let exists = stored.location.is_file();
        AttachmentRef {
            location: stored.location,
            basename: stored.basename,
            filename: stored.filename,
            extension: stored.extension,
            exists,
        }
    }
}

impl AttachmentRef {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        let location = location.into();
        let part = |s: Option<&std::ffi::OsStr>| {
            s.map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        AttachmentRef {
            basename: part(location.file_name()),
            filename: part(location.file_stem()),
            extension: part(location.extension()),
            exists: location.is_file(),
            location,
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// File name including extension.
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// File name without extension.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn exists(&self) -> bool {
        self.exists
    }
}
