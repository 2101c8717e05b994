//! In-memory uploaded files.

use bytes::Bytes;

/// An uploaded file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryFile {
    /// File name as the client sent it.
    pub name: String,
    /// File content.
    pub content: Bytes,
    /// MIME type.
    pub content_type: String,
}

impl InMemoryFile {
    /// Returns the content length in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Returns the content.
    #[must_use]
    pub fn read(&self) -> Bytes {
        self.content.clone()
    }

    /// Returns the content split into lines, lossily decoded as UTF-8.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.content)
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Creates an in-memory upload.
///
/// Without an explicit `content_type`, the type is guessed from the file
/// extension.
///
/// ```
/// use viewtest::files::create_inmemory_file;
///
/// let file = create_inmemory_file("report.csv", "a,b\n1,2\n", None);
/// assert_eq!(file.content_type, "text/csv");
/// assert_eq!(file.lines(), vec!["a,b", "1,2"]);
/// ```
pub fn create_inmemory_file(
    name: impl Into<String>,
    content: impl Into<Bytes>,
    content_type: Option<&str>,
) -> InMemoryFile {
    let name = name.into();
    let content_type = content_type.map_or_else(|| guess_content_type(&name), str::to_string);
    InMemoryFile {
        name,
        content: content.into(),
        content_type,
    }
}

fn guess_content_type(name: &str) -> String {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
    .to_string()
}
