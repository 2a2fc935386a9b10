//! Media types served by the origin
//!
//! A closed table: every variant has a canonical media-type string and a
//! stable numeric id used by the cache record format. Ids must never be
//! reassigned, only appended.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Media type of a served file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeType {
    Unknown,
    Html,
    Plain,
    Css,
    Markdown,
    Png,
    Jpeg,
    Gif,
    Svg,
    WebP,
    Ico,
    Woff,
    Woff2,
    Ttf,
    Otf,
    Eot,
    Json,
}

const ALL: [MimeType; 17] = [
    MimeType::Unknown,
    MimeType::Html,
    MimeType::Plain,
    MimeType::Css,
    MimeType::Markdown,
    MimeType::Png,
    MimeType::Jpeg,
    MimeType::Gif,
    MimeType::Svg,
    MimeType::WebP,
    MimeType::Ico,
    MimeType::Woff,
    MimeType::Woff2,
    MimeType::Ttf,
    MimeType::Otf,
    MimeType::Eot,
    MimeType::Json,
];

impl MimeType {
    /// Canonical media-type string (Content-Type value)
    pub fn media_type(&self) -> &'static str {
        match self {
            MimeType::Unknown => "application/octet-stream",
            MimeType::Html => "text/html",
            MimeType::Plain => "text/plain",
            MimeType::Css => "text/css",
            MimeType::Markdown => "text/markdown",
            MimeType::Png => "image/png",
            MimeType::Jpeg => "image/jpeg",
            MimeType::Gif => "image/gif",
            MimeType::Svg => "image/svg+xml",
            MimeType::WebP => "image/webp",
            MimeType::Ico => "image/x-icon",
            MimeType::Woff => "font/woff",
            MimeType::Woff2 => "font/woff2",
            MimeType::Ttf => "font/ttf",
            MimeType::Otf => "font/otf",
            MimeType::Eot => "application/vnd.ms-fontobject",
            MimeType::Json => "application/json",
        }
    }

    /// Stable id stored in cache records
    pub fn id(&self) -> u32 {
        *self as u32
    }

    /// Look up a variant by its stable id
    pub fn from_id(id: u32) -> Option<Self> {
        ALL.get(id as usize).copied()
    }

    /// Map a file extension (without the dot, any case) to a media type
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "html" | "htm" => MimeType::Html,
            "txt" | "text" => MimeType::Plain,
            "css" => MimeType::Css,
            "md" | "markdown" => MimeType::Markdown,
            "png" => MimeType::Png,
            "jpg" | "jpeg" => MimeType::Jpeg,
            "gif" => MimeType::Gif,
            "svg" => MimeType::Svg,
            "webp" => MimeType::WebP,
            "ico" => MimeType::Ico,
            "woff" => MimeType::Woff,
            "woff2" => MimeType::Woff2,
            "ttf" => MimeType::Ttf,
            "otf" => MimeType::Otf,
            "eot" => MimeType::Eot,
            "json" => MimeType::Json,
            _ => MimeType::Unknown,
        }
    }

    /// Media type for a file path, by extension
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(MimeType::Unknown)
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_stable_and_unique() {
        for (index, mime) in ALL.iter().enumerate() {
            assert_eq!(mime.id() as usize, index);
            assert_eq!(MimeType::from_id(mime.id()), Some(*mime));
        }
        assert_eq!(MimeType::from_id(ALL.len() as u32), None);
    }

    #[test]
    fn test_from_extension_is_case_insensitive() {
        assert_eq!(MimeType::from_extension("HTML"), MimeType::Html);
        assert_eq!(MimeType::from_extension("Jpg"), MimeType::Jpeg);
        assert_eq!(MimeType::from_extension("woff2"), MimeType::Woff2);
    }

    #[test]
    fn test_unknown_extension_is_octet_stream() {
        let mime = MimeType::from_extension("exe");
        assert_eq!(mime, MimeType::Unknown);
        assert_eq!(mime.media_type(), "application/octet-stream");
    }

    #[test]
    fn test_from_path() {
        assert_eq!(MimeType::from_path(Path::new("a/b.txt")), MimeType::Plain);
        assert_eq!(MimeType::from_path(Path::new("a/README")), MimeType::Unknown);
        assert_eq!(MimeType::from_path(Path::new("logo.svg")).to_string(), "image/svg+xml");
    }
}
