//! Built-in assets served under the reserved system prefix

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::cache::CachedEntry;
use crate::mime::MimeType;

const INDEX_STYLESHEET: &str = "\
body { font-family: system-ui, sans-serif; margin: 2rem auto; max-width: 60rem; color: #222; }
h1 { font-size: 1.4rem; font-weight: 600; word-break: break-all; }
ul { list-style: none; padding: 0; }
li { padding: 0.2rem 0; border-bottom: 1px solid #eee; }
li.dir a { font-weight: 600; }
a { color: #0645ad; text-decoration: none; }
a:hover { text-decoration: underline; }
";

const ROBOTS_TXT: &str = "User-agent: *\nDisallow:\n";

/// Resolves names inside the system namespace
pub trait SystemFileReader: Send + Sync {
    /// Asset named `name` (the path after the prefix, without leading `/`)
    fn resolve(&self, name: &str) -> Option<CachedEntry>;
}

/// Assets compiled into the binary
#[derive(Debug, Clone)]
pub struct BuiltinSystemFiles {
    loaded_at: DateTime<Utc>,
}

impl BuiltinSystemFiles {
    pub fn new() -> Self {
        Self {
            loaded_at: Utc::now(),
        }
    }

    fn asset(name: &str) -> Option<(&'static str, MimeType)> {
        match name {
            "index.css" => Some((INDEX_STYLESHEET, MimeType::Css)),
            "robots.txt" => Some((ROBOTS_TXT, MimeType::Plain)),
            _ => None,
        }
    }
}

impl Default for BuiltinSystemFiles {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemFileReader for BuiltinSystemFiles {
    fn resolve(&self, name: &str) -> Option<CachedEntry> {
        let (content, mime_type) = Self::asset(name.trim_start_matches('/'))?;
        Some(CachedEntry::new(
            Bytes::from_static(content.as_bytes()),
            mime_type,
            self.loaded_at,
        ))
    }
}
