//! Directory listing generator

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Write as _;
use std::path::Path;

/// Renders a listing for a directory without an index file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexGenerator: Send + Sync {
    /// Listing for `absolute`, shown as `relative` (slash-prefixed, trailing
    /// slash). Returns None when the directory cannot be read.
    async fn generate(&self, absolute: &Path, relative: &str) -> Option<Bytes>;
}

/// Plain HTML listing: directories first, then files, each sorted by name
#[derive(Debug, Clone)]
pub struct HtmlIndexGenerator {
    stylesheet: String,
    show_hidden: bool,
}

impl HtmlIndexGenerator {
    /// `system_prefix` locates the built-in stylesheet
    pub fn new(system_prefix: &str, show_hidden: bool) -> Self {
        Self {
            stylesheet: format!("/{}/index.css", system_prefix),
            show_hidden,
        }
    }

    fn render(&self, relative: &str, mut dirs: Vec<String>, mut files: Vec<String>) -> String {
        dirs.sort_by_key(|name| name.to_lowercase());
        files.sort_by_key(|name| name.to_lowercase());

        let title = escape_html(relative);
        let mut html = String::with_capacity(512 + 96 * (dirs.len() + files.len()));
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        let _ = writeln!(html, "<title>Index of {}</title>", title);
        let _ = writeln!(
            html,
            "<link rel=\"stylesheet\" href=\"{}\">",
            escape_html(&self.stylesheet)
        );
        let _ = writeln!(html, "</head>\n<body>\n<h1>Index of {}</h1>\n<ul>", title);

        if relative != "/" {
            html.push_str("<li class=\"parent\"><a href=\"../\">../</a></li>\n");
        }
        for name in &dirs {
            let _ = writeln!(
                html,
                "<li class=\"dir\"><a href=\"{}/\">{}/</a></li>",
                urlencoding::encode(name),
                escape_html(name)
            );
        }
        for name in &files {
            let _ = writeln!(
                html,
                "<li class=\"file\"><a href=\"{}\">{}</a></li>",
                urlencoding::encode(name),
                escape_html(name)
            );
        }
        html.push_str("</ul>\n</body>\n</html>\n");
        html
    }
}

#[async_trait]
impl IndexGenerator for HtmlIndexGenerator {
    async fn generate(&self, absolute: &Path, relative: &str) -> Option<Bytes> {
        let mut entries = match tokio::fs::read_dir(absolute).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(error = %e, "Directory not readable for listing");
                return None;
            }
        };

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "Directory listing interrupted");
                    return None;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.show_hidden && name.starts_with('.') {
                continue;
            }
            match entry.file_type().await {
                Ok(kind) if kind.is_dir() => dirs.push(name),
                Ok(_) => files.push(name),
                Err(_) => continue,
            }
        }

        Some(Bytes::from(self.render(relative, dirs, files)))
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn listing(bytes: &Bytes) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&#39;");
    }

    #[tokio::test]
    async fn test_directories_before_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("A.txt"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("zeta")).unwrap();
        std::fs::write(dir.path().join(".hidden"), b"h").unwrap();

        let generator = HtmlIndexGenerator::new("_cdn", false);
        let html = listing(&generator.generate(dir.path(), "/docs/").await.unwrap());

        let zeta = html.find("zeta/").unwrap();
        let a = html.find("A.txt").unwrap();
        let b = html.find("b.txt").unwrap();
        assert!(zeta < a && a < b);
        assert!(!html.contains(".hidden"));
        assert!(html.contains("Index of /docs/"));
        assert!(html.contains("href=\"../\""));
        assert!(html.contains("/_cdn/index.css"));
    }

    #[tokio::test]
    async fn test_root_has_no_parent_link() {
        let dir = TempDir::new().unwrap();
        let generator = HtmlIndexGenerator::new("_cdn", false);
        let html = listing(&generator.generate(dir.path(), "/").await.unwrap());
        assert!(!html.contains("../"));
    }

    #[tokio::test]
    async fn test_names_are_escaped_and_encoded() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a&b <c>.txt"), b"x").unwrap();
        let generator = HtmlIndexGenerator::new("_cdn", true);
        let html = listing(&generator.generate(dir.path(), "/").await.unwrap());
        assert!(html.contains("a&amp;b &lt;c&gt;.txt"));
        assert!(html.contains("href=\"a%26b%20%3Cc%3E.txt\""));
    }

    #[tokio::test]
    async fn test_unreadable_directory_is_none() {
        let dir = TempDir::new().unwrap();
        let generator = HtmlIndexGenerator::new("_cdn", false);
        assert!(generator
            .generate(&dir.path().join("missing"), "/missing/")
            .await
            .is_none());
    }
}
