//! Static file handlers.
//!
//! [`share_file`] serves one file; [`share_directory`] serves a tree under
//! a mount prefix. Both stream through the raw body writer, so the payload
//! never sits in memory whole; the size goes out as an explicit
//! `Content-Length` header read from file metadata, and the connection
//! closes after the body.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mime::Mime;

use crate::codec::BodyWriter;
use crate::handler::{HandlerResult, HttpHandler};
use crate::protocol::{HttpResponse, Request, ResponseHeaders};

/// A handler that serves the one file at `path`, 404 when it is missing.
pub fn share_file(path: impl Into<PathBuf>) -> FileHandler {
    FileHandler { path: path.into() }
}

/// A handler serving files under `root` for request paths under `mount`.
///
/// The mount prefix is stripped from the request path and the remainder
/// resolved inside `root`. Directory hits try `index.html` then
/// `default.html`. Paths with a `..` segment are refused outright.
pub fn share_directory(mount: &str, root: impl Into<PathBuf>) -> DirectoryHandler {
    DirectoryHandler {
        mount: format!("/{}", mount.trim_matches('/')),
        root: root.into(),
        defaults: vec!["index.html".to_string(), "default.html".to_string()],
    }
}

pub struct FileHandler {
    path: PathBuf,
}

#[async_trait]
impl HttpHandler for FileHandler {
    async fn handle(&self, _request: &Request, headers: &mut ResponseHeaders) -> HandlerResult {
        serve_path(&self.path, headers).await
    }
}

pub struct DirectoryHandler {
    mount: String,
    root: PathBuf,
    defaults: Vec<String>,
}

impl DirectoryHandler {
    /// Replaces the file names tried when a request resolves to a
    /// directory.
    pub fn with_defaults(mut self, defaults: Vec<String>) -> Self {
        self.defaults = defaults;
        self
    }

    fn relative_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.mount == "/" {
            return Some(path.trim_start_matches('/'));
        }
        match path.strip_prefix(self.mount.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                Some(rest.trim_start_matches('/'))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl HttpHandler for DirectoryHandler {
    async fn handle(&self, request: &Request, headers: &mut ResponseHeaders) -> HandlerResult {
        let Some(relative) = self.relative_path(request.path()) else {
            return Ok(HttpResponse::NotFound);
        };
        if relative.split('/').any(|segment| segment == "..") {
            return Ok(HttpResponse::NotFound);
        }

        let target = self.root.join(relative);
        match tokio::fs::metadata(&target).await {
            Ok(metadata) if metadata.is_dir() => {
                for name in &self.defaults {
                    let candidate = target.join(name);
                    match tokio::fs::metadata(&candidate).await {
                        Ok(metadata) if metadata.is_file() => {
                            return serve_path(&candidate, headers).await;
                        }
                        _ => {}
                    }
                }
                Ok(HttpResponse::NotFound)
            }
            Ok(_) => serve_path(&target, headers).await,
            Err(_) => Ok(HttpResponse::NotFound),
        }
    }
}

async fn serve_path(path: &Path, headers: &mut ResponseHeaders) -> HandlerResult {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Ok(HttpResponse::NotFound),
    };

    headers.add("Content-Type", mime_for(path).as_ref());
    headers.add("Content-Length", metadata.len().to_string());

    let path = path.to_path_buf();
    Ok(HttpResponse::raw_stream(
        200,
        "OK",
        move |mut writer: BodyWriter<'_>| {
            let path = path.clone();
            Box::pin(async move {
                let mut file = tokio::fs::File::open(&path).await?;
                writer.write_file(&mut file).await
            })
        },
    ))
}

fn mime_for(path: &Path) -> Mime {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => mime::TEXT_HTML,
        Some("css") => mime::TEXT_CSS,
        Some("js" | "mjs") => mime::TEXT_JAVASCRIPT,
        Some("json") => mime::APPLICATION_JSON,
        Some("xml") => mime::TEXT_XML,
        Some("txt" | "md" | "log") => mime::TEXT_PLAIN,
        Some("csv") => mime::TEXT_CSV,
        Some("png") => mime::IMAGE_PNG,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("svg") => mime::IMAGE_SVG,
        Some("bmp") => mime::IMAGE_BMP,
        Some("pdf") => mime::APPLICATION_PDF,
        Some("woff") => mime::FONT_WOFF,
        Some("woff2") => mime::FONT_WOFF2,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}
