//! Static page responder
//!
//! Maps the small fixed set of recognized paths to HTML pages held by a
//! [`ContentStore`]. Unknown paths never reach the store.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use hyper::body::Bytes;
use tracing::error;

/// Content type of every served page
pub const HTML_CONTENT_TYPE: &str = "text/html";

/// Error from a content store
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Page not found: {0}")]
    NotFound(String),

    #[error("Failed to read {page}: {source}")]
    Io {
        page: String,
        source: std::io::Error,
    },
}

/// Pages the responder knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Index,
    Signin,
    Rebill,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Index, Page::Signin, Page::Rebill];

    /// Resolve a request path
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/index.html" => Some(Page::Index),
            "/signin.html" => Some(Page::Signin),
            "/rebill.html" => Some(Page::Rebill),
            _ => None,
        }
    }

    /// Name in the content store
    pub fn name(&self) -> &'static str {
        match self {
            Page::Index => "index.html",
            Page::Signin => "signin.html",
            Page::Rebill => "rebill.html",
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read access to page content by name
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Bytes, ContentError>;
}

/// Pages served from a directory
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait::async_trait]
impl ContentStore for FsContentStore {
    async fn fetch(&self, name: &str) -> Result<Bytes, ContentError> {
        let path = self.root.join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ContentError::NotFound(name.to_string()))
            }
            Err(e) => Err(ContentError::Io {
                page: name.to_string(),
                source: e,
            }),
        }
    }
}

/// Pages held in memory
#[derive(Default)]
pub struct MemoryContentStore {
    pages: HashMap<String, Bytes>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, name: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.pages.insert(name.into(), body.into());
        self
    }
}

#[async_trait::async_trait]
impl ContentStore for MemoryContentStore {
    async fn fetch(&self, name: &str) -> Result<Bytes, ContentError> {
        self.pages
            .get(name)
            .cloned()
            .ok_or_else(|| ContentError::NotFound(name.to_string()))
    }
}

/// Outcome of resolving a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found { page: Page, body: Bytes },
    NotFound,
}

/// Resolves allowed requests to static pages
pub struct StaticResponder {
    store: Arc<dyn ContentStore>,
}

impl StaticResponder {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, path: &str) -> Resolution {
        let Some(page) = Page::from_path(path) else {
            return Resolution::NotFound;
        };

        match self.store.fetch(page.name()).await {
            Ok(body) => Resolution::Found { page, body },
            Err(e) => {
                error!(page = %page, error = %e, "Content fetch failed");
                Resolution::NotFound
            }
        }
    }
}
