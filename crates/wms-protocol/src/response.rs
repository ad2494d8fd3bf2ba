//! Protocol responses.

use std::io::{self, Write};

use bytes::Bytes;

/// A complete WMS response: one content type, an optional cache directive,
/// and the body bytes.
///
/// Redirect responses (used by the GetFeatureInfo empty-result path) carry a
/// `Location` target instead of a body.
#[derive(Debug, Clone)]
pub struct WmsResponse {
    pub content_type: String,
    pub cache_control: Option<String>,
    pub location: Option<String>,
    pub body: Bytes,
}

impl WmsResponse {
    pub fn new(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            cache_control: None,
            location: None,
            body: body.into(),
        }
    }

    /// An XML document response.
    pub fn xml(content_type: impl Into<String>, document: String) -> Self {
        Self::new(content_type, document.into_bytes())
    }

    /// An HTTP redirect.
    pub fn redirect(url: impl Into<String>) -> Self {
        Self {
            content_type: String::new(),
            cache_control: None,
            location: Some(url.into()),
            body: Bytes::new(),
        }
    }

    pub fn with_cache_control(mut self, directive: impl Into<String>) -> Self {
        self.cache_control = Some(directive.into());
        self
    }

    /// Serialise in CGI form: optional `Cache-Control`, a single
    /// `Content-type:` header, a bare-LF blank line, then the body.
    pub fn write_cgi<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if let Some(url) = &self.location {
            return write!(out, "Location: {}\n\n", url);
        }
        if let Some(directive) = &self.cache_control {
            write!(out, "Cache-Control: {}\n", directive)?;
        }
        write!(out, "Content-type: {}\n\n", self.content_type)?;
        out.write_all(&self.body)
    }
}
