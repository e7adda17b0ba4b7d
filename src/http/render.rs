//! Response encoders.
//!
//! An encoder writes a body into an output sink after the status has been
//! committed; a failure is reported to the caller and nothing else.

use std::io::Write;

use serde::Serialize;

use crate::error::RenderError;

pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_XML: &str = "application/xml";
pub const CONTENT_TYPE_STREAM: &str = "application/octet-stream";

pub trait Render {
    fn content_type(&self) -> &'static str;

    fn render(&self, out: &mut dyn Write) -> Result<(), RenderError>;
}

pub struct Text<'a>(pub &'a str);

impl Render for Text<'_> {
    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_TEXT
    }

    fn render(&self, out: &mut dyn Write) -> Result<(), RenderError> {
        out.write_all(self.0.as_bytes())?;
        Ok(())
    }
}

pub struct Html<'a>(pub &'a str);

impl Render for Html<'_> {
    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_HTML
    }

    fn render(&self, out: &mut dyn Write) -> Result<(), RenderError> {
        out.write_all(self.0.as_bytes())?;
        Ok(())
    }
}

pub struct Json<'a, T: ?Sized>(pub &'a T);

impl<T: Serialize + ?Sized> Render for Json<'_, T> {
    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_JSON
    }

    fn render(&self, out: &mut dyn Write) -> Result<(), RenderError> {
        serde_json::to_writer(out, self.0)?;
        Ok(())
    }
}

/// XML body with a configurable root element (`response` by default).
pub struct Xml<'a, T> {
    root: &'a str,
    value: &'a T,
}

impl<'a, T> Xml<'a, T> {
    pub fn new(value: &'a T) -> Self {
        Self {
            root: "response",
            value,
        }
    }

    pub fn root(mut self, root: &'a str) -> Self {
        self.root = root;
        self
    }
}

impl<T: Serialize> Render for Xml<'_, T> {
    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_XML
    }

    fn render(&self, out: &mut dyn Write) -> Result<(), RenderError> {
        let document = quick_xml::se::to_string_with_root(self.root, self.value)
            .map_err(|e| RenderError::Xml(e.to_string()))?;
        out.write_all(document.as_bytes())?;
        Ok(())
    }
}

/// Raw bytes, written chunk by chunk.
pub struct Data<'a>(pub &'a [&'a [u8]]);

impl Render for Data<'_> {
    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_STREAM
    }

    fn render(&self, out: &mut dyn Write) -> Result<(), RenderError> {
        for chunk in self.0 {
            out.write_all(chunk)?;
        }
        Ok(())
    }
}
