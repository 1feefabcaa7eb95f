use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::PathBuf;

use pdfium_render::prelude::PdfiumError;
use thiserror::Error;

/// Código devuelto por `FPDF_GetLastError`, como enumeración cerrada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success,
    Unknown,
    File,
    Format,
    Password,
    Security,
    Page,
    Other(u32),
}

impl ErrorCode {
    pub fn from_raw(code: u32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::Unknown,
            2 => Self::File,
            3 => Self::Format,
            4 => Self::Password,
            5 => Self::Security,
            6 => Self::Page,
            other => Self::Other(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::Success => 0,
            Self::Unknown => 1,
            Self::File => 2,
            Self::Format => 3,
            Self::Password => 4,
            Self::Security => 5,
            Self::Page => 6,
            Self::Other(code) => code,
        }
    }

    pub fn message(self) -> Cow<'static, str> {
        match self {
            Self::Success => Cow::Borrowed("No error"),
            Self::Unknown => Cow::Borrowed("Unknown error"),
            Self::File => Cow::Borrowed("File cannot be opened or read"),
            Self::Format => Cow::Borrowed("Incorrect or corrupted file format"),
            Self::Password => Cow::Borrowed("Incorrect password"),
            Self::Security => Cow::Borrowed("Unsupported security scheme"),
            Self::Page => Cow::Borrowed("Page not found or content error"),
            Self::Other(code) => Cow::Owned(format!("Error code: {code}")),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("cannot access {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to load PDF: {code} (source: {origin})")]
    DocumentLoad { origin: String, code: ErrorCode },

    #[error("invalid page index {index} (document has {page_count} pages)")]
    InvalidPageIndex { index: i32, page_count: i32 },

    #[error("failed to load page {index}")]
    PageLoad { index: i32 },

    #[error("failed to allocate a {width}x{height} bitmap")]
    BitmapAllocation { width: i32, height: i32 },

    #[error("invalid render dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("render failed: {0}")]
    RenderFailure(String),

    #[error("unable to bind the PDFium library: {0:?}")]
    LibraryBinding(PdfiumError),
}

impl PdfError {
    /// Mensaje del motor para fallos de carga; `None` para el resto.
    pub fn load_message(&self) -> Option<Cow<'static, str>> {
        match self {
            Self::DocumentLoad { code, .. } => Some(code.message()),
            _ => None,
        }
    }
}
