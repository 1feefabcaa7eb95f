use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

use super::engine::{DocPermissions, PdfEngine};
use super::error::{ErrorCode, PdfError};
use super::render::{rasterize, RenderOptions, RenderedPage};

/// Tamaño intrínseco de una página, en puntos (1/72").
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

struct OpenDocument<D> {
    handle: D,
    origin: String,
    path: Option<PathBuf>,
    page_count: i32,
    file_version: Option<i32>,
    permissions: DocPermissions,
}

fn version_label(version: Option<i32>) -> String {
    version.map_or_else(|| "unknown".to_string(), |v| format!("{}.{}", v / 10, v % 10))
}

/// Dueña del único documento abierto.
///
/// Abrir otro documento cierra antes el anterior; `close` es idempotente y el
/// `Drop` devuelve el handle al motor.
pub struct DocumentSession<E: PdfEngine> {
    engine: E,
    document: Option<OpenDocument<E::Document>>,
    options: RenderOptions,
}

impl<E: PdfEngine> DocumentSession<E> {
    pub fn new(engine: E) -> Self {
        Self { engine, document: None, options: RenderOptions::default() }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn set_render_options(&mut self, options: RenderOptions) {
        self.options = options;
    }

    pub fn open(&mut self, path: &Path) -> Result<(), PdfError> {
        self.open_with_password(path, None)
    }

    pub fn open_with_password(&mut self, path: &Path, password: Option<&str>) -> Result<(), PdfError> {
        // Validamos el archivo antes de tocar el motor
        check_readable(path).map_err(|source| {
            warn!("rejecting {}: {source}", path.display());
            PdfError::FileAccess { path: path.to_path_buf(), source }
        })?;
        debug!("opening {} ({} bytes)", path.display(), fs::metadata(path).map(|m| m.len()).unwrap_or(0));

        self.close();
        let origin = path.display().to_string();
        let handle = self.engine.open_document(path, password);
        self.adopt(handle, origin, Some(path.to_path_buf()))
    }

    /// Abre un documento desde memoria (el equivalente a `FPDF_LoadMemDocument`).
    pub fn open_bytes(&mut self, bytes: Vec<u8>, password: Option<&str>) -> Result<(), PdfError> {
        let origin = format!("<memory: {} bytes>", bytes.len());
        if bytes.is_empty() {
            warn!("refusing to open an empty buffer");
            return Err(PdfError::DocumentLoad { origin, code: ErrorCode::File });
        }

        self.close();
        let handle = self.engine.open_memory_document(bytes, password);
        self.adopt(handle, origin, None)
    }

    fn adopt(&mut self, handle: Option<E::Document>, origin: String, path: Option<PathBuf>) -> Result<(), PdfError> {
        let Some(handle) = handle else {
            let code = ErrorCode::from_raw(self.engine.last_error());
            error!("failed to load PDF. code {}: {code} ({origin})", code.raw());
            return Err(PdfError::DocumentLoad { origin, code });
        };

        let page_count = self.engine.page_count(&handle).max(0);
        let file_version = self.engine.file_version(&handle);
        let permissions = DocPermissions::from_bits_retain(self.engine.permissions(&handle));
        info!("PDF {} loaded: {page_count} pages ({origin})", version_label(file_version));
        debug!("permissions {permissions:?}");
        self.document = Some(OpenDocument { handle, origin, path, page_count, file_version, permissions });
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.document.is_some()
    }

    /// Ruta del documento abierto; `None` si no hay documento o vino de memoria.
    pub fn path(&self) -> Option<&Path> {
        self.document.as_ref().and_then(|d| d.path.as_deref())
    }

    pub fn origin(&self) -> Option<&str> {
        self.document.as_ref().map(|d| d.origin.as_str())
    }

    pub fn page_count(&self) -> i32 {
        self.document.as_ref().map_or(0, |d| d.page_count)
    }

    /// Versión de la cabecera (17 para PDF 1.7).
    pub fn file_version(&self) -> Option<i32> {
        self.document.as_ref().and_then(|d| d.file_version)
    }

    /// Permisos del documento; vacío si no hay ninguno abierto.
    pub fn permissions(&self) -> DocPermissions {
        self.document.as_ref().map_or(DocPermissions::empty(), |d| d.permissions)
    }

    /// Fuera de rango devuelve 0×0 en lugar de fallar; `render_page` sí valida.
    pub fn page_size(&self, index: i32) -> PageSize {
        let Some(document) = self.document.as_ref() else {
            return PageSize::default();
        };
        if index < 0 || index >= document.page_count {
            return PageSize::default();
        }
        self.engine
            .page_size(&document.handle, index)
            .map(|(width, height)| PageSize { width, height })
            .unwrap_or_default()
    }

    pub fn render_page(&self, index: i32, max_width: i32, max_height: i32) -> Result<RenderedPage, PdfError> {
        let page_count = self.page_count();
        let document = match self.document.as_ref() {
            Some(document) if (0..page_count).contains(&index) => document,
            _ => return Err(PdfError::InvalidPageIndex { index, page_count }),
        };
        rasterize(&self.engine, &document.handle, index, max_width, max_height, &self.options)
    }

    pub fn close(&mut self) {
        if let Some(document) = self.document.take() {
            info!("closing {}", document.origin);
            self.engine.close_document(document.handle);
        }
    }
}

impl<E: PdfEngine> Drop for DocumentSession<E> {
    fn drop(&mut self) {
        self.close();
    }
}

fn check_readable(path: &Path) -> io::Result<()> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"));
    }
    File::open(path).map(drop)
}
