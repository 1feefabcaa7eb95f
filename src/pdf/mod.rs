pub mod engine;
pub mod error;
pub mod import;
pub mod pdfium;
pub mod render;
pub mod session;
pub mod viewport;

#[cfg(test)]
pub(crate) mod fake;

use std::path::Path;

use log::info;
use pdfium_render::prelude::*;

pub use engine::{BitmapFormat, DocPermissions, PdfEngine, PixelRect, RenderFlags, Rotation};
pub use error::{ErrorCode, PdfError};
pub use pdfium::PdfiumEngine;
pub use render::{fit_within, RenderOptions, RenderedPage};
pub use session::{DocumentSession, PageSize};
pub use viewport::PageViewport;

/// Instancia de PDFium del proceso.
///
/// Se crea una vez al arrancar (`FPDF_InitLibrary`) y se cierra una vez al
/// salir (`FPDF_DestroyLibrary`); todos los motores la toman prestada.
pub struct PdfSystem {
    library: Pdfium,
}

impl PdfSystem {
    /// Enlaza la librería: primero `library_dir` si viene dado, si no `./` y luego la del sistema.
    pub fn init(library_dir: Option<&Path>) -> Result<Self, PdfError> {
        let bindings = match library_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(PdfError::LibraryBinding)?;

        let library = Pdfium::new(bindings);
        info!("PDFium initialised");
        Ok(Self { library })
    }

    pub fn engine(&self) -> PdfiumEngine<'_> {
        PdfiumEngine::new(&self.library)
    }

    pub fn shutdown(self) {
        drop(self.library);
        info!("PDFium destroyed");
    }
}
