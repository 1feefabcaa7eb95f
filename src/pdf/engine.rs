//! Frontera con el motor PDF nativo.
//!
//! El trait replica las llamadas de PDFium que usa el visor. Los handles son
//! tipos asociados: valores propios, solo movibles, que vuelven al motor por
//! `close_document`/`close_page`/`destroy_bitmap`.

use std::borrow::Cow;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use bitflags::bitflags;

/// Formato de píxel de los bitmaps del motor. El visor solo pide BGRA (`FPDFBitmap_BGRA`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapFormat {
    Bgra = 4,
}

impl BitmapFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Degrees90,
    Degrees180,
    Degrees270,
}

bitflags! {
    /// Flags de `FPDF_RenderPageBitmap`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RenderFlags: i32 {
        const ANNOTATIONS = 0x01;
        const LCD_TEXT = 0x02;
        const GRAYSCALE = 0x08;
        /// PDFium escribe RGBA en lugar de BGRA. El pipeline nunca lo pide.
        const REVERSE_BYTE_ORDER = 0x10;
    }
}

bitflags! {
    /// Bits de `FPDF_GetDocPermissions` (tabla 22 de ISO 32000-1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DocPermissions: u32 {
        const PRINT = 1 << 2;
        const MODIFY = 1 << 3;
        const COPY = 1 << 4;
        const ANNOTATE = 1 << 5;
        const FILL_FORMS = 1 << 8;
        const EXTRACT_FOR_ACCESSIBILITY = 1 << 9;
        const ASSEMBLE = 1 << 10;
        const PRINT_HIGH_QUALITY = 1 << 11;
    }
}

/// Rectángulo en píxeles del dispositivo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    pub fn sized(width: i32, height: i32) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    pub fn covers(&self, width: i32, height: i32) -> bool {
        self.x <= 0 && self.y <= 0 && self.x + self.width >= width && self.y + self.height >= height
    }
}

pub trait PdfEngine {
    type Document;
    type Page;
    type Bitmap;

    /// `None` si el motor rechaza el documento; el motivo queda en `last_error`.
    fn open_document(&self, path: &Path, password: Option<&str>) -> Option<Self::Document>;
    fn open_memory_document(&self, bytes: Vec<u8>, password: Option<&str>) -> Option<Self::Document>;
    fn last_error(&self) -> u32;
    fn close_document(&self, document: Self::Document);

    /// Versión de cabecera (14 para PDF 1.4); `None` si el archivo no la declara.
    fn file_version(&self, document: &Self::Document) -> Option<i32>;
    /// Palabra de permisos cruda; sin cifrado PDFium devuelve todos los bits a 1.
    fn permissions(&self, document: &Self::Document) -> u32;

    fn page_count(&self, document: &Self::Document) -> i32;
    fn page_size(&self, document: &Self::Document, index: i32) -> Option<(f64, f64)>;

    fn load_page(&self, document: &Self::Document, index: i32) -> Option<Self::Page>;
    fn close_page(&self, page: Self::Page);
    fn page_width(&self, page: &Self::Page) -> f64;
    fn page_height(&self, page: &Self::Page) -> f64;

    fn create_bitmap(&self, width: i32, height: i32, format: BitmapFormat) -> Option<Self::Bitmap>;
    fn destroy_bitmap(&self, bitmap: Self::Bitmap);
    /// `color` en ARGB (`0xAARRGGBB`).
    fn fill_rect(&self, bitmap: &mut Self::Bitmap, rect: PixelRect, color: u32) -> bool;
    fn render_page(
        &self,
        bitmap: &mut Self::Bitmap,
        page: &Self::Page,
        viewport: PixelRect,
        rotation: Rotation,
        flags: RenderFlags,
    ) -> bool;
    fn bitmap_buffer<'b>(&self, bitmap: &'b Self::Bitmap) -> Cow<'b, [u8]>;
    fn bitmap_stride(&self, bitmap: &Self::Bitmap) -> usize;
}

/// Handle con liberación al salir de alcance.
///
/// Garantiza que páginas y bitmaps vuelvan al motor en cualquier camino de
/// salida, incluidos los `?` de error.
pub(crate) struct Scoped<'e, E: PdfEngine, T> {
    engine: &'e E,
    value: Option<T>,
    release: fn(&E, T),
}

impl<'e, E: PdfEngine, T> Scoped<'e, E, T> {
    pub(crate) fn new(engine: &'e E, value: T, release: fn(&E, T)) -> Self {
        Self { engine, value: Some(value), release }
    }
}

impl<E: PdfEngine, T> Deref for Scoped<'_, E, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Solo Drop vacía el Option.
        self.value.as_ref().unwrap_or_else(|| unreachable!("scoped handle already released"))
    }
}

impl<E: PdfEngine, T> DerefMut for Scoped<'_, E, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().unwrap_or_else(|| unreachable!("scoped handle already released"))
    }
}

impl<E: PdfEngine, T> Drop for Scoped<'_, E, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            (self.release)(self.engine, value);
        }
    }
}
