use std::borrow::Cow;
use std::cell::Cell;
use std::fs;
use std::path::Path;

use log::{debug, warn};
use pdfium_render::prelude::*;

use super::engine::{BitmapFormat, PdfEngine, PixelRect, RenderFlags, Rotation};
use super::error::ErrorCode;

/// Bitmap de PDFium más el color de fondo pendiente.
///
/// pdfium-render limpia el bitmap con el `clear_color` de la configuración
/// justo antes de `FPDF_RenderPageBitmap`, así que `fill_rect` solo lo anota.
pub struct PdfiumBitmap<'a> {
    bitmap: PdfBitmap<'a>,
    background: u32,
}

/// Motor de producción: PDFium a través de los bindings dinámicos de pdfium-render.
pub struct PdfiumEngine<'a> {
    pdfium: &'a Pdfium,
    // Errores de E/S propios, que PDFium no llega a ver
    io_error: Cell<Option<u32>>,
}

impl<'a> PdfiumEngine<'a> {
    pub fn new(pdfium: &'a Pdfium) -> Self {
        Self { pdfium, io_error: Cell::new(None) }
    }

    fn load(&self, bytes: Vec<u8>, password: Option<&str>) -> Option<PdfDocument<'a>> {
        let pdfium: &'a Pdfium = self.pdfium;
        match pdfium.load_pdf_from_byte_vec(bytes, password) {
            Ok(document) => Some(document),
            Err(err) => {
                debug!("FPDF_LoadMemDocument failed: {err:?}");
                None
            }
        }
    }
}

fn page_index(index: i32) -> Option<PdfPageIndex> {
    PdfPageIndex::try_from(index).ok()
}

fn argb_to_color(color: u32) -> PdfColor {
    let [a, r, g, b] = color.to_be_bytes();
    PdfColor::new(r, g, b, a)
}

/// Lo que el visor pide a `FPDF_RenderPageBitmap`, antes de traducirlo a `PdfRenderConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RenderSettings {
    width: i32,
    height: i32,
    rotation: Rotation,
    flags: RenderFlags,
    background: u32,
}

impl RenderSettings {
    /// `PdfRenderConfig::new()` activa `FPDF_REVERSE_BYTE_ORDER` por defecto; aquí se
    /// quita porque el buffer se lee como BGRA.
    fn new(viewport: PixelRect, rotation: Rotation, flags: RenderFlags, background: u32) -> Self {
        Self {
            width: viewport.width,
            height: viewport.height,
            rotation,
            flags: flags - RenderFlags::REVERSE_BYTE_ORDER,
            background,
        }
    }

    fn to_config(self) -> PdfRenderConfig {
        let rotation = match self.rotation {
            Rotation::None => PdfPageRenderRotation::None,
            Rotation::Degrees90 => PdfPageRenderRotation::Degrees90,
            Rotation::Degrees180 => PdfPageRenderRotation::Degrees180,
            Rotation::Degrees270 => PdfPageRenderRotation::Degrees270,
        };

        PdfRenderConfig::new()
            .set_target_size(self.width, self.height)
            .rotate(rotation, false)
            .set_clear_color(argb_to_color(self.background))
            .render_annotations(self.flags.contains(RenderFlags::ANNOTATIONS))
            .use_lcd_text_rendering(self.flags.contains(RenderFlags::LCD_TEXT))
            .use_grayscale_rendering(self.flags.contains(RenderFlags::GRAYSCALE))
            .set_reverse_byte_order(self.flags.contains(RenderFlags::REVERSE_BYTE_ORDER))
    }
}

impl<'a> PdfEngine for PdfiumEngine<'a> {
    type Document = PdfDocument<'a>;
    type Page = PdfPage<'a>;
    type Bitmap = PdfiumBitmap<'a>;

    // pdfium-render ata la contraseña de `load_pdf_from_file` a la vida de la
    // librería; desde memoria solo la usa durante la carga.
    fn open_document(&self, path: &Path, password: Option<&str>) -> Option<PdfDocument<'a>> {
        self.io_error.set(None);
        match fs::read(path) {
            Ok(bytes) => self.load(bytes, password),
            Err(err) => {
                warn!("cannot read {}: {err}", path.display());
                self.io_error.set(Some(ErrorCode::File.raw()));
                None
            }
        }
    }

    fn open_memory_document(&self, bytes: Vec<u8>, password: Option<&str>) -> Option<PdfDocument<'a>> {
        self.io_error.set(None);
        self.load(bytes, password)
    }

    fn last_error(&self) -> u32 {
        self.io_error.get().unwrap_or_else(|| self.pdfium.bindings().FPDF_GetLastError() as u32)
    }

    fn close_document(&self, document: PdfDocument<'a>) {
        debug!("FPDF_CloseDocument");
        drop(document);
    }

    fn file_version(&self, document: &PdfDocument<'a>) -> Option<i32> {
        match document.version() {
            PdfDocumentVersion::Unset => None,
            PdfDocumentVersion::Pdf1_0 => Some(10),
            PdfDocumentVersion::Pdf1_1 => Some(11),
            PdfDocumentVersion::Pdf1_2 => Some(12),
            PdfDocumentVersion::Pdf1_3 => Some(13),
            PdfDocumentVersion::Pdf1_4 => Some(14),
            PdfDocumentVersion::Pdf1_5 => Some(15),
            PdfDocumentVersion::Pdf1_6 => Some(16),
            PdfDocumentVersion::Pdf1_7 => Some(17),
            PdfDocumentVersion::Pdf2_0 => Some(20),
            PdfDocumentVersion::Other(version) => Some(version),
        }
    }

    fn permissions(&self, document: &PdfDocument<'a>) -> u32 {
        // PdfPermissions solo expone permisos ya interpretados; queremos la palabra cruda.
        let bindings = self.pdfium.bindings();
        bindings.FPDF_GetDocPermissions(bindings.get_handle_from_document(document)) as u32
    }

    fn page_count(&self, document: &PdfDocument<'a>) -> i32 {
        i32::from(document.pages().len())
    }

    fn page_size(&self, document: &PdfDocument<'a>, index: i32) -> Option<(f64, f64)> {
        let rect = document.pages().page_size(page_index(index)?).ok()?;
        Some((f64::from(rect.width().value), f64::from(rect.height().value)))
    }

    fn load_page(&self, document: &PdfDocument<'a>, index: i32) -> Option<PdfPage<'a>> {
        match document.pages().get(page_index(index)?) {
            Ok(page) => Some(page),
            Err(err) => {
                warn!("FPDF_LoadPage({index}) failed: {err:?}");
                None
            }
        }
    }

    fn close_page(&self, page: PdfPage<'a>) {
        drop(page);
    }

    fn page_width(&self, page: &PdfPage<'a>) -> f64 {
        f64::from(page.width().value)
    }

    fn page_height(&self, page: &PdfPage<'a>) -> f64 {
        f64::from(page.height().value)
    }

    fn create_bitmap(&self, width: i32, height: i32, format: BitmapFormat) -> Option<PdfiumBitmap<'a>> {
        let format = match format {
            BitmapFormat::Bgra => PdfBitmapFormat::BGRA,
        };
        let pdfium: &'a Pdfium = self.pdfium;
        match PdfBitmap::empty(width, height, format, pdfium.bindings()) {
            Ok(bitmap) => Some(PdfiumBitmap { bitmap, background: super::render::OPAQUE_WHITE }),
            Err(err) => {
                warn!("FPDFBitmap_CreateEx({width}x{height}) failed: {err:?}");
                None
            }
        }
    }

    fn destroy_bitmap(&self, bitmap: PdfiumBitmap<'a>) {
        drop(bitmap);
    }

    fn fill_rect(&self, bitmap: &mut PdfiumBitmap<'a>, rect: PixelRect, color: u32) -> bool {
        // Solo rellenos completos: es lo único que el clear_color puede expresar.
        if !rect.covers(bitmap.bitmap.width(), bitmap.bitmap.height()) {
            warn!("partial fill {rect:?} is not supported");
            return false;
        }
        bitmap.background = color;
        true
    }

    fn render_page(
        &self,
        bitmap: &mut PdfiumBitmap<'a>,
        page: &PdfPage<'a>,
        viewport: PixelRect,
        rotation: Rotation,
        flags: RenderFlags,
    ) -> bool {
        if viewport.x != 0 || viewport.y != 0 {
            warn!("render origin must be (0, 0), got ({}, {})", viewport.x, viewport.y);
            return false;
        }

        let config = RenderSettings::new(viewport, rotation, flags, bitmap.background).to_config();
        match page.render_into_bitmap_with_config(&mut bitmap.bitmap, &config) {
            Ok(()) => true,
            Err(err) => {
                warn!("FPDF_RenderPageBitmap failed: {err:?}");
                false
            }
        }
    }

    fn bitmap_buffer<'b>(&self, bitmap: &'b PdfiumBitmap<'a>) -> Cow<'b, [u8]> {
        Cow::Owned(bitmap.bitmap.as_raw_bytes())
    }

    fn bitmap_stride(&self, bitmap: &PdfiumBitmap<'a>) -> usize {
        let bindings = self.pdfium.bindings();
        let stride = bindings.FPDFBitmap_GetStride(bindings.get_handle_from_bitmap(&bitmap.bitmap));
        usize::try_from(stride).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_always_ask_for_bgra() {
        let flags = RenderFlags::ANNOTATIONS | RenderFlags::LCD_TEXT | RenderFlags::REVERSE_BYTE_ORDER;
        let settings = RenderSettings::new(PixelRect::sized(1080, 1397), Rotation::None, flags, 0xFFFF_FFFF);

        assert!(!settings.flags.contains(RenderFlags::REVERSE_BYTE_ORDER));
        assert_eq!(settings.flags, RenderFlags::ANNOTATIONS | RenderFlags::LCD_TEXT);
        assert_eq!((settings.width, settings.height), (1080, 1397));
    }

    #[test]
    fn settings_keep_rotation_and_background() {
        let settings =
            RenderSettings::new(PixelRect::sized(10, 20), Rotation::Degrees90, RenderFlags::GRAYSCALE, 0x8011_2233);
        assert_eq!(settings.rotation, Rotation::Degrees90);
        assert_eq!(settings.flags, RenderFlags::GRAYSCALE);
        assert_eq!(settings.background, 0x8011_2233);
    }

    #[test]
    fn argb_maps_to_pdf_color_channels() {
        let color = argb_to_color(0x8011_2233);
        assert_eq!((color.alpha(), color.red(), color.green(), color.blue()), (0x80, 0x11, 0x22, 0x33));
    }
}
