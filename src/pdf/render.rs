use std::path::Path;

use image::{ImageResult, Rgba, RgbaImage};
use log::{debug, error};

use super::engine::{BitmapFormat, PdfEngine, PixelRect, RenderFlags, Rotation, Scoped};
use super::error::PdfError;

/// Fondo opaco blanco en ARGB.
pub const OPAQUE_WHITE: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub background: u32,
    pub rotation: Rotation,
    pub flags: RenderFlags,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            background: OPAQUE_WHITE,
            rotation: Rotation::None,
            flags: RenderFlags::ANNOTATIONS | RenderFlags::LCD_TEXT,
        }
    }
}

/// Página rasterizada lista para pantalla: un `u32` ARGB por píxel, fila a fila, sin padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl RenderedPage {
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    /// Copia en RGBA8, el formato que espera la textura de wgpu y el codificador PNG.
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let [a, r, g, b] = self.pixel(x, y).unwrap_or(0).to_be_bytes();
            Rgba([r, g, b, a])
        })
    }

    pub fn save_png(&self, path: &Path) -> ImageResult<()> {
        self.to_rgba_image().save_with_format(path, image::ImageFormat::Png)
    }
}

/// Tamaño del bitmap que cabe en `max_width × max_height` conservando el aspecto de la página.
///
/// Un eje coincide con su límite y el otro se trunca hacia abajo.
pub fn fit_within(
    page_width: f64,
    page_height: f64,
    max_width: i32,
    max_height: i32,
) -> Result<(i32, i32), PdfError> {
    if max_width <= 0 || max_height <= 0 {
        return Err(PdfError::InvalidDimensions { width: max_width, height: max_height });
    }
    if page_height == 0.0 || !page_height.is_finite() || !page_width.is_finite() {
        return Err(PdfError::RenderFailure(format!(
            "page has unusable intrinsic size {page_width}x{page_height}"
        )));
    }

    let aspect_ratio = page_width / page_height;
    let mut width = max_width;
    let mut height = (f64::from(max_width) / aspect_ratio) as i32;

    if height > max_height {
        height = max_height;
        width = (f64::from(max_height) * aspect_ratio) as i32;
    }

    if width <= 0 || height <= 0 {
        return Err(PdfError::InvalidDimensions { width, height });
    }
    Ok((width, height))
}

/// Reordena un buffer BGRA del motor a píxeles ARGB empaquetados.
///
/// Cada fila empieza en `y * stride`; los bytes de alineación del final se ignoran.
pub fn bgra_to_argb(buffer: &[u8], width: usize, height: usize, stride: usize) -> Result<Vec<u32>, PdfError> {
    if stride < width * 4 {
        return Err(PdfError::RenderFailure(format!(
            "bitmap stride {stride} is narrower than {width} BGRA pixels"
        )));
    }
    if buffer.len() < stride * height {
        return Err(PdfError::RenderFailure(format!(
            "bitmap buffer holds {} bytes, expected at least {}",
            buffer.len(),
            stride * height
        )));
    }

    let mut pixels = Vec::with_capacity(width * height);
    for row in buffer.chunks(stride.max(1)).take(height) {
        for px in row[..width * 4].chunks_exact(4) {
            let (b, g, r, a) = (px[0], px[1], px[2], px[3]);
            pixels.push(u32::from_be_bytes([a, r, g, b]));
        }
    }
    Ok(pixels)
}

/// Rasteriza una página ya validada. Página y bitmap se liberan en cualquier salida.
pub(crate) fn rasterize<E: PdfEngine>(
    engine: &E,
    document: &E::Document,
    index: i32,
    max_width: i32,
    max_height: i32,
    options: &RenderOptions,
) -> Result<RenderedPage, PdfError> {
    if max_width <= 0 || max_height <= 0 {
        return Err(PdfError::InvalidDimensions { width: max_width, height: max_height });
    }

    // 1. Página
    let page = engine.load_page(document, index).ok_or(PdfError::PageLoad { index })?;
    let page = Scoped::new(engine, page, E::close_page);

    // 2. Dimensiones del bitmap
    let page_width = engine.page_width(&page);
    let page_height = engine.page_height(&page);
    let (width, height) = fit_within(page_width, page_height, max_width, max_height)?;
    debug!("page {index}: {page_width:.2}x{page_height:.2} pts -> {width}x{height} px");

    // 3. Bitmap nativo BGRA
    let bitmap = engine
        .create_bitmap(width, height, BitmapFormat::Bgra)
        .ok_or(PdfError::BitmapAllocation { width, height })?;
    let mut bitmap = Scoped::new(engine, bitmap, E::destroy_bitmap);

    // 4. Fondo: las páginas con transparencia no deben dejar ver memoria sin inicializar
    let viewport = PixelRect::sized(width, height);
    if !engine.fill_rect(&mut bitmap, viewport, options.background) {
        error!("background fill failed for page {index}");
        return Err(PdfError::RenderFailure(format!("background fill failed for page {index}")));
    }

    // 5. Render. La conversión del paso 6 lee BGRA, así que nunca pedimos RGBA
    let flags = options.flags - RenderFlags::REVERSE_BYTE_ORDER;
    if !engine.render_page(&mut bitmap, &page, viewport, options.rotation, flags) {
        error!("engine failed to render page {index}");
        return Err(PdfError::RenderFailure(format!("engine failed to render page {index}")));
    }

    // 6. BGRA -> ARGB
    let stride = engine.bitmap_stride(&bitmap);
    let buffer = engine.bitmap_buffer(&bitmap);
    let pixels = bgra_to_argb(&buffer, width as usize, height as usize, stride)?;

    Ok(RenderedPage { width: width as u32, height: height as u32, pixels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fake::FakeEngine;

    #[test]
    fn letter_page_into_default_box() {
        // 1080 / (612 / 792) = 1397.6 -> 1397
        assert_eq!(fit_within(612.0, 792.0, 1080, 1920).unwrap(), (1080, 1397));
    }

    #[test]
    fn wide_page_is_bounded_by_height() {
        let (w, h) = fit_within(792.0, 612.0, 2000, 500).unwrap();
        assert_eq!(h, 500);
        assert_eq!(w, (500.0 * 792.0 / 612.0) as i32);
    }

    #[test]
    fn fits_on_one_axis_and_keeps_aspect() {
        let pages = [(612.0, 792.0), (792.0, 612.0), (100.0, 100.0), (595.0, 842.0), (1.0, 300.0)];
        let boxes = [(1080, 1920), (1920, 1080), (300, 300), (1, 1000), (1000, 3), (123, 457)];
        for &(pw, ph) in &pages {
            for &(mw, mh) in &boxes {
                let ratio = pw / ph;
                match fit_within(pw, ph, mw, mh) {
                    Ok((w, h)) => {
                        assert!(w <= mw && h <= mh, "{w}x{h} outside {mw}x{mh}");
                        assert!(w == mw || h == mh, "{w}x{h} touches no bound of {mw}x{mh}");
                        assert!((f64::from(w) - f64::from(h) * ratio).abs() <= ratio.max(1.0));
                    }
                    Err(PdfError::InvalidDimensions { .. }) => {}
                    Err(other) => panic!("unexpected error {other}"),
                }
            }
        }
    }

    #[test]
    fn non_positive_box_is_rejected() {
        assert!(matches!(fit_within(612.0, 792.0, 0, 100), Err(PdfError::InvalidDimensions { .. })));
        assert!(matches!(fit_within(612.0, 792.0, 100, -1), Err(PdfError::InvalidDimensions { .. })));
    }

    #[test]
    fn zero_height_page_is_a_render_failure() {
        assert!(matches!(fit_within(612.0, 0.0, 100, 100), Err(PdfError::RenderFailure(_))));
    }

    #[test]
    fn byte_order_conversion_keeps_channels() {
        // Muestreo de combinaciones de canales
        let samples: Vec<[u8; 4]> = (0u32..4096)
            .map(|i| {
                let v = i.wrapping_mul(2_654_435_761);
                v.to_le_bytes()
            })
            .chain([[0, 0, 0, 0], [255, 255, 255, 255], [1, 2, 3, 4]])
            .collect();
        let buffer: Vec<u8> = samples.iter().flatten().copied().collect();
        let pixels = bgra_to_argb(&buffer, samples.len(), 1, samples.len() * 4).unwrap();

        for (px, [b, g, r, a]) in pixels.iter().zip(&samples) {
            assert_eq!((px >> 24) as u8, *a);
            assert_eq!((px >> 16) as u8, *r);
            assert_eq!((px >> 8) as u8, *g);
            assert_eq!(*px as u8, *b);
        }
    }

    #[test]
    fn conversion_skips_row_padding() {
        // 2x2 con 4 bytes de relleno por fila
        let buffer = [
            1, 2, 3, 4, 5, 6, 7, 8, 0xEE, 0xEE, 0xEE, 0xEE, //
            9, 10, 11, 12, 13, 14, 15, 16, 0xEE, 0xEE, 0xEE, 0xEE,
        ];
        let pixels = bgra_to_argb(&buffer, 2, 2, 12).unwrap();
        assert_eq!(pixels, vec![0x0403_0201, 0x0807_0605, 0x0C0B_0A09, 0x100F_0E0D]);
    }

    #[test]
    fn short_buffer_is_fatal() {
        let buffer = [0u8; 15];
        assert!(matches!(bgra_to_argb(&buffer, 2, 2, 8), Err(PdfError::RenderFailure(_))));
        assert!(matches!(bgra_to_argb(&[0u8; 64], 4, 2, 8), Err(PdfError::RenderFailure(_))));
    }

    #[test]
    fn rgba_image_reorders_channels() {
        let page = RenderedPage { width: 1, height: 1, pixels: vec![0x80FF_4020] };
        let image = page.to_rgba_image();
        assert_eq!(image.get_pixel(0, 0).0, [0xFF, 0x40, 0x20, 0x80]);
    }

    #[test]
    fn rasterize_fills_background_and_converts() {
        let engine = FakeEngine::with_pages(&[(100.0, 50.0)]).padded(12);
        let document = engine.open_memory_document(b"%PDF-1.4".to_vec(), None).unwrap();

        let page = rasterize(&engine, &document, 0, 40, 40, &RenderOptions::default()).unwrap();
        assert_eq!((page.width, page.height), (40, 20));

        let [b, g, r, a] = FakeEngine::pattern(3, 7);
        assert_eq!(page.pixel(3, 7), Some(u32::from_be_bytes([a, r, g, b])));
        // La mitad derecha no la pinta el motor falso
        assert_eq!(page.pixel(39, 19), Some(OPAQUE_WHITE));

        let calls = engine.calls();
        let (viewport, rotation, flags) = calls.last_render.unwrap();
        assert_eq!(viewport, PixelRect::sized(40, 20));
        assert_eq!(rotation, Rotation::None);
        assert_eq!(flags, RenderFlags::ANNOTATIONS | RenderFlags::LCD_TEXT);
        assert_eq!(calls.page_closes, 1);
        assert_eq!(calls.bitmaps_destroyed, 1);
    }

    #[test]
    fn custom_background_shows_through_unpainted_pixels() {
        let engine = FakeEngine::letter(1);
        let document = engine.open_memory_document(b"%PDF".to_vec(), None).unwrap();
        let options = RenderOptions { background: 0xFF00_0000, ..RenderOptions::default() };

        let page = rasterize(&engine, &document, 0, 100, 100, &options).unwrap();
        assert_eq!(page.pixel(page.width - 1, 0), Some(0xFF00_0000));
        assert_eq!(page.pixel(page.width, 0), None);
    }

    #[test]
    fn reverse_byte_order_is_never_requested() {
        let engine = FakeEngine::with_pages(&[(100.0, 100.0)]);
        let document = engine.open_memory_document(b"%PDF".to_vec(), None).unwrap();
        let options = RenderOptions {
            flags: RenderFlags::ANNOTATIONS | RenderFlags::REVERSE_BYTE_ORDER,
            ..RenderOptions::default()
        };

        let page = rasterize(&engine, &document, 0, 10, 10, &options).unwrap();
        let (_, _, flags) = engine.calls().last_render.unwrap();
        assert_eq!(flags, RenderFlags::ANNOTATIONS);
        // Rojo y azul en su sitio
        let [b, g, r, a] = FakeEngine::pattern(2, 1);
        assert_eq!(page.pixel(2, 1), Some(u32::from_be_bytes([a, r, g, b])));
    }

    #[test]
    fn handles_are_released_on_every_failure() {
        let cases = [
            FakeEngine::letter(1).failing_bitmap(),
            FakeEngine::letter(1).failing_render(),
            FakeEngine::letter(1).short_buffer(),
        ];
        for engine in cases {
            let document = engine.open_memory_document(b"%PDF".to_vec(), None).unwrap();
            let err = rasterize(&engine, &document, 0, 100, 100, &RenderOptions::default()).unwrap_err();
            let calls = engine.calls();
            assert_eq!(calls.page_loads, calls.page_closes, "{err}");
            assert_eq!(calls.bitmaps_created - usize::from(matches!(err, PdfError::BitmapAllocation { .. })), calls.bitmaps_destroyed);
        }
    }

    #[test]
    fn page_load_failure_allocates_nothing() {
        let engine = FakeEngine::letter(1).failing_page_load();
        let document = engine.open_memory_document(b"%PDF".to_vec(), None).unwrap();
        let err = rasterize(&engine, &document, 0, 100, 100, &RenderOptions::default()).unwrap_err();
        assert!(matches!(err, PdfError::PageLoad { index: 0 }));
        assert_eq!(engine.calls().bitmaps_created, 0);
    }

    #[test]
    fn degenerate_box_never_touches_the_engine() {
        let engine = FakeEngine::letter(1);
        let document = engine.open_memory_document(b"%PDF".to_vec(), None).unwrap();
        let before = engine.calls().total();
        let err = rasterize(&engine, &document, 0, 0, 100, &RenderOptions::default()).unwrap_err();
        assert!(matches!(err, PdfError::InvalidDimensions { width: 0, height: 100 }));
        assert_eq!(engine.calls().total(), before);
    }
}
