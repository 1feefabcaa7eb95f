//! Motor de pruebas: documentos guionizados y contadores de llamadas.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use super::engine::{BitmapFormat, PdfEngine, PixelRect, RenderFlags, Rotation};

pub const ERR_FORMAT: u32 = 3;
pub const ERR_PASSWORD: u32 = 4;

/// Un archivo es "PDF" para el motor falso si empieza por esta cabecera.
pub const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub opens: usize,
    pub closes: usize,
    pub page_loads: usize,
    pub page_closes: usize,
    pub bitmaps_created: usize,
    pub bitmaps_destroyed: usize,
    pub fills: usize,
    pub renders: usize,
    pub size_queries: usize,
    pub last_render: Option<(PixelRect, Rotation, RenderFlags)>,
}

impl Calls {
    pub fn total(&self) -> usize {
        self.opens + self.page_loads + self.bitmaps_created + self.fills + self.renders + self.size_queries
    }
}

pub struct FakeDocument {
    id: usize,
}

pub struct FakePage {
    width: f64,
    height: f64,
}

pub struct FakeBitmap {
    width: usize,
    height: usize,
    stride: usize,
    data: Vec<u8>,
}

pub struct FakeEngine {
    pages: Vec<(f64, f64)>,
    password: Option<String>,
    version: Option<i32>,
    permissions: u32,
    padding: usize,
    fail_page_load: bool,
    fail_bitmap: bool,
    fail_render: bool,
    short_buffer: bool,
    last_error: Cell<u32>,
    next_id: Cell<usize>,
    live: RefCell<HashSet<usize>>,
    calls: RefCell<Calls>,
}

impl FakeEngine {
    pub fn with_pages(pages: &[(f64, f64)]) -> Self {
        Self {
            pages: pages.to_vec(),
            password: None,
            version: Some(17),
            permissions: u32::MAX,
            padding: 0,
            fail_page_load: false,
            fail_bitmap: false,
            fail_render: false,
            short_buffer: false,
            last_error: Cell::new(0),
            next_id: Cell::new(1),
            live: RefCell::new(HashSet::new()),
            calls: RefCell::new(Calls::default()),
        }
    }

    pub fn letter(count: usize) -> Self {
        Self::with_pages(&vec![(612.0, 792.0); count])
    }

    /// Bytes extra al final de cada fila para ejercitar el stride.
    pub fn padded(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn protected(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_version(mut self, version: Option<i32>) -> Self {
        self.version = version;
        self
    }

    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn failing_page_load(mut self) -> Self {
        self.fail_page_load = true;
        self
    }

    pub fn failing_bitmap(mut self) -> Self {
        self.fail_bitmap = true;
        self
    }

    pub fn failing_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    pub fn short_buffer(mut self) -> Self {
        self.short_buffer = true;
        self
    }

    pub fn calls(&self) -> Calls {
        self.calls.borrow().clone()
    }

    pub fn live_documents(&self) -> usize {
        self.live.borrow().len()
    }

    /// Píxel BGRA que el render falso escribe en (x, y).
    pub fn pattern(x: usize, y: usize) -> [u8; 4] {
        [(x % 256) as u8, (y % 256) as u8, 0x80, 0xFF]
    }

    fn admit(&self, bytes: &[u8], password: Option<&str>) -> Option<FakeDocument> {
        self.calls.borrow_mut().opens += 1;
        if !bytes.starts_with(PDF_MAGIC) {
            self.last_error.set(ERR_FORMAT);
            return None;
        }
        if self.password.is_some() && self.password.as_deref() != password {
            self.last_error.set(ERR_PASSWORD);
            return None;
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.live.borrow_mut().insert(id);
        self.last_error.set(0);
        Some(FakeDocument { id })
    }
}

impl PdfEngine for FakeEngine {
    type Document = FakeDocument;
    type Page = FakePage;
    type Bitmap = FakeBitmap;

    fn open_document(&self, path: &Path, password: Option<&str>) -> Option<FakeDocument> {
        let bytes = fs::read(path).unwrap_or_default();
        self.admit(&bytes, password)
    }

    fn open_memory_document(&self, bytes: Vec<u8>, password: Option<&str>) -> Option<FakeDocument> {
        self.admit(&bytes, password)
    }

    fn last_error(&self) -> u32 {
        self.last_error.get()
    }

    fn close_document(&self, document: FakeDocument) {
        self.calls.borrow_mut().closes += 1;
        self.live.borrow_mut().remove(&document.id);
    }

    fn file_version(&self, _document: &FakeDocument) -> Option<i32> {
        self.version
    }

    fn permissions(&self, _document: &FakeDocument) -> u32 {
        self.permissions
    }

    fn page_count(&self, _document: &FakeDocument) -> i32 {
        self.pages.len() as i32
    }

    fn page_size(&self, _document: &FakeDocument, index: i32) -> Option<(f64, f64)> {
        self.calls.borrow_mut().size_queries += 1;
        usize::try_from(index).ok().and_then(|i| self.pages.get(i).copied())
    }

    fn load_page(&self, _document: &FakeDocument, index: i32) -> Option<FakePage> {
        self.calls.borrow_mut().page_loads += 1;
        if self.fail_page_load {
            return None;
        }
        let (width, height) = usize::try_from(index).ok().and_then(|i| self.pages.get(i).copied())?;
        Some(FakePage { width, height })
    }

    fn close_page(&self, _page: FakePage) {
        self.calls.borrow_mut().page_closes += 1;
    }

    fn page_width(&self, page: &FakePage) -> f64 {
        page.width
    }

    fn page_height(&self, page: &FakePage) -> f64 {
        page.height
    }

    fn create_bitmap(&self, width: i32, height: i32, format: BitmapFormat) -> Option<FakeBitmap> {
        self.calls.borrow_mut().bitmaps_created += 1;
        if self.fail_bitmap || width <= 0 || height <= 0 {
            return None;
        }
        let (width, height) = (width as usize, height as usize);
        let stride = width * format.bytes_per_pixel() + self.padding;
        Some(FakeBitmap { width, height, stride, data: vec![0; stride * height] })
    }

    fn destroy_bitmap(&self, _bitmap: FakeBitmap) {
        self.calls.borrow_mut().bitmaps_destroyed += 1;
    }

    fn fill_rect(&self, bitmap: &mut FakeBitmap, rect: PixelRect, color: u32) -> bool {
        self.calls.borrow_mut().fills += 1;
        let [a, r, g, b] = color.to_be_bytes();
        for y in rect.y.max(0) as usize..(rect.y + rect.height).max(0) as usize {
            for x in rect.x.max(0) as usize..(rect.x + rect.width).max(0) as usize {
                if x < bitmap.width && y < bitmap.height {
                    let offset = y * bitmap.stride + x * 4;
                    bitmap.data[offset..offset + 4].copy_from_slice(&[b, g, r, a]);
                }
            }
        }
        true
    }

    fn render_page(
        &self,
        bitmap: &mut FakeBitmap,
        _page: &FakePage,
        viewport: PixelRect,
        rotation: Rotation,
        flags: RenderFlags,
    ) -> bool {
        {
            let mut calls = self.calls.borrow_mut();
            calls.renders += 1;
            calls.last_render = Some((viewport, rotation, flags));
        }
        if self.fail_render {
            return false;
        }
        // Solo la mitad izquierda: el resto debe conservar el fondo.
        for y in 0..bitmap.height {
            for x in 0..bitmap.width / 2 {
                let offset = y * bitmap.stride + x * 4;
                let mut px = Self::pattern(x, y);
                if flags.contains(RenderFlags::REVERSE_BYTE_ORDER) {
                    px.swap(0, 2);
                }
                bitmap.data[offset..offset + 4].copy_from_slice(&px);
            }
        }
        true
    }

    fn bitmap_buffer<'b>(&self, bitmap: &'b FakeBitmap) -> Cow<'b, [u8]> {
        if self.short_buffer {
            let len = bitmap.data.len().saturating_sub(1);
            Cow::Borrowed(&bitmap.data[..len])
        } else {
            Cow::Borrowed(&bitmap.data)
        }
    }

    fn bitmap_stride(&self, bitmap: &FakeBitmap) -> usize {
        bitmap.stride
    }
}

/// Archivo temporal con cabecera PDF válida para el motor falso.
pub fn pdf_file(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"%PDF-1.7\n%fake\n").expect("write fake pdf");
    path
}
