//! Lógica del visor sin ventana: página actual, navegación y texto de estado.

use std::path::Path;

use log::{debug, info};

use crate::pdf::{DocumentSession, PageViewport, PdfEngine, PdfError, RenderedPage};

/// Página lista para mostrar junto con su texto de estado.
#[derive(Debug, Clone)]
pub struct Frame {
    pub page: RenderedPage,
    pub status: String,
}

pub struct Viewer<E: PdfEngine> {
    session: DocumentSession<E>,
    current_page: i32,
    surface: (i32, i32),
    fallback: (i32, i32),
    last_size: Option<(u32, u32)>,
}

impl<E: PdfEngine> Viewer<E> {
    pub fn new(session: DocumentSession<E>, fallback: (i32, i32)) -> Self {
        Self { session, current_page: 0, surface: (0, 0), fallback, last_size: None }
    }

    pub fn session(&self) -> &DocumentSession<E> {
        &self.session
    }

    pub fn current_page(&self) -> i32 {
        self.current_page
    }

    /// Tamaño medido de la superficie; 0 en cualquier eje vuelve a la caja por defecto.
    pub fn set_surface_size(&mut self, width: i32, height: i32) {
        self.surface = (width, height);
    }

    pub fn render_box(&self) -> (i32, i32) {
        match self.surface {
            (w, h) if w > 0 && h > 0 => (w, h),
            _ => self.fallback,
        }
    }

    pub fn load(&mut self, path: &Path, password: Option<&str>) -> Result<Frame, PdfError> {
        let opened = self.session.open_with_password(path, password);
        // Si la sesión ya cerró el anterior, su página y su frame dejan de valer
        if opened.is_ok() || !self.session.is_open() {
            self.current_page = 0;
            self.last_size = None;
        }
        opened?;
        if let Some(origin) = self.session.origin() {
            info!("showing {origin}");
        }
        self.render_current()
    }

    pub fn close(&mut self) {
        self.session.close();
        self.current_page = 0;
        self.last_size = None;
    }

    pub fn render_current(&mut self) -> Result<Frame, PdfError> {
        let (width, height) = self.render_box();
        let page = self.session.render_page(self.current_page, width, height)?;
        self.last_size = Some((page.width, page.height));
        debug!("rendered page {} at {}x{}", self.current_page + 1, page.width, page.height);
        Ok(Frame { page, status: self.status_text() })
    }

    pub fn can_go_back(&self) -> bool {
        self.session.is_open() && self.current_page > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.session.is_open() && self.current_page < self.session.page_count() - 1
    }

    /// `None` si no hay documento o la página no existe.
    pub fn go_to(&mut self, index: i32) -> Option<Result<Frame, PdfError>> {
        if !self.session.is_open() || index < 0 || index >= self.session.page_count() {
            return None;
        }
        if index == self.current_page && self.last_size.is_some() {
            return None;
        }
        info!("page {} of {}", index + 1, self.session.page_count());
        self.current_page = index;
        Some(self.render_current())
    }

    pub fn next_page(&mut self) -> Option<Result<Frame, PdfError>> {
        if !self.can_go_forward() {
            return None;
        }
        self.go_to(self.current_page + 1)
    }

    pub fn previous_page(&mut self) -> Option<Result<Frame, PdfError>> {
        if !self.can_go_back() {
            return None;
        }
        self.go_to(self.current_page - 1)
    }

    pub fn first_page(&mut self) -> Option<Result<Frame, PdfError>> {
        self.go_to(0)
    }

    pub fn last_page(&mut self) -> Option<Result<Frame, PdfError>> {
        self.go_to(self.session.page_count() - 1)
    }

    pub fn status_text(&self) -> String {
        let size = self.session.page_size(self.current_page);
        format!(
            "Page {} of {}\nWidth: {:.2} pts\nHeight: {:.2} pts",
            self.current_page + 1,
            self.session.page_count(),
            size.width,
            size.height
        )
    }

    /// Punto de la página bajo un píxel del último frame renderizado.
    pub fn page_point_at(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let (bitmap_width, bitmap_height) = self.last_size?;
        let size = self.session.page_size(self.current_page);
        PageViewport { page_width: size.width, page_height: size.height, bitmap_width, bitmap_height }
            .device_to_page(x, y)
    }
}
