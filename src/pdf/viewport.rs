/// Relación entre un bitmap renderizado sin rotación y el espacio de la página.
///
/// En PDF el eje Y crece hacia arriba; en el dispositivo, hacia abajo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageViewport {
    pub page_width: f64,
    pub page_height: f64,
    pub bitmap_width: u32,
    pub bitmap_height: u32,
}

impl PageViewport {
    pub fn device_to_page(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if self.bitmap_width == 0 || self.bitmap_height == 0 {
            return None;
        }
        let scale_x = self.page_width / f64::from(self.bitmap_width);
        let scale_y = self.page_height / f64::from(self.bitmap_height);
        Some((x * scale_x, self.page_height - y * scale_y))
    }

    pub fn page_to_device(&self, x: f64, y: f64) -> Option<(i32, i32)> {
        if self.page_width <= 0.0 || self.page_height <= 0.0 {
            return None;
        }
        let scale_x = f64::from(self.bitmap_width) / self.page_width;
        let scale_y = f64::from(self.bitmap_height) / self.page_height;
        Some(((x * scale_x).round() as i32, ((self.page_height - y) * scale_y).round() as i32))
    }
}
