use winit::keyboard::KeyCode;

/// Acción de navegación pedida desde la barra o el teclado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    PreviousPage,
    NextPage,
    FirstPage,
    LastPage,
}

/// Barra inferior de navegación: mitad izquierda atrás, mitad derecha adelante.
#[derive(Debug, Clone, Copy)]
pub struct NavBar {
    pub height: f64,
}

impl Default for NavBar {
    fn default() -> Self {
        Self { height: 80.0 }
    }
}

impl NavBar {
    // x,y en píxeles de ventana, origen arriba a la izquierda
    pub fn hit_test(&self, x: f64, y: f64, win_width: f64, win_height: f64) -> Option<UiAction> {
        if win_width <= 0.0 || win_height <= 0.0 {
            return None;
        }
        if !self.contains(y, win_height) || x < 0.0 || x > win_width {
            return None;
        }
        if x < win_width / 2.0 {
            Some(UiAction::PreviousPage)
        } else {
            Some(UiAction::NextPage)
        }
    }

    pub fn contains(&self, y: f64, win_height: f64) -> bool {
        y >= win_height - self.height && y <= win_height
    }
}

pub fn action_for_key(key: KeyCode) -> Option<UiAction> {
    match key {
        KeyCode::ArrowLeft | KeyCode::PageUp => Some(UiAction::PreviousPage),
        KeyCode::ArrowRight | KeyCode::PageDown => Some(UiAction::NextPage),
        KeyCode::Home => Some(UiAction::FirstPage),
        KeyCode::End => Some(UiAction::LastPage),
        _ => None,
    }
}
