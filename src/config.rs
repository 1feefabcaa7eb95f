use std::path::PathBuf;

use clap::Parser;

/// Caja por defecto mientras la superficie aún no tiene tamaño.
pub const DEFAULT_VIEWPORT_WIDTH: i32 = 1080;
pub const DEFAULT_VIEWPORT_HEIGHT: i32 = 1920;

const APP_DIR: &str = "visorpdf";

#[derive(Debug, Parser)]
#[command(name = "visorpdf", version, about = "Visor PDF sobre PDFium, una página a la vez")]
pub struct Args {
    /// Documento PDF a abrir al arrancar
    pub file: Option<PathBuf>,

    /// Contraseña del documento
    #[arg(long)]
    pub password: Option<String>,

    /// Página inicial (empezando en 1)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i32).range(1..))]
    pub page: i32,

    /// Carpeta con la librería compartida de PDFium
    #[arg(long, env = "PDFIUM_LIB_DIR")]
    pub pdfium_dir: Option<PathBuf>,

    /// Carpeta donde se copian los documentos arrastrados a la ventana
    #[arg(long, env = "VISORPDF_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Ancho de la caja de renderizado cuando no hay ventana medida
    #[arg(long, default_value_t = DEFAULT_VIEWPORT_WIDTH)]
    pub width: i32,

    /// Alto de la caja de renderizado cuando no hay ventana medida
    #[arg(long, default_value_t = DEFAULT_VIEWPORT_HEIGHT)]
    pub height: i32,

    /// Renderiza en escala de grises
    #[arg(long)]
    pub grayscale: bool,

    /// Renderiza la página a PNG y sale, sin abrir ventana
    #[arg(long, value_name = "PNG", requires = "file")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub file: Option<PathBuf>,
    pub password: Option<String>,
    /// Índice de página (empezando en 0).
    pub start_page: i32,
    pub pdfium_dir: Option<PathBuf>,
    pub cache_dir: PathBuf,
    pub fallback_viewport: (i32, i32),
    pub grayscale: bool,
    pub export: Option<PathBuf>,
}

impl ViewerConfig {
    pub fn from_args(args: Args) -> Self {
        let cache_dir = args.cache_dir.unwrap_or_else(default_cache_dir);
        Self {
            file: args.file,
            password: args.password,
            start_page: args.page - 1,
            pdfium_dir: args.pdfium_dir,
            cache_dir,
            fallback_viewport: (args.width, args.height),
            grayscale: args.grayscale,
            export: args.export,
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            file: None,
            password: None,
            start_page: 0,
            pdfium_dir: None,
            cache_dir: default_cache_dir(),
            fallback_viewport: (DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT),
            grayscale: false,
            export: None,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join(APP_DIR)
}
