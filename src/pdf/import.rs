use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;

/// Nombre de la copia temporal que abre el motor.
pub const STAGED_FILE_NAME: &str = "imported.pdf";

/// Copia el documento elegido a la caché de la aplicación y devuelve la ruta de la copia.
///
/// Cada importación sobrescribe la anterior.
pub fn stage_copy<R: Read>(mut source: R, cache_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(cache_dir)?;
    let target = cache_dir.join(STAGED_FILE_NAME);

    let mut out = BufWriter::new(File::create(&target)?);
    let copied = io::copy(&mut source, &mut out)?;
    out.flush()?;

    debug!("staged {copied} bytes at {}", target.display());
    Ok(target)
}

/// Variante para rutas del sistema de archivos (archivos arrastrados a la ventana).
pub fn stage_file(path: &Path, cache_dir: &Path) -> io::Result<PathBuf> {
    let source = File::open(path)?;
    // Copiar la copia sobre sí misma la truncaría
    let target = cache_dir.join(STAGED_FILE_NAME);
    if let (Ok(a), Ok(b)) = (fs::canonicalize(path), fs::canonicalize(&target)) {
        if a == b {
            return Ok(target);
        }
    }
    stage_copy(source, cache_dir)
}
