//! Resolución del archivo del modelo.
//!
//! En escritorio el modelo vive en un directorio de assets empaquetados. En
//! plataformas donde los assets solo son accesibles por URL, se descarga una
//! vez y se guarda en caché antes del primer uso.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use log::info;
use thiserror::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset no encontrado: {0:?}")]
    NotFound(PathBuf),

    #[error("Error descargando {url}: {message}")]
    Http { url: String, message: String },

    #[error("Error de IO en {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .build()
    })
}

/// Dónde buscar los assets
#[derive(Debug, Clone)]
pub enum AssetSource {
    /// Directorio local con los assets empaquetados
    Bundled(PathBuf),
    /// URL base; el asset se descarga a `cache_dir` la primera vez
    Remote { base_url: String, cache_dir: PathBuf },
}

pub struct AssetLocator {
    source: AssetSource,
}

impl AssetLocator {
    pub fn new(source: AssetSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &AssetSource {
        &self.source
    }

    /// Devuelve una ruta local legible para el asset `name`.
    /// Los fallos no se reintentan.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, AssetError> {
        match &self.source {
            AssetSource::Bundled(dir) => {
                let path = dir.join(name);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(AssetError::NotFound(path))
                }
            }
            AssetSource::Remote {
                base_url,
                cache_dir,
            } => {
                let cached = cache_dir.join(name);
                if cached.is_file() {
                    return Ok(cached);
                }
                let url = format!("{}/{}", base_url.trim_end_matches('/'), name);
                fetch_to_path(&url, &cached)?;
                Ok(cached)
            }
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> AssetError {
    let path = path.to_path_buf();
    move |source| AssetError::Io { path, source }
}

fn fetch_to_path(url: &str, dest: &Path) -> Result<(), AssetError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let response = agent().get(url).call().map_err(|err| AssetError::Http {
        url: url.to_string(),
        message: err.to_string(),
    })?;

    store_asset(&mut response.into_reader(), dest)?;
    info!("📥 Asset descargado: {} -> {}", url, dest.display());
    Ok(())
}

/// Escribe a un temporal junto a `dest` y lo renombra; si algo falla, el
/// temporal se borra y en caché no queda nada a medias
fn store_asset(reader: &mut impl Read, dest: &Path) -> Result<(), AssetError> {
    let tmp = dest.with_extension("tmp");
    let result = write_then_rename(reader, &tmp, dest);
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_then_rename(reader: &mut impl Read, tmp: &Path, dest: &Path) -> Result<(), AssetError> {
    let mut file = File::create(tmp).map_err(io_error(tmp))?;
    io::copy(reader, &mut file).map_err(io_error(tmp))?;
    file.flush().map_err(io_error(tmp))?;
    fs::rename(tmp, dest).map_err(io_error(dest))
}
