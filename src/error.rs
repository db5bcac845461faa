use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read manifest {path}: {source}")]
    ManifestIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed manifest {path} at line {line}: {reason}")]
    MalformedManifest {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("cannot read catalog directory {path}: {source}")]
    CatalogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no class directories found in {0}")]
    NoClasses(PathBuf),
    #[error("class directory name is not valid UTF-8: {0}")]
    InvalidClassName(PathBuf),
    #[error("no images found in {0}")]
    NoImages(PathBuf),
    #[error("invalid resolution {height}x{width}, both sides must be positive")]
    InvalidResolution { height: u32, width: u32 },
    #[error("unknown split {0:?}, expected \"train\" or \"val\"")]
    UnknownSplit(String),
    #[error("crop {crop_height}x{crop_width} does not fit image {height}x{width}")]
    CropOutOfBounds {
        crop_height: u32,
        crop_width: u32,
        height: u32,
        width: u32,
    },
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("cannot decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("tokenizer error: {0}")]
    Tokenizer(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("hub error: {0}")]
    Hub(String),
    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

impl Error {
    /// Errors raised while building a dataset, before any access.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::ManifestIo { .. }
                | Error::MalformedManifest { .. }
                | Error::CatalogIo { .. }
                | Error::NoClasses(_)
                | Error::InvalidClassName(_)
                | Error::NoImages(_)
                | Error::InvalidResolution { .. }
                | Error::UnknownSplit(_)
        )
    }
}
