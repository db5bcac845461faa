use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::data_utils::split::Split;
use crate::error::{Error, Result};

/// A class-labeled image collection.
pub trait ImageCatalog: Send + Sync {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Decodes the image at `index` and returns it with its class index.
    fn get(&self, index: usize) -> Result<(DynamicImage, usize)>;
    fn class_names(&self) -> &[String];
    fn num_classes(&self) -> usize {
        self.class_names().len()
    }
}

const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp", "ppm"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Directory-per-class catalog:
///
/// ```text
/// root/
///   n01440764/
///     a.JPEG
///   n01443537/
///     b.JPEG
/// ```
///
/// Classes are the sorted subdirectory names; images are collected
/// recursively and sorted within each class.
#[derive(Clone, Debug)]
pub struct ImageFolder {
    root: PathBuf,
    class_names: Vec<String>,
    entries: Vec<(PathBuf, usize)>,
}

impl ImageFolder {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut class_dirs: Vec<(String, PathBuf)> = Vec::new();
        for entry in read_dir(&root)? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                return Err(Error::InvalidClassName(path));
            };
            class_dirs.push((name.to_string(), path));
        }
        if class_dirs.is_empty() {
            return Err(Error::NoClasses(root));
        }
        class_dirs.sort();

        let mut entries = Vec::new();
        for (class_index, (_, dir)) in class_dirs.iter().enumerate() {
            let mut paths = Vec::new();
            collect_images(dir, &mut paths)?;
            paths.sort();
            entries.extend(paths.into_iter().map(|p| (p, class_index)));
        }
        if entries.is_empty() {
            return Err(Error::NoImages(root));
        }

        let class_names: Vec<String> = class_dirs.into_iter().map(|(name, _)| name).collect();
        log::info!(
            "indexed {} images in {} classes under {}",
            entries.len(),
            class_names.len(),
            root.display()
        );
        Ok(Self {
            root,
            class_names,
            entries,
        })
    }

    /// Opens `{root}/{split}`, the layout used for ImageNet train/val.
    pub fn split<P: AsRef<Path>>(root: P, split: Split) -> Result<Self> {
        Self::new(root.as_ref().join(split.as_str()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn class_to_idx(&self) -> HashMap<&str, usize> {
        self.class_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect()
    }

    pub fn path_of(&self, index: usize) -> Option<&Path> {
        self.entries.get(index).map(|(p, _)| p.as_path())
    }

    pub fn class_of(&self, index: usize) -> Option<usize> {
        self.entries.get(index).map(|(_, c)| *c)
    }
}

impl ImageCatalog for ImageFolder {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, index: usize) -> Result<(DynamicImage, usize)> {
        let (path, class_index) = self.entries.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.entries.len(),
        })?;
        Ok((open_image(path)?, *class_index))
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

/// Decodes an image file, attaching the path to any failure.
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    let image = image::open(path).map_err(|e| Error::ImageDecode {
        path: path.to_path_buf(),
        source: e,
    })?;
    log::debug!("decoded {} ({}x{})", path.display(), image.width(), image.height());
    Ok(image)
}

fn read_dir(dir: &Path) -> Result<Vec<std::fs::DirEntry>> {
    let to_err = |e| Error::CatalogIo {
        path: dir.to_path_buf(),
        source: e,
    };
    std::fs::read_dir(dir)
        .map_err(to_err)?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(to_err)
}

fn collect_images(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in read_dir(dir)? {
        let path = entry.path();
        if path.is_dir() {
            collect_images(&path, out)?;
        } else if is_image(&path) {
            out.push(path);
        }
    }
    Ok(())
}
