use std::path::{Path, PathBuf};

use crate::data_utils::split::Split;
use crate::error::{Error, Result};

/// One manifest entry: an image path resolved against the dataset root and
/// its caption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub path: PathBuf,
    pub caption: String,
}

/// Ordered index over a `{split}_list.txt` listing.
///
/// Each line holds `<relative-image-path>\t<caption>`. Line order is the
/// positional order of the dataset.
#[derive(Clone, Debug)]
pub struct Manifest {
    root: PathBuf,
    source: PathBuf,
    records: Vec<Record>,
}

impl Manifest {
    pub fn load<P: AsRef<Path>>(root: P, split: Split) -> Result<Self> {
        let root = root.as_ref();
        let source = root.join(split.list_file_name());
        let content = std::fs::read_to_string(&source).map_err(|e| Error::ManifestIo {
            path: source.clone(),
            source: e,
        })?;
        let manifest = Self::parse(root, &source, &content)?;
        log::info!(
            "indexed {} records from {}",
            manifest.len(),
            manifest.source.display()
        );
        Ok(manifest)
    }

    /// Parses listing text read from `source`, resolving paths against `root`.
    pub fn parse<P, S>(root: P, source: S, content: &str) -> Result<Self>
    where
        P: AsRef<Path>,
        S: AsRef<Path>,
    {
        let root = root.as_ref().to_path_buf();
        let source = source.as_ref().to_path_buf();
        let records = content
            .lines()
            .enumerate()
            .map(|(i, line)| {
                parse_line(&root, line).map_err(|reason| Error::MalformedManifest {
                    path: source.clone(),
                    line: i + 1,
                    reason,
                })
            })
            .collect::<Result<Vec<Record>>>()?;
        Ok(Self {
            root,
            source,
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the listing file this manifest was parsed from.
    pub fn source(&self) -> &Path {
        &self.source
    }
}

fn parse_line(root: &Path, line: &str) -> std::result::Result<Record, String> {
    let line = line.trim_end();
    let Some((path, caption)) = line.split_once('\t') else {
        return Err("missing tab separator".to_string());
    };
    if caption.contains('\t') {
        return Err("expected exactly two tab-separated fields".to_string());
    }
    if path.is_empty() {
        return Err("empty image path".to_string());
    }
    Ok(Record {
        path: root.join(path),
        caption: caption.to_string(),
    })
}
