use std::path::Path;

use candle_core::{Device, Tensor};

use crate::data_utils::dataset::{check_index, Dataset};
use crate::data_utils::image_folder::open_image;
use crate::data_utils::manifest::{Manifest, Record};
use crate::data_utils::split::Split;
use crate::data_utils::tokenizer::Tokenizer;
use crate::data_utils::transform::{ImageTransform, Pipeline, Resolution};
use crate::error::Result;

#[derive(Clone, Debug)]
pub struct TextImageSample {
    /// Token ids of the caption.
    pub caption: Tensor,
    /// `(3, height, width)` image tensor.
    pub image: Tensor,
}

impl TextImageSample {
    pub const KEYS: [&'static str; 2] = ["caption", "image"];

    /// Tensors in `KEYS` order.
    pub fn into_tensors(self) -> Vec<Tensor> {
        vec![self.caption, self.image]
    }
}

/// Image/caption pairs listed in `{folder}/{split}_list.txt` (CC3M layout).
///
/// Every `get` re-reads and re-decodes the image; nothing is cached.
pub struct TextImageDataset<K, T = Pipeline> {
    manifest: Manifest,
    tokenizer: K,
    transform: T,
}

impl<K, T> TextImageDataset<K, T>
where
    K: Tokenizer,
    T: ImageTransform,
{
    pub fn new<P>(folder: P, split: Split, tokenizer: K, transform: T) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let manifest = Manifest::load(folder, split)?;
        Ok(Self::from_manifest(manifest, tokenizer, transform))
    }

    pub fn from_manifest(manifest: Manifest, tokenizer: K, transform: T) -> Self {
        Self {
            manifest,
            tokenizer,
            transform,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn record(&self, index: usize) -> Option<&Record> {
        self.manifest.get(index)
    }

    pub fn tokenizer(&self) -> &K {
        &self.tokenizer
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }
}

impl<K: Tokenizer> TextImageDataset<K, Pipeline> {
    /// `train_list.txt` with shortest-side resize and a random crop.
    pub fn train<P, R>(folder: P, tokenizer: K, resolution: R) -> Result<Self>
    where
        P: AsRef<Path>,
        R: Into<Resolution>,
    {
        Self::train_on(folder, tokenizer, resolution, Device::Cpu)
    }

    /// Images are built on `device`. Captions stay wherever the tokenizer
    /// puts them, so pair this with [`HfTokenizer::with_device`] when
    /// `device` is not the CPU.
    ///
    /// [`HfTokenizer::with_device`]: crate::HfTokenizer::with_device
    pub fn train_on<P, R>(folder: P, tokenizer: K, resolution: R, device: Device) -> Result<Self>
    where
        P: AsRef<Path>,
        R: Into<Resolution>,
    {
        let transform = Pipeline::train(resolution.into(), device)?;
        Self::new(folder, Split::Train, tokenizer, transform)
    }

    /// `val_list.txt` with shortest-side resize and a center crop.
    pub fn validation<P, R>(folder: P, tokenizer: K, resolution: R) -> Result<Self>
    where
        P: AsRef<Path>,
        R: Into<Resolution>,
    {
        Self::validation_on(folder, tokenizer, resolution, Device::Cpu)
    }

    /// Same device rules as [`TextImageDataset::train_on`].
    pub fn validation_on<P, R>(
        folder: P,
        tokenizer: K,
        resolution: R,
        device: Device,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
        R: Into<Resolution>,
    {
        let transform = Pipeline::validation(resolution.into(), device)?;
        Self::new(folder, Split::Val, tokenizer, transform)
    }
}

impl<K, T> Dataset for TextImageDataset<K, T>
where
    K: Tokenizer,
    T: ImageTransform,
{
    type Item = TextImageSample;

    fn len(&self) -> usize {
        self.manifest.len()
    }

    fn get(&self, index: usize) -> Result<TextImageSample> {
        check_index(index, self.len())?;
        let record = &self.manifest.records()[index];
        let image = self.transform.apply(open_image(&record.path)?)?;
        let caption = self.tokenizer.tokenize(&record.caption)?;
        Ok(TextImageSample { caption, image })
    }
}
