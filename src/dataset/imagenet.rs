use std::path::Path;

use candle_core::{Device, Tensor};

use crate::data_utils::dataset::{check_index, Dataset};
use crate::data_utils::image_folder::{ImageCatalog, ImageFolder};
use crate::data_utils::split::Split;
use crate::data_utils::transform::{ImageTransform, Pipeline, Resolution};
use crate::error::Result;

#[derive(Clone, Debug)]
pub struct LabeledSample {
    /// `(3, height, width)` image tensor.
    pub image: Tensor,
    /// `u32` class index, shape `(1,)`.
    pub class: Tensor,
}

impl LabeledSample {
    pub const KEYS: [&'static str; 2] = ["image", "class"];

    /// Tensors in `KEYS` order.
    pub fn into_tensors(self) -> Vec<Tensor> {
        vec![self.image, self.class]
    }
}

/// Class-labeled images from an [`ImageCatalog`] (ImageNet layout by default).
pub struct LabeledImageDataset<C = ImageFolder, T = Pipeline> {
    catalog: C,
    transform: T,
    device: Device,
}

impl<C, T> LabeledImageDataset<C, T>
where
    C: ImageCatalog,
    T: ImageTransform,
{
    /// Labels are placed on `device`; the image device is the transform's choice.
    pub fn from_catalog(catalog: C, transform: T, device: Device) -> Self {
        Self {
            catalog,
            transform,
            device,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    pub fn class_names(&self) -> &[String] {
        self.catalog.class_names()
    }

    pub fn num_classes(&self) -> usize {
        self.catalog.num_classes()
    }
}

impl LabeledImageDataset<ImageFolder, Pipeline> {
    /// `{root}/train` with resize, random crop and random horizontal flip.
    pub fn train<P, R>(root: P, resolution: R) -> Result<Self>
    where
        P: AsRef<Path>,
        R: Into<Resolution>,
    {
        Self::train_on(root, resolution, Device::Cpu)
    }

    pub fn train_on<P, R>(root: P, resolution: R, device: Device) -> Result<Self>
    where
        P: AsRef<Path>,
        R: Into<Resolution>,
    {
        let transform = Pipeline::train_flipped(resolution.into(), device.clone())?;
        let catalog = ImageFolder::split(root, Split::Train)?;
        Ok(Self::from_catalog(catalog, transform, device))
    }

    /// `{root}/val` with resize and center crop.
    pub fn validation<P, R>(root: P, resolution: R) -> Result<Self>
    where
        P: AsRef<Path>,
        R: Into<Resolution>,
    {
        Self::validation_on(root, resolution, Device::Cpu)
    }

    pub fn validation_on<P, R>(root: P, resolution: R, device: Device) -> Result<Self>
    where
        P: AsRef<Path>,
        R: Into<Resolution>,
    {
        let transform = Pipeline::validation(resolution.into(), device.clone())?;
        let catalog = ImageFolder::split(root, Split::Val)?;
        Ok(Self::from_catalog(catalog, transform, device))
    }
}

impl<C, T> Dataset for LabeledImageDataset<C, T>
where
    C: ImageCatalog,
    T: ImageTransform,
{
    type Item = LabeledSample;

    fn len(&self) -> usize {
        self.catalog.len()
    }

    fn get(&self, index: usize) -> Result<LabeledSample> {
        check_index(index, self.len())?;
        let (raw, label) = self.catalog.get(index)?;
        let image = self.transform.apply(raw)?;
        let class = Tensor::from_vec(vec![label as u32], 1, &self.device)?;
        Ok(LabeledSample { image, class })
    }
}
