//! Random-access image datasets for candle training loops.
//!
//! Two adapters are provided: [`TextImageDataset`] pairs images with
//! tokenized captions read from a `{split}_list.txt` manifest (CC3M layout),
//! and [`LabeledImageDataset`] pairs images with class labels from a
//! directory-per-class catalog (ImageNet layout). Both come with `train` and
//! `validation` constructors that differ only in the injected [`Pipeline`].

pub mod data_utils;
pub mod dataset;
pub mod error;

pub use data_utils::dataset::Dataset;
pub use data_utils::image_folder::{ImageCatalog, ImageFolder};
pub use data_utils::manifest::{Manifest, Record};
pub use data_utils::split::Split;
pub use data_utils::tokenizer::{HfTokenizer, Tokenizer};
pub use data_utils::transform::{ImageTransform, Pipeline, Resolution};
pub use dataset::cc3m::{TextImageDataset, TextImageSample};
pub use dataset::imagenet::{LabeledImageDataset, LabeledSample};
pub use error::{Error, Result};
