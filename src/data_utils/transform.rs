use std::fmt;

use candle_core::{DType, Device, Tensor};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use rand::{Rng, RngCore};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Target output size. A single integer means a square.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "ResolutionRepr")]
pub struct Resolution {
    pub height: u32,
    pub width: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResolutionRepr {
    Square(u32),
    Pair([u32; 2]),
}

impl From<ResolutionRepr> for Resolution {
    fn from(repr: ResolutionRepr) -> Self {
        match repr {
            ResolutionRepr::Square(side) => side.into(),
            ResolutionRepr::Pair([height, width]) => (height, width).into(),
        }
    }
}

impl Resolution {
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    pub fn shorter_side(&self) -> u32 {
        self.height.min(self.width)
    }

    pub fn validate(self) -> Result<Self> {
        if self.height == 0 || self.width == 0 {
            return Err(Error::InvalidResolution {
                height: self.height,
                width: self.width,
            });
        }
        Ok(self)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(256, 256)
    }
}

impl From<u32> for Resolution {
    fn from(side: u32) -> Self {
        Self::new(side, side)
    }
}

/// `(height, width)`
impl From<(u32, u32)> for Resolution {
    fn from((height, width): (u32, u32)) -> Self {
        Self::new(height, width)
    }
}

/// A single step of a [`Pipeline`].
pub trait Transform: Send + Sync + fmt::Debug {
    fn apply(&self, image: RgbImage, rng: &mut dyn RngCore) -> Result<RgbImage>;

    fn is_random(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropPlacement {
    Random,
    Center,
}

/// Shortest-side resize followed by a crop of exactly `resolution`.
///
/// The crop window is chosen in source coordinates and only that window is
/// resized, so very thin images never produce a huge intermediate buffer.
/// The scale makes the shorter image side match the target's shorter side;
/// for a non-square target it is raised until both target sides are covered.
#[derive(Clone, Copy, Debug)]
pub struct ResizedCrop {
    pub resolution: Resolution,
    pub placement: CropPlacement,
    pub filter: FilterType,
}

impl ResizedCrop {
    pub fn new(resolution: Resolution, placement: CropPlacement) -> Self {
        Self {
            resolution,
            placement,
            filter: FilterType::Triangle,
        }
    }

    /// Size `(width, height)` of the source region that maps onto the target.
    pub fn source_window(&self, width: u32, height: u32) -> (u32, u32) {
        let target = self.resolution;
        let scale = (target.width as f64 / width as f64).max(target.height as f64 / height as f64);
        let window_width = ((target.width as f64 / scale).round() as u32).clamp(1, width);
        let window_height = ((target.height as f64 / scale).round() as u32).clamp(1, height);
        (window_width, window_height)
    }
}

impl Transform for ResizedCrop {
    fn apply(&self, image: RgbImage, rng: &mut dyn RngCore) -> Result<RgbImage> {
        let (width, height) = image.dimensions();
        let (window_width, window_height) = self.source_window(width, height);
        let (max_x, max_y) = (width - window_width, height - window_height);
        let (x, y) = match self.placement {
            CropPlacement::Random => (rng.gen_range(0..=max_x), rng.gen_range(0..=max_y)),
            CropPlacement::Center => (max_x / 2, max_y / 2),
        };
        let window = imageops::crop_imm(&image, x, y, window_width, window_height).to_image();
        let (target_width, target_height) = (self.resolution.width, self.resolution.height);
        if (window_width, window_height) == (target_width, target_height) {
            return Ok(window);
        }
        Ok(imageops::resize(&window, target_width, target_height, self.filter))
    }

    fn is_random(&self) -> bool {
        self.placement == CropPlacement::Random
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RandomCrop {
    pub height: u32,
    pub width: u32,
}

impl RandomCrop {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            height: resolution.height,
            width: resolution.width,
        }
    }
}

impl Transform for RandomCrop {
    fn apply(&self, image: RgbImage, rng: &mut dyn RngCore) -> Result<RgbImage> {
        let (max_x, max_y) = crop_slack(&image, self.height, self.width)?;
        let x = rng.gen_range(0..=max_x);
        let y = rng.gen_range(0..=max_y);
        Ok(imageops::crop_imm(&image, x, y, self.width, self.height).to_image())
    }

    fn is_random(&self) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CenterCrop {
    pub height: u32,
    pub width: u32,
}

impl CenterCrop {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            height: resolution.height,
            width: resolution.width,
        }
    }
}

impl Transform for CenterCrop {
    fn apply(&self, image: RgbImage, _rng: &mut dyn RngCore) -> Result<RgbImage> {
        let (max_x, max_y) = crop_slack(&image, self.height, self.width)?;
        Ok(imageops::crop_imm(&image, max_x / 2, max_y / 2, self.width, self.height).to_image())
    }
}

fn crop_slack(image: &RgbImage, crop_height: u32, crop_width: u32) -> Result<(u32, u32)> {
    let (width, height) = image.dimensions();
    if crop_width > width || crop_height > height {
        return Err(Error::CropOutOfBounds {
            crop_height,
            crop_width,
            height,
            width,
        });
    }
    Ok((width - crop_width, height - crop_height))
}

/// Mirrors the image left to right with probability `p`.
#[derive(Clone, Copy, Debug)]
pub struct RandomHorizontalFlip {
    p: f64,
}

impl RandomHorizontalFlip {
    /// `p` is clamped to `[0, 1]`; NaN disables flipping.
    pub fn new(p: f64) -> Self {
        let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        Self { p }
    }

    pub fn p(&self) -> f64 {
        self.p
    }
}

impl Default for RandomHorizontalFlip {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl Transform for RandomHorizontalFlip {
    fn apply(&self, mut image: RgbImage, rng: &mut dyn RngCore) -> Result<RgbImage> {
        if rng.gen_bool(self.p) {
            imageops::flip_horizontal_in_place(&mut image);
        }
        Ok(image)
    }

    fn is_random(&self) -> bool {
        self.p > 0.0 && self.p < 1.0
    }
}

/// Converts an RGB image into a `u8` tensor of shape `(3, height, width)`.
pub fn image_to_tensor(image: &RgbImage, device: &Device) -> Result<Tensor> {
    let (width, height) = image.dimensions();
    let tensor = Tensor::from_raw_buffer(
        image.as_raw(),
        DType::U8,
        &[height as usize, width as usize, 3],
        device,
    )?
    .permute((2, 0, 1))?
    .contiguous()?;
    Ok(tensor)
}

/// Turns a decoded image into the tensor handed to the training loop.
pub trait ImageTransform: Send + Sync {
    fn apply(&self, image: DynamicImage) -> Result<Tensor>;
}

impl<F> ImageTransform for F
where
    F: Fn(DynamicImage) -> Result<Tensor> + Send + Sync,
{
    fn apply(&self, image: DynamicImage) -> Result<Tensor> {
        self(image)
    }
}

/// Ordered image ops followed by tensor conversion.
#[derive(Debug)]
pub struct Pipeline {
    ops: Vec<Box<dyn Transform>>,
    device: Device,
}

impl Pipeline {
    pub fn new(device: Device) -> Self {
        Self {
            ops: Vec::new(),
            device,
        }
    }

    pub fn then<T: Transform + 'static>(mut self, op: T) -> Self {
        self.ops.push(Box::new(op));
        self
    }

    /// Shortest-side resize, random crop.
    pub fn train(resolution: Resolution, device: Device) -> Result<Self> {
        let resolution = resolution.validate()?;
        Ok(Self::new(device).then(ResizedCrop::new(resolution, CropPlacement::Random)))
    }

    /// Shortest-side resize, random crop, random horizontal flip.
    pub fn train_flipped(resolution: Resolution, device: Device) -> Result<Self> {
        Ok(Self::train(resolution, device)?.then(RandomHorizontalFlip::default()))
    }

    /// Shortest-side resize, center crop.
    pub fn validation(resolution: Resolution, device: Device) -> Result<Self> {
        let resolution = resolution.validate()?;
        Ok(Self::new(device).then(ResizedCrop::new(resolution, CropPlacement::Center)))
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn is_deterministic(&self) -> bool {
        self.ops.iter().all(|op| !op.is_random())
    }

    pub fn apply_with_rng(&self, image: DynamicImage, rng: &mut dyn RngCore) -> Result<Tensor> {
        let mut image = image.into_rgb8();
        for op in &self.ops {
            image = op.apply(image, rng)?;
        }
        image_to_tensor(&image, &self.device)
    }
}

impl ImageTransform for Pipeline {
    fn apply(&self, image: DynamicImage) -> Result<Tensor> {
        self.apply_with_rng(image, &mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    // Red channel holds the column index, green the row index.
    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 7]))
    }

    #[test]
    fn resolution_conversions() {
        assert_eq!(Resolution::from(64u32), Resolution::new(64, 64));
        assert_eq!(Resolution::from((32u32, 48u32)), Resolution::new(32, 48));
        assert_eq!(Resolution::default(), Resolution::new(256, 256));
        assert!(matches!(
            Resolution::new(0, 10).validate(),
            Err(Error::InvalidResolution { height: 0, width: 10 })
        ));
    }

    #[test]
    fn resolution_deserializes_int_or_pair() {
        let r: Resolution = serde_json::from_str("128").unwrap();
        assert_eq!(r, Resolution::new(128, 128));
        let r: Resolution = serde_json::from_str("[96, 160]").unwrap();
        assert_eq!(r, Resolution::new(96, 160));
    }

    #[test]
    fn source_window_follows_shorter_side() {
        let op = ResizedCrop::new(Resolution::from(256u32), CropPlacement::Center);
        assert_eq!(op.source_window(512, 384), (384, 384));
        assert_eq!(op.source_window(10, 20), (10, 10));
        assert_eq!(op.source_window(256, 256), (256, 256));
    }

    #[test]
    fn source_window_covers_non_square_target() {
        let op = ResizedCrop::new(Resolution::new(32, 64), CropPlacement::Center);
        assert_eq!(op.source_window(40, 40), (40, 20));
    }

    #[test]
    fn centered_window_without_resize() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let out = ResizedCrop::new(Resolution::from(4u32), CropPlacement::Center)
            .apply(gradient(10, 4), &mut rng)
            .unwrap();
        assert_eq!(out.dimensions(), (4, 4));
        assert_eq!(out.get_pixel(0, 0).0, [3, 0, 7]);
    }

    #[test]
    fn thin_images_stay_cheap() {
        let op = ResizedCrop::new(Resolution::from(256u32), CropPlacement::Random);
        assert_eq!(op.source_window(1, 100_000), (1, 1));
        assert_eq!(op.source_window(100_000, 2), (2, 2));

        let pipeline = Pipeline::validation(Resolution::from(256u32), Device::Cpu).unwrap();
        let start = std::time::Instant::now();
        for (w, h) in [(1, 100_000), (100_000, 1), (2, 6000)] {
            let image = DynamicImage::ImageRgb8(gradient(w, h));
            assert_eq!(pipeline.apply(image).unwrap().dims(), &[3, 256, 256]);
        }
        assert!(start.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn center_crop_takes_the_middle() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let out = CenterCrop::new(Resolution::from(4u32))
            .apply(gradient(10, 6), &mut rng)
            .unwrap();
        assert_eq!(out.dimensions(), (4, 4));
        assert_eq!(out.get_pixel(0, 0).0, [3, 1, 7]);
    }

    #[test]
    fn crop_larger_than_image_fails() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let err = RandomCrop::new(Resolution::from(8u32))
            .apply(gradient(4, 16), &mut rng)
            .unwrap_err();
        assert!(matches!(err, Error::CropOutOfBounds { width: 4, .. }));
    }

    #[test]
    fn flip_mirrors_columns() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let out = RandomHorizontalFlip::new(1.0)
            .apply(gradient(5, 2), &mut rng)
            .unwrap();
        assert_eq!(out.get_pixel(0, 1).0, [4, 1, 7]);
        assert!(!RandomHorizontalFlip::new(1.0).is_random());
        assert!(RandomHorizontalFlip::default().is_random());
    }

    #[test]
    fn nan_flip_probability_never_flips() {
        let flip = RandomHorizontalFlip::new(f64::NAN);
        assert_eq!(flip.p(), 0.0);
        assert!(!flip.is_random());
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let out = flip.apply(gradient(5, 2), &mut rng).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 7]);
    }

    #[test]
    fn tensor_is_channel_first() {
        let t = image_to_tensor(&gradient(3, 2), &Device::Cpu).unwrap();
        assert_eq!(t.dims(), &[3, 2, 3]);
        assert_eq!(t.dtype(), DType::U8);
        let v = t.to_vec3::<u8>().unwrap();
        assert_eq!(v[0][1], vec![0, 1, 2]);
        assert_eq!(v[1][1], vec![1, 1, 1]);
        assert_eq!(v[2][0], vec![7, 7, 7]);
    }

    #[test]
    fn seeded_train_pipeline_is_reproducible() {
        let pipeline = Pipeline::train_flipped(Resolution::from(16u32), Device::Cpu).unwrap();
        assert!(!pipeline.is_deterministic());
        let image = DynamicImage::ImageRgb8(gradient(64, 40));
        let a = pipeline
            .apply_with_rng(image.clone(), &mut rand::rngs::StdRng::seed_from_u64(9))
            .unwrap();
        let b = pipeline
            .apply_with_rng(image, &mut rand::rngs::StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a.to_vec3::<u8>().unwrap(), b.to_vec3::<u8>().unwrap());
    }

    #[test]
    fn pipelines_always_hit_target_shape() {
        let train = Pipeline::train(Resolution::new(24, 40), Device::Cpu).unwrap();
        let val = Pipeline::validation(Resolution::new(24, 40), Device::Cpu).unwrap();
        assert!(val.is_deterministic());
        for (w, h) in [(3, 2), (1000, 5), (5, 1000), (40, 24)] {
            let image = DynamicImage::ImageRgb8(gradient(w, h));
            assert_eq!(train.apply(image.clone()).unwrap().dims(), &[3, 24, 40]);
            assert_eq!(val.apply(image).unwrap().dims(), &[3, 24, 40]);
        }
    }

    #[test]
    fn closures_are_image_transforms() {
        let to_tensor = |image: DynamicImage| image_to_tensor(&image.into_rgb8(), &Device::Cpu);
        let t = ImageTransform::apply(&to_tensor, DynamicImage::ImageRgb8(gradient(2, 2))).unwrap();
        assert_eq!(t.dims(), &[3, 2, 2]);
    }
}
