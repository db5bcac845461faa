pub mod dataset;
pub mod image_folder;
pub mod manifest;
pub mod split;
pub mod tokenizer;
pub mod transform;
