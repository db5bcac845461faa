use std::path::PathBuf;

use anyhow::{bail, Context};
use candle_core::{Device, Tensor};
use clap::{Parser, ValueEnum};
use indicatif::ProgressBar;
use vision_datasets::{
    Dataset, HfTokenizer, LabeledImageDataset, LabeledSample, Pipeline, Resolution, Split,
    TextImageDataset, TextImageSample,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    /// image/caption pairs from `{split}_list.txt`
    Cc3m,
    /// directory-per-class images under `{root}/{split}`
    Imagenet,
}

/// Build a dataset and walk it, reporting sample shapes.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    #[arg(value_enum)]
    kind: Kind,

    /// Dataset root directory.
    #[arg(long)]
    root: PathBuf,

    #[arg(long, default_value = "train")]
    split: Split,

    /// `N` for a square or `H,W`.
    #[arg(long, default_value = "256", value_parser = parse_resolution)]
    resolution: Resolution,

    /// Path to a `tokenizer.json` (cc3m only).
    #[arg(long)]
    tokenizer: Option<PathBuf>,

    /// Hub repository to fetch `tokenizer.json` from (cc3m only).
    #[arg(long)]
    tokenizer_repo: Option<String>,

    #[arg(long, default_value_t = 77)]
    context_length: usize,

    /// Only load the first N items.
    #[arg(long)]
    limit: Option<usize>,

    #[arg(long)]
    gpu: bool,
}

fn parse_resolution(s: &str) -> Result<Resolution, String> {
    let parse = |v: &str| v.trim().parse::<u32>().map_err(|e| format!("{v:?}: {e}"));
    let resolution = match s.split_once(',') {
        Some((h, w)) => Resolution::new(parse(h)?, parse(w)?),
        None => parse(s)?.into(),
    };
    resolution.validate().map_err(|e| e.to_string())
}

fn load_tokenizer(args: &Args, device: &Device) -> anyhow::Result<HfTokenizer> {
    let tokenizer = match (&args.tokenizer, &args.tokenizer_repo) {
        (Some(path), _) => HfTokenizer::from_file(path)
            .with_context(|| format!("loading tokenizer {}", path.display()))?,
        (None, Some(repo)) => HfTokenizer::from_pretrained(repo)
            .with_context(|| format!("fetching tokenizer from {repo}"))?,
        (None, None) => bail!("cc3m needs --tokenizer or --tokenizer-repo"),
    };
    Ok(tokenizer
        .with_context_length(args.context_length)
        .with_device(device.clone()))
}

fn walk<D, F>(
    dataset: &D,
    limit: Option<usize>,
    keys: [&'static str; 2],
    tensors: F,
) -> anyhow::Result<()>
where
    D: Dataset,
    F: Fn(D::Item) -> Vec<Tensor>,
{
    let n = limit.map_or(dataset.len(), |l| l.min(dataset.len()));
    println!("dataset len: {}, walking {}", dataset.len(), n);
    let pb = ProgressBar::new(n as u64);
    let start_time = std::time::Instant::now();
    for i in 0..n {
        let sample = dataset.get(i).with_context(|| format!("loading item {i}"))?;
        if i == 0 {
            for (key, tensor) in keys.iter().zip(tensors(sample)) {
                pb.println(format!("{key}: {:?} {:?}", tensor.dims(), tensor.dtype()));
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");
    println!("walk time: {:?}", start_time.elapsed());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let device = if args.gpu {
        Device::cuda_if_available(0)?
    } else {
        Device::Cpu
    };

    match args.kind {
        Kind::Cc3m => {
            let tokenizer = load_tokenizer(&args, &device)?;
            let transform = match args.split {
                Split::Train => Pipeline::train(args.resolution, device)?,
                Split::Val => Pipeline::validation(args.resolution, device)?,
            };
            let dataset = TextImageDataset::new(&args.root, args.split, tokenizer, transform)
                .with_context(|| format!("indexing {}", args.root.display()))?;
            walk(&dataset, args.limit, TextImageSample::KEYS, TextImageSample::into_tensors)
        }
        Kind::Imagenet => {
            let (root, resolution) = (&args.root, args.resolution);
            let dataset = match args.split {
                Split::Train => LabeledImageDataset::train_on(root, resolution, device),
                Split::Val => LabeledImageDataset::validation_on(root, resolution, device),
            }
            .with_context(|| format!("scanning {}", args.root.display()))?;
            println!("classes: {}", dataset.num_classes());
            walk(&dataset, args.limit, LabeledSample::KEYS, LabeledSample::into_tensors)
        }
    }
}
