pub mod cc3m;
pub mod imagenet;
