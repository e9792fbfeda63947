pub mod batcher;
pub mod webhook;
