pub mod delivery;
pub mod errors;
pub mod matching;
pub mod models;
pub mod server;
pub mod source;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;
