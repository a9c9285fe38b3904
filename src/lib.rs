pub mod config;
pub mod core;
pub mod feed;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod storage;
#[cfg(test)]
pub mod test_helpers;
