pub mod anthropic;
pub mod base;
pub mod bedrock;
pub mod configs;
pub mod factory;
pub mod retry;
pub mod utils;
pub mod vertex;

#[cfg(test)]
pub mod mock;
