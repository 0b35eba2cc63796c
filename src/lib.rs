//! src/lib.rs
pub mod configuration;
pub mod error;
pub mod file_splitter;
pub mod job;
pub mod keys;
pub mod mappers;
pub mod model;
pub mod output;
pub mod reducers;
pub mod storage;
pub mod telemetry;
#[cfg(test)]
mod test_utils;
pub mod validator;
