pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod container;
pub mod recovery;
pub mod storage;
