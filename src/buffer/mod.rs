pub mod buffer_pool_manager;
pub mod clock_replacer;
pub mod lru_replacer;
pub mod parallel_buffer_pool_manager;
pub mod replacer;
