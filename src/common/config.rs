pub const INVALID_PAGE_ID: PageId = -1; // invalid page id
pub const DB_PAGE_SIZE: usize = 4096; // size of a data page in bytes
pub const BUFFER_POOL_SIZE: usize = 10; // default size of one buffer pool instance
pub const DIRECTORY_MAX_DEPTH: u32 = 9; // hard cap on extendible hash directory depth
pub const DIRECTORY_ARRAY_SIZE: usize = 1 << DIRECTORY_MAX_DEPTH; // directory entries per page

pub type PageId = i32; // page id type
pub type FrameId = usize; // frame id type, local to one buffer pool instance
pub type TxnId = u64; // transaction id type
pub type Lsn = u64; // log sequence number type
