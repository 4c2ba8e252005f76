//! I/O utilities for rastercache
//!
//! Byte order handling and buffered access to seekable sources.

pub mod traits;
pub mod byte_order;
pub mod buffer;

pub use traits::SeekableReader;
pub use byte_order::ByteOrder;
pub use buffer::BufferedReader;
