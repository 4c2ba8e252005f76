//! Core I/O traits

use std::io::{Read, Seek};

/// Trait for readers that support both reading and seeking operations
///
/// Automatically implemented for any [`Read`] + [`Seek`] type that is also
/// [`Send`] and [`Sync`], so files and in-memory cursors both qualify.
pub trait SeekableReader: Read + Seek + Send + Sync {}

impl<T: Read + Seek + Send + Sync> SeekableReader for T {}
