//! Basic-type tags and widths of the heap dump value encoding.

pub const TAG_OBJECT: u8 = 2;
pub const TAG_BOOLEAN: u8 = 4;
pub const TAG_CHAR: u8 = 5;
pub const TAG_FLOAT: u8 = 6;
pub const TAG_DOUBLE: u8 = 7;
pub const TAG_BYTE: u8 = 8;
pub const TAG_SHORT: u8 = 9;
pub const TAG_INT: u8 = 10;
pub const TAG_LONG: u8 = 11;

pub const BYTES_IN_BOOLEAN: usize = 1;
pub const BYTES_IN_BYTE: usize = 1;
pub const BYTES_IN_CHAR: usize = 2;
pub const BYTES_IN_SHORT: usize = 2;
pub const BYTES_IN_INT: usize = 4;
pub const BYTES_IN_FLOAT: usize = 4;
pub const BYTES_IN_LONG: usize = 8;
pub const BYTES_IN_DOUBLE: usize = 8;

/// Identifiers are either 4 or 8 bytes wide, fixed per dump.
pub const BYTES_IN_SHORT_ID: u8 = 4;
pub const BYTES_IN_LONG_ID: u8 = 8;

/// Epoch stamp of an instance that no traversal has reached yet.
pub const UNVISITED_EPOCH: u32 = 0;
