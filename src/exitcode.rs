//! Standard exit codes (BSD sysexits.h compatible)

/// Command line usage error
pub const USAGE: i32 = 64;

/// Data format error (malformed link tree)
pub const DATAERR: i32 = 65;

/// Cannot open input (source group has no links)
pub const NOINPUT: i32 = 66;

/// Can't create output (some clones were not persisted)
pub const CANTCREAT: i32 = 73;

/// Input/output error
pub const IOERR: i32 = 74;

/// Configuration error
pub const CONFIG: i32 = 78;
