/// Lease TTL must exceed the maximum merge time; a single merge is a
/// handful of file operations, so a generous default keeps retries rare
/// without risking two holders at once.
pub const DEFAULT_LOCK_TTL_SECS: u64 = 30;
