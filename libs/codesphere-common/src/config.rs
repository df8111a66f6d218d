// Resource limit policy shared by the API, the CLI and the engine

/// Wall-clock limit applied when a request does not specify one
pub const DEFAULT_TIME_LIMIT_MS: u64 = 2_000;
/// Memory ceiling applied when a request does not specify one
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 256;

pub const MIN_TIME_LIMIT_MS: u64 = 1_000;
pub const MIN_MEMORY_LIMIT_MB: u64 = 256;

pub const MAX_TIME_LIMIT_MS: u64 = 15_000;
pub const MAX_MEMORY_LIMIT_MB: u64 = 1_024;

/// Safety limits to prevent pathological inputs from reaching the sandbox
pub const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB
pub const MAX_TEST_INPUT_BYTES: usize = 10 * 1024 * 1024; // 10MB
