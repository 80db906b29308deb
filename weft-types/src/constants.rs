// ─── Amounts ─────────────────────────────────────────────────────────────────

/// Decimal places of the native unit.
pub const AMOUNT_DECIMALS: u32 = 8;

/// One whole token in base units.
pub const ONE_TOKEN: u128 = 10u128.pow(AMOUNT_DECIMALS);

// ─── Capacity ────────────────────────────────────────────────────────────────

/// Default lower bound on block size, in MB.
pub const DEFAULT_MIN_BLOCK_SIZE_MB: f64 = 1.0;

/// Default upper bound on block size, in MB.
pub const DEFAULT_MAX_BLOCK_SIZE_MB: f64 = 200.0;

/// Default scale-up threshold τ on pending/confirmed.
pub const DEFAULT_CAPACITY_THRESHOLD: f64 = 0.8;

/// Multiplicative decay applied when load is below τ.
pub const CAPACITY_DECAY: f64 = 0.9;

/// Bytes per MB for block sizing.
pub const BYTES_PER_MB: f64 = 1_000_000.0;

// ─── Erasure coding ──────────────────────────────────────────────────────────

/// Default number of equal data segments a block payload is split into.
pub const DEFAULT_DATA_SEGMENTS: usize = 4;

/// Default number of data symbols per segment.
pub const DEFAULT_SYMBOLS_PER_SEGMENT: usize = 4;

/// Default number of parity symbols per segment.
pub const DEFAULT_REDUNDANCY: usize = 2;

/// Maximum codeword length over GF(2^8).
pub const MAX_CODEWORD_SYMBOLS: usize = 256;

// ─── Network ─────────────────────────────────────────────────────────────────

/// Maximum framed chunk size in bytes.
pub const MAX_FRAME_SIZE: usize = 8_388_608; // 8 MB

/// Version byte prefixed to every chunk frame.
pub const FRAME_VERSION: u8 = 1;
