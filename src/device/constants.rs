use uuid::Uuid;

/**
 * Default interval (milliseconds) between pull-reads when polling.
 */
pub const DEFAULT_POLL_INTERVAL: u64 = 5000;

/**
 * Lower bound (milliseconds) of the poll interval.
 */
pub const MIN_POLL_INTERVAL: u64 = 100;

/**
 * How long (milliseconds) to scan for a peripheral before giving up on choosing one.
 */
pub const DEFAULT_SCAN_TIMEOUT: u64 = 10000;

/**
 * How often (milliseconds) to look at the discovered peripherals while scanning.
 */
pub const SCAN_POLL_DELAY: u64 = 500;

/**
 * The UUID of the Bluetooth BLE battery monitor service of the Nicla firmware
 */
pub const BATTERY_MONITOR_SERVICE: Uuid = Uuid::from_u128(0x19b10000_0000_537e_4f6c_d104768a1214);

/**
 * Battery percentage characteristic, 1 signed byte.
 */
pub const BATTERY_PERCENTAGE_CHARACTERISTIC: Uuid = Uuid::from_u128(0x19b10000_1001_537e_4f6c_d104768a1214);

/**
 * Battery voltage characteristic, IEEE-754 f32 little endian.
 */
pub const BATTERY_VOLTAGE_CHARACTERISTIC: Uuid = Uuid::from_u128(0x19b10000_1002_537e_4f6c_d104768a1214);

/**
 * Battery charge level characteristic, 1 signed byte in the range [0, 5]. 0 means unknown.
 */
pub const BATTERY_CHARGE_LEVEL_CHARACTERISTIC: Uuid = Uuid::from_u128(0x19b10000_1003_537e_4f6c_d104768a1214);

/**
 * Multiplier that maps a charge level [0, 5] to a percentage [0, 100].
 */
pub const CHARGE_LEVEL_TO_PERCENTAGE: f64 = 20.0;

/**
 * Width of the gauge per percent; the full gauge body is 56 units wide.
 */
pub const GAUGE_UNITS_PER_PERCENT: f64 = 0.56;
