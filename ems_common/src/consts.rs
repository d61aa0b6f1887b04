//! Global constants for the EMS edge workspace.

use std::time::Duration;

/// Default control cycle period [ms].
pub const DEFAULT_CYCLE_TIME_MS: u64 = 1000;

/// Minimum time between two hardware start attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Start attempts allowed per GO_RUNNING sojourn before the
/// "max start attempts" flag is raised.
pub const DEFAULT_MAX_START_ATTEMPTS: u8 = 10;

/// Time spent in ERROR before the device is re-arbitrated.
pub const DEFAULT_ERROR_WAIT: Duration = Duration::from_secs(120);

/// Maximum time a battery may stay in precharge.
pub const DEFAULT_PRECHARGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum number of sub-devices a composite device may depend on.
pub const MAX_DEPENDENCIES: usize = 4;

/// Maximum length of a device identifier.
pub const MAX_DEVICE_ID_LEN: usize = 32;
