// Constants for the retry module
use std::time::Duration;

/// Default base delay for exponential backoff
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);

/// Default maximum delay cap
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);

/// Default growth factor between consecutive retries
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Jitter spread as a fraction of the computed delay (applied as +/-)
pub const JITTER_RATIO: f64 = 0.25;

/// Maximum exponent for exponential backoff calculation to prevent overflow
pub const MAX_BACKOFF_EXPONENT: u32 = 30;
