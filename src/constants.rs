//! Global constants used throughout snipweave.
//!
//! Endpoint defaults, timeouts and file locations that more than one module
//! needs are defined here rather than repeated as literals.

use std::time::Duration;

/// Default generation service endpoint (OpenAI-compatible API root).
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/";

/// Default per-request timeout for the generation service (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Environment variable holding the generation service credential.
///
/// Takes precedence over the credential stored in the global config.
pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";

/// Environment variable overriding the global config file location.
pub const CONFIG_PATH_ENV_VAR: &str = "SNIPWEAVE_CONFIG";

/// Directory under the home directory holding config and data.
pub const APP_DIR_NAME: &str = ".snipweave";

/// Global config file name inside [`APP_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default snippet store file name inside [`APP_DIR_NAME`].
pub const STORE_FILE_NAME: &str = "snippets.json";

/// Capacity of the regeneration event channel.
///
/// Slow subscribers that fall further behind than this miss events and see
/// a lag error instead.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long the CLI waits for scheduled regenerations before giving up (10 minutes).
pub fn batch_wait_timeout() -> Duration {
    Duration::from_secs(600)
}
