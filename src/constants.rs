// src/constants.rs

use std::time::Duration;

/// Configuration file names, in lookup priority order.
pub const CONFIG_FILENAMES: [&str; 3] = ["bpm.toml", "bpm.yml", "bpm.yaml"];

/// Environment variable that points at an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "BPM_CONFIG_PATH";

/// How often the orchestrator checks its live children for completion.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a child gets to exit after a graceful termination request before it is killed.
pub const TERMINATION_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Upper bound on waiting for stream readers to flush once their processes are gone.
pub const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);
