//! Configuration for fasp-bridge
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::time::Duration;
use uuid::Uuid;

use crate::backfill::DEFAULT_MAX_COUNT;
use crate::client::ClientConfig;

/// fasp-bridge - signed-protocol bridge to auxiliary service providers
#[derive(Parser, Debug, Clone)]
#[command(name = "fasp-bridge")]
#[command(about = "Bridge service speaking the FASP protocol to auxiliary providers")]
pub struct Args {
    /// Unique node identifier for this bridge instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Timeout for each signed provider request, in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,

    /// Allowed clock skew for response signatures, in seconds
    #[arg(long, env = "SIGNATURE_MAX_SKEW_SECS", default_value = "300")]
    pub signature_max_skew_secs: i64,

    /// Capacity of the background job queue
    #[arg(long, env = "JOB_QUEUE_SIZE", default_value = "1024")]
    pub job_queue_size: usize,

    /// Default page size for backfill requests that do not specify one
    #[arg(long, env = "BACKFILL_MAX_COUNT", default_value_t = DEFAULT_MAX_COUNT)]
    pub backfill_max_count: usize,
}

impl Args {
    /// Validate configuration values that clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be positive".to_string());
        }
        if self.signature_max_skew_secs <= 0 {
            return Err("SIGNATURE_MAX_SKEW_SECS must be positive".to_string());
        }
        if self.job_queue_size == 0 {
            return Err("JOB_QUEUE_SIZE must be positive".to_string());
        }
        if self.backfill_max_count == 0 {
            return Err("BACKFILL_MAX_COUNT must be positive".to_string());
        }
        Ok(())
    }

    /// Client tunables derived from these args.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_skew_secs: self.signature_max_skew_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let args = Args::parse_from(["fasp-bridge"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.backfill_max_count, DEFAULT_MAX_COUNT);
        assert_eq!(args.client_config().request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let args = Args::parse_from(["fasp-bridge", "--request-timeout-ms", "0"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_zero_backfill_page_rejected() {
        let args = Args::parse_from(["fasp-bridge", "--backfill-max-count", "0"]);
        assert!(args.validate().is_err());
    }
}
