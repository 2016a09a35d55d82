pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# CWQUERY CONFIGURATION
# =============================================================================
# Every key is optional. Command-line flags override the values set here.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/cwquery/config.yml
#   3. /etc/cwquery/config.yml
#
# Values may reference environment variables with the $env{...} syntax.

# Region and named profile. Omit to use the default credential chain.
# aws:
#   region: us-west-2
#   profile: default

fetch:
  # Streams per event request. The service accepts at most 100.
  max_batch_size: 100
  # Limit for a single page request, retried on expiry
  request_timeout: 30s
  # Limit for the whole query, or 'infinite'
  query_timeout: 10m
  # Batches fetched at once. Omit to fetch every batch in parallel.
  # max_concurrency: 8
  # 'fail_fast' aborts the query on the first failed batch,
  # 'best_effort' returns what succeeded along with the failures
  failure_policy: fail_fast
  # 'last_event_descending' stops listing at the first stream that went
  # quiet before the window; 'full_scan' checks every stream
  scan_mode: last_event_descending

retry:
  # Attempts per request, including the first
  max_attempts: 3
  # Doubles after each failed attempt, capped at one minute
  initial_backoff: 200ms
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, Config};

    #[test]
    fn test_starter_config_matches_defaults() {
        let config = parse_config(&generate_starter_config()).unwrap();
        assert_eq!(config, Config::default());
    }
}
