//! Property-based tests for configuration and message invariants.

use proptest::prelude::*;
use stallwatch::prelude::*;
use stallwatch::MAX_THRESHOLD;
use std::time::Duration;

proptest! {
    #[test]
    fn test_message_embeds_threshold_with_two_decimals(ms in 1u64..3_600_000) {
        let threshold = Duration::from_millis(ms);
        let message = stall_message(threshold);

        let expected = format!("{:.2}s", threshold.as_secs_f64());
        prop_assert!(message.starts_with("Main thread was blocked for "));
        prop_assert!(message.ends_with(&expected));

        let value = message
            .trim_start_matches("Main thread was blocked for ")
            .trim_end_matches('s');
        let decimals = value.split('.').nth(1).map(str::len);
        prop_assert_eq!(decimals, Some(2));
    }

    #[test]
    fn test_positive_thresholds_within_limit_are_valid(nanos in 1u64..=3_600_000_000_000) {
        let config = WatchdogConfig::builder().threshold(Duration::from_nanos(nanos)).build();
        prop_assert!(config.is_ok());
    }

    #[test]
    fn test_thresholds_above_limit_are_rejected(extra_ms in 1u64..1_000_000) {
        let threshold = MAX_THRESHOLD + Duration::from_millis(extra_ms);
        let config = WatchdogConfig::builder().threshold(threshold).build();
        prop_assert!(matches!(config, Err(WatchdogError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_json_threshold_parses_as_seconds(ms in 1u64..600_000, strict in any::<bool>()) {
        let secs = Duration::from_millis(ms).as_secs_f64();
        let text = format!(r#"{{ "threshold_secs": {secs}, "strict_mode": {strict} }}"#);
        let config = WatchdogConfig::from_json_str(&text);
        prop_assert!(config.is_ok());
        if let Ok(config) = config {
            let drift = config.threshold.abs_diff(Duration::from_millis(ms));
            prop_assert!(drift < Duration::from_micros(1));
            prop_assert_eq!(config.strict_mode, strict);
        }
    }
}
