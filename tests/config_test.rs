//! Tests for configuration read from the environment

#[cfg(test)]
mod tests {
    use std::env;
    use std::time::Duration;

    use alertqa::core::AppConfig;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "ALERTQA_STORAGE_PATH",
        "ALERTQA_SEARCH_API_URL",
        "ALERTQA_FILTER_THRESHOLD",
        "ALERTQA_PIPELINE_TIMEOUT_SECS",
        "ALERTQA_RESET_EVAL_DB",
        "ALERTQA_EAGER_METADATA",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: env access is serialized across these tests
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn it_uses_defaults() {
        clear_env();
        let config = AppConfig::default();
        assert_eq!(config.eval_db_path, "./db/eval.sqlite");
        assert_eq!(config.search_api_url, "http://127.0.0.1:8080");
        assert_eq!(config.filter_threshold, 0.75);
        assert_eq!(config.pipeline_timeout, Duration::from_secs(120));
        assert!(!config.startup.reset_eval_db);
        assert!(config.startup.eager_metadata);
    }

    #[test]
    #[serial]
    fn it_reads_the_environment() {
        clear_env();
        // SAFETY: env access is serialized across these tests
        unsafe {
            env::set_var("ALERTQA_STORAGE_PATH", "/tmp/alertqa/");
            env::set_var("ALERTQA_FILTER_THRESHOLD", "1.5");
            env::set_var("ALERTQA_PIPELINE_TIMEOUT_SECS", "30");
            env::set_var("ALERTQA_RESET_EVAL_DB", "true");
            env::set_var("ALERTQA_EAGER_METADATA", "0");
        }

        let config = AppConfig::default();
        assert_eq!(config.eval_db_path, "/tmp/alertqa/db/eval.sqlite");
        assert_eq!(config.filter_threshold, 1.0);
        assert_eq!(config.pipeline_timeout, Duration::from_secs(30));
        assert!(config.startup.reset_eval_db);
        assert!(!config.startup.eager_metadata);

        clear_env();
    }
}
