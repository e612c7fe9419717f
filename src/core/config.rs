use std::env;
use std::time::Duration;

/// Controls what happens once per process before any session starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StartupMode {
    /// Delete all historical evaluation records on startup
    pub reset_eval_db: bool,
    /// Fetch search service metadata before the first session instead
    /// of on first use
    pub eager_metadata: bool,
}

impl Default for StartupMode {
    fn default() -> Self {
        Self {
            reset_eval_db: false,
            eager_metadata: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub eval_db_path: String,
    pub search_api_url: String,
    pub openai_api_hostname: String,
    pub openai_api_key: String,
    pub filter_threshold: f64,
    pub pipeline_timeout: Duration,
    pub startup: StartupMode,
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("ALERTQA_STORAGE_PATH").unwrap_or("./".to_string());
        let eval_db_path = format!("{}/db/eval.sqlite", storage_path.trim_end_matches('/'));
        let search_api_url = env::var("ALERTQA_SEARCH_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
        let openai_api_hostname = env::var("ALERTQA_LLM_HOST")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_api_key =
            env::var("OPENAI_API_KEY").unwrap_or_else(|_| "thiswontworkforopenai".to_string());
        let filter_threshold = env_parse("ALERTQA_FILTER_THRESHOLD", 0.75_f64).clamp(0.0, 1.0);
        let pipeline_timeout =
            Duration::from_secs(env_parse("ALERTQA_PIPELINE_TIMEOUT_SECS", 120_u64));
        let startup = StartupMode {
            reset_eval_db: env_flag("ALERTQA_RESET_EVAL_DB", false),
            eager_metadata: env_flag("ALERTQA_EAGER_METADATA", true),
        };

        Self {
            storage_path,
            eval_db_path,
            search_api_url,
            openai_api_hostname,
            openai_api_key,
            filter_threshold,
            pipeline_timeout,
            startup,
        }
    }
}

impl AppConfig {
    /// Apply startup overrides from the command line. Flags can only
    /// turn a reset on, never silently turn one off.
    pub fn with_startup_overrides(mut self, reset_eval_db: bool, lazy_metadata: bool) -> Self {
        if reset_eval_db {
            self.startup.reset_eval_db = true;
        }
        if lazy_metadata {
            self.startup.eager_metadata = false;
        }
        self
    }
}
