use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

const CONFIG_FILE: &str = "recipes";
const ENV_PREFIX: &str = "RECIPES";

/// Run settings: defaults, then `recipes.toml`, then `RECIPES_*` env vars.
/// CLI flags are applied on top by `main`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `category|url` link list from link discovery.
    pub input_path: PathBuf,
    /// CSV file records are appended to.
    pub output_path: PathBuf,
    /// Number of browser sessions running at once.
    pub concurrency: usize,
    pub browser: BrowserSettings,
    pub timeouts: TimeoutSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            input_path: PathBuf::from("found_links.txt"),
            output_path: PathBuf::from("AllRecipes.csv"),
            concurrency: 4,
            browser: BrowserSettings::default(),
            timeouts: TimeoutSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Explicit Chrome/Chromium binary; otherwise chromiumoxide looks it up.
    pub chrome_executable: Option<PathBuf>,
    /// Extra command-line switches passed to every browser process.
    pub chrome_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        BrowserSettings {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            chrome_executable: None,
            chrome_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub navigation_timeout_secs: u64,
    pub element_timeout_secs: u64,
    pub reveal_settle_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        TimeoutSettings {
            navigation_timeout_secs: 10,
            element_timeout_secs: 5,
            reveal_settle_ms: 1000,
        }
    }
}

/// Wait limits used inside a single task.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Page load until `body` exists.
    pub navigation: Duration,
    /// Each optional text field.
    pub element: Duration,
    /// Upper bound on waiting for the nutrition label after the reveal click.
    pub reveal_settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        TimeoutSettings::default().into()
    }
}

impl From<TimeoutSettings> for Timeouts {
    fn from(t: TimeoutSettings) -> Self {
        Timeouts {
            navigation: Duration::from_secs(t.navigation_timeout_secs),
            element: Duration::from_secs(t.element_timeout_secs),
            reveal_settle: Duration::from_millis(t.reveal_settle_ms),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("browser.chrome_args")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        Ok(settings)
    }

    /// Apply `run` flags on top of the loaded layers and check the result.
    pub fn with_run_overrides(
        mut self,
        input: Option<PathBuf>,
        output: Option<PathBuf>,
        concurrency: Option<usize>,
    ) -> Result<Self> {
        if let Some(input) = input {
            self.input_path = input;
        }
        if let Some(output) = output {
            self.output_path = output;
        }
        if let Some(n) = concurrency {
            self.concurrency = n;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        Ok(())
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts.clone().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_constants() {
        let s = Settings::default();
        assert_eq!(s.input_path, PathBuf::from("found_links.txt"));
        assert_eq!(s.output_path, PathBuf::from("AllRecipes.csv"));
        assert_eq!(s.concurrency, 4);
        assert!(s.browser.headless);
        assert_eq!((s.browser.window_width, s.browser.window_height), (1920, 1080));
        let t = s.timeouts();
        assert_eq!(t.navigation, Duration::from_secs(10));
        assert_eq!(t.element, Duration::from_secs(5));
        assert_eq!(t.reveal_settle, Duration::from_secs(1));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let s = Settings {
            concurrency: 0,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let s: Settings = config::Config::builder()
            .add_source(config::File::from_str(
                "concurrency = 8\n[browser]\nheadless = false\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(s.concurrency, 8);
        assert!(!s.browser.headless);
        assert_eq!(s.browser.window_width, 1920);
        assert_eq!(s.output_path, PathBuf::from("AllRecipes.csv"));
    }

    #[test]
    fn timeout_keys_from_toml() {
        let s: Settings = config::Config::builder()
            .add_source(config::File::from_str(
                "[timeouts]\nnavigation_timeout_secs = 30\nelement_timeout_secs = 2\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        let t = s.timeouts();
        assert_eq!(t.navigation, Duration::from_secs(30));
        assert_eq!(t.element, Duration::from_secs(2));
        assert_eq!(t.reveal_settle, Duration::from_secs(1));
    }

    #[test]
    fn cli_concurrency_overrides_env() {
        std::env::set_var("RECIPES_CONCURRENCY", "0");
        std::env::set_var("RECIPES_TIMEOUTS__ELEMENT_TIMEOUT_SECS", "7");
        let loaded = Settings::load();
        std::env::remove_var("RECIPES_CONCURRENCY");
        std::env::remove_var("RECIPES_TIMEOUTS__ELEMENT_TIMEOUT_SECS");

        let loaded = loaded.unwrap();
        assert_eq!(loaded.concurrency, 0);
        assert_eq!(loaded.timeouts().element, Duration::from_secs(7));
        assert!(loaded.clone().with_run_overrides(None, None, None).is_err());

        let s = loaded.with_run_overrides(None, None, Some(4)).unwrap();
        assert_eq!(s.concurrency, 4);
    }
}
