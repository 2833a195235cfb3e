//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const PROJECT_FILES: [&str; 2] = ["roundtable.toml", ".roundtable.toml"];
const ENV_PREFIX: &str = "ROUNDTABLE_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `ROUNDTABLE_*` environment variables
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./roundtable.toml` or `./.roundtable.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/roundtable/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        Self::figment(Self::global_config_path().as_deref(), config_path)
            .extract()
            .map_err(Box::new)
    }

    /// Build the merged figment from an explicit global path.
    pub fn figment(global_path: Option<&Path>, config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = global_path
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(path));
        }

        // Explicit path is the highest-priority file; a missing one is an error
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file_exact(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    ///
    /// `$XDG_CONFIG_HOME/roundtable/config.toml` if set, otherwise the
    /// platform config directory.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("roundtable").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources(config_path: Option<&Path>) {
        println!("Configuration sources (in priority order):");

        println!("  [ENV  ] Variables: {ENV_PREFIX}<SECTION>__<KEY>");

        if let Some(path) = config_path {
            let found = if path.exists() { "FOUND" } else { "MISSING" };
            println!("  [{found:<5}] Explicit: {}", path.display());
        }

        if let Some(path) = Self::project_config_path() {
            println!("  [FOUND] Project:  {}", path.display());
        } else {
            println!("  [     ] Project:  ./roundtable.toml or ./.roundtable.toml");
        }

        if let Some(path) = Self::global_config_path() {
            let found = if path.exists() { "FOUND" } else { "     " };
            println!("  [{found}] Global:   {}", path.display());
        }

        println!("  [     ] Default:  built-in defaults");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.scheduler.round_limit, 20);
        assert!(config.output.color);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("roundtable"));
    }

    #[test]
    fn test_project_file_overrides_global() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "global.toml",
                "[scheduler]\nround_limit = 5\nspeak_timeout_secs = 12",
            )?;
            jail.create_file("roundtable.toml", "[scheduler]\nround_limit = 9")?;

            let config: FileConfig =
                ConfigLoader::figment(Some(Path::new("global.toml")), None).extract()?;
            assert_eq!(config.scheduler.round_limit, 9);
            assert_eq!(config.scheduler.speak_timeout_secs, 12);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_and_env_take_priority() {
        Jail::expect_with(|jail| {
            jail.create_file(".roundtable.toml", "[agents]\nstreaming = false")?;
            jail.create_file("custom.toml", "[scheduler]\nround_limit = 3")?;
            jail.set_env("ROUNDTABLE_SCHEDULER__ROUND_LIMIT", "4");
            jail.set_env("ROUNDTABLE_OUTPUT__COLOR", "false");

            let config: FileConfig =
                ConfigLoader::figment(None, Some(Path::new("custom.toml"))).extract()?;
            assert_eq!(config.scheduler.round_limit, 4);
            assert!(!config.agents.streaming);
            assert!(!config.output.color);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        Jail::expect_with(|_jail| {
            let result = ConfigLoader::figment(None, Some(Path::new("nope.toml")))
                .extract::<FileConfig>();
            assert!(result.is_err());
            Ok(())
        });
    }
}
