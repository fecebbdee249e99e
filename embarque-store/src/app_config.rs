use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub manifest: ManifestConfig,
    pub demo: DemoConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ManifestConfig {
    /// Ordered tag colors offered by the manifest screens. Injected here so
    /// the organizer core carries no presentation constants.
    pub tag_palette: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DemoConfig {
    /// Seed the in-memory store with the demo trip on startup.
    #[serde(default)]
    pub seed: bool,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Environment-specific file, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. EMBARQUE__SERVER__PORT=8080
            .add_source(config::Environment::with_prefix("EMBARQUE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
