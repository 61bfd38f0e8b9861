//! Assembles the reader chain and registers the bot's keys.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::schema::AppConfig;
use crate::distconf::sources::{CachedReader, CommandLine, Env, JsonConfig};
use crate::distconf::{Distconf, DistconfError, Logger, Reader, Refreshable, Result};

/// The file source behind its last-known-good cache.
pub type CachedFile = CachedReader<Arc<JsonConfig>>;

/// Where configuration comes from.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// JSON document with string values.
    pub config_path: PathBuf,

    /// Prefix for environment variables, e.g. `HEBE_` for `HEBE_BotToken`.
    pub env_prefix: String,

    /// Prefix for `prefix+key=value` arguments.
    pub arg_prefix: String,

    /// Arguments to scan; the process arguments when `None`.
    pub args: Option<Vec<String>>,

    /// Optional cache file for cold starts without a readable config file.
    pub cache_path: Option<PathBuf>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config.json"),
            env_prefix: "HEBE_".to_string(),
            arg_prefix: "conf.".to_string(),
            args: None,
            cache_path: None,
        }
    }
}

/// Everything produced by [`load`].
pub struct LoadedConfig {
    pub distconf: Distconf,
    pub file: Arc<JsonConfig>,
    pub cached: Arc<CachedFile>,
    pub app: AppConfig,
}

/// Build the reader chain (command line, environment, cached file) and
/// register every bot key.
///
/// Configuration is read from top to bottom of that chain. A config file
/// that cannot be loaded is logged, not fatal.
pub fn load(options: &LoaderOptions, logger: Logger) -> LoadedConfig {
    let file = Arc::new(JsonConfig::new());
    if let Err(e) = file.refresh_file(&options.config_path) {
        logger.log("", Some(&e), "Unable to load config file");
    }

    let cached = Arc::new(CachedReader::new(file.clone()));
    if let Some(path) = &options.cache_path {
        match load_cache(&cached, path) {
            Ok(count) => tracing::info!(path = %path.display(), entries = count, "Loaded config cache"),
            Err(e) => logger.log("", Some(&e), "Unable to load config cache"),
        }
    }

    let cmd = match &options.args {
        Some(args) => CommandLine::with_args(options.arg_prefix.clone(), args.clone()),
        None => CommandLine::new(options.arg_prefix.clone()),
    };
    let readers: Vec<Arc<dyn Reader>> = vec![
        Arc::new(cmd),
        Arc::new(Env::new(options.env_prefix.clone())),
        cached.clone(),
    ];

    let distconf = Distconf::with_logger(readers, logger);
    let app = AppConfig::register(&distconf);

    LoadedConfig {
        distconf,
        file,
        cached,
        app,
    }
}

/// Seed `cached` from `path`. A missing file is not an error.
pub fn load_cache(cached: &CachedFile, path: &Path) -> Result<usize> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(source) => {
            return Err(DistconfError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    cached.read_from(BufReader::new(file))
}

/// Persist the cache to `path`.
pub fn save_cache(cached: &CachedFile, path: &Path) -> Result<()> {
    let io_err = |source: std::io::Error| DistconfError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    cached.write_to(&mut writer)?;
    writer.flush().map_err(io_err)?;
    tracing::info!(path = %path.display(), "Saved config cache");
    Ok(())
}

/// Re-reads the config file from disk on every refresh.
///
/// With [`then_resolve`](Self::then_resolve) the registry is re-resolved
/// after the reload, in the same cycle, so environment and argument changes
/// are picked up without racing the file's own push.
pub struct FileReload {
    file: Arc<JsonConfig>,
    path: PathBuf,
    registry: Option<Distconf>,
}

impl FileReload {
    pub fn new(file: Arc<JsonConfig>, path: impl Into<PathBuf>) -> Self {
        Self {
            file,
            path: path.into(),
            registry: None,
        }
    }

    pub fn then_resolve(mut self, registry: Distconf) -> Self {
        self.registry = Some(registry);
        self
    }
}

impl Refreshable for FileReload {
    fn refresh(&self) {
        match self.file.refresh_file(&self.path) {
            Ok(()) => tracing::debug!(
                path = %self.path.display(),
                keys = self.file.keys().len(),
                "Config file reloaded"
            ),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Periodic config reload failed")
            }
        }
        if let Some(registry) = &self.registry {
            registry.refresh();
        }
    }
}
