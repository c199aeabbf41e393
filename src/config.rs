//! Centralized configuration for EmberCache.
//!
//! Goals:
//! - Single place for tunables instead of scattering env lookups.
//! - CacheConfig::from_env() reads the EMBER_* variables; CacheBuilder covers
//!   programmatic setup and returns a plain CacheConfig.
//!
//! Tunables:
//! - file_mode:   permission bits applied to the snapshot file (unix only).
//!                Env: EMBER_FILE_MODE, octal (default 0644)
//! - create_dirs: create missing parent directories during preflight.
//!                Env: EMBER_CREATE_DIRS (default true; "1|true|on|yes" => true)
//! - max_depth:   nesting limit for structured values; values deeper than this
//!                are rejected as non-serializable.
//!                Env: EMBER_MAX_DEPTH (default 128)

use std::fmt;

pub const DEFAULT_FILE_MODE: u32 = 0o644;
pub const DEFAULT_MAX_DEPTH: u32 = 128;

#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Permission bits for the persisted snapshot (applied to the tmp file
    /// before the rename, unix only). Env: EMBER_FILE_MODE (octal).
    pub file_mode: u32,

    /// Whether preflight may create missing parent directories.
    /// Env: EMBER_CREATE_DIRS (default true).
    pub create_dirs: bool,

    /// Structured-value nesting limit for encode and decode.
    /// Env: EMBER_MAX_DEPTH (default 128).
    pub max_depth: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file_mode: DEFAULT_FILE_MODE,
            create_dirs: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl fmt::Display for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheConfig {{ file_mode: {:o}, create_dirs: {}, max_depth: {} }}",
            self.file_mode, self.create_dirs, self.max_depth
        )
    }
}

impl CacheConfig {
    /// Read configuration from EMBER_* env vars, falling back to defaults.
    pub fn from_env() -> Self {
        let d = CacheConfig::default();
        CacheConfig {
            file_mode: env_octal("EMBER_FILE_MODE").unwrap_or(d.file_mode),
            create_dirs: env_bool("EMBER_CREATE_DIRS").unwrap_or(d.create_dirs),
            max_depth: env_u32("EMBER_MAX_DEPTH").unwrap_or(d.max_depth).max(1),
        }
    }

    pub fn builder() -> CacheBuilder {
        CacheBuilder::default()
    }
}

/// Builder over CacheConfig. Starts from env, so explicit setters win over
/// the environment.
#[derive(Clone, Debug)]
pub struct CacheBuilder {
    cfg: CacheConfig,
}

impl Default for CacheBuilder {
    fn default() -> Self {
        Self {
            cfg: CacheConfig::from_env(),
        }
    }
}

impl CacheBuilder {
    pub fn file_mode(mut self, mode: u32) -> Self {
        self.cfg.file_mode = mode;
        self
    }

    pub fn create_dirs(mut self, yes: bool) -> Self {
        self.cfg.create_dirs = yes;
        self
    }

    pub fn max_depth(mut self, depth: u32) -> Self {
        self.cfg.max_depth = depth.max(1);
        self
    }

    pub fn build(self) -> CacheConfig {
        self.cfg
    }
}

// ----------------- env parsing helpers -----------------

fn env_bool(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    let s = raw.trim().to_ascii_lowercase();
    if s.is_empty() {
        return None;
    }
    Some(matches!(s.as_str(), "1" | "true" | "on" | "yes"))
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok()?.trim().parse::<u32>().ok()
}

fn env_octal(name: &str) -> Option<u32> {
    let raw = std::env::var(name).ok()?;
    let s = raw.trim().trim_start_matches("0o");
    u32::from_str_radix(s, 8).ok()
}
