//! Configuration resolution for kahi-etl
//!
//! Each setting resolves CLI → ENV (`KAHI_*`) → TOML → compiled default.
//! The tier that supplied a value is logged; supplying one setting from
//! several tiers logs a warning.

use crate::enrichment::currency::DEFAULT_CURRENCY_URL;
use crate::enrichment::doaj::DEFAULT_DOAJ_URL;
use crate::enrichment::ror::DEFAULT_ROR_URL;
use crate::linker::ConflictPolicy;
use crate::merge::UnmatchedAuthorPolicy;
use kahi_common::config::{resolve_root_folder, TomlConfig};
use kahi_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REGISTRY_SCORE_THRESHOLD: f64 = 0.8;
pub const DATABASE_FILE: &str = "kahi.db";

pub const DATABASE_ENV: &str = "KAHI_DATABASE";
pub const WORKERS_ENV: &str = "KAHI_WORKERS";
pub const ROR_URL_ENV: &str = "KAHI_ROR_URL";
pub const DOAJ_URL_ENV: &str = "KAHI_DOAJ_URL";
pub const CURRENCY_URL_ENV: &str = "KAHI_CURRENCY_URL";
pub const HTTP_TIMEOUT_ENV: &str = "KAHI_HTTP_TIMEOUT_SECS";
pub const THRESHOLD_ENV: &str = "KAHI_REGISTRY_SCORE_THRESHOLD";
pub const CONFLICT_POLICY_ENV: &str = "KAHI_CONFLICT_POLICY";
pub const UNMATCHED_AUTHORS_ENV: &str = "KAHI_UNMATCHED_AUTHOR_POLICY";
pub const ENRICHMENT_ENV: &str = "KAHI_ENRICHMENT";
pub const OA_REGISTRY_ENV: &str = "KAHI_OA_REGISTRY";
pub const LOG_LEVEL_ENV: &str = "KAHI_LOG_LEVEL";

/// Which open-access registry backs venue enrichment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OaRegistryMode {
    /// DOAJ journal dumps staged in the raw-record table
    #[default]
    Staged,
    /// The DOAJ search API
    Live,
}

impl FromStr for OaRegistryMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staged" => Ok(Self::Staged),
            "live" => Ok(Self::Live),
            other => Err(format!("Unknown open-access registry mode: {}", other)),
        }
    }
}

impl fmt::Display for OaRegistryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Staged => f.write_str("staged"),
            Self::Live => f.write_str("live"),
        }
    }
}

/// Values given on the command line; `None` defers to lower tiers
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub workers: Option<usize>,
    pub conflict_policy: Option<ConflictPolicy>,
    pub unmatched_author_policy: Option<UnmatchedAuthorPolicy>,
    /// `Some(false)` from `--no-enrichment`
    pub enrichment: Option<bool>,
    pub oa_registry: Option<OaRegistryMode>,
    pub log_level: Option<String>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct EtlConfig {
    pub database: PathBuf,
    pub workers: usize,
    pub ror_url: String,
    pub doaj_url: String,
    pub currency_url: String,
    pub http_timeout: Duration,
    pub registry_score_threshold: f64,
    pub conflict_policy: ConflictPolicy,
    pub unmatched_author_policy: UnmatchedAuthorPolicy,
    pub enrichment: bool,
    pub oa_registry: OaRegistryMode,
    pub usd_rates: BTreeMap<String, f64>,
    pub log_level: String,
}

/// One setting's value from one tier
fn pick<T>(name: &str, cli: Option<T>, env_key: &str, toml: Option<T>, default: T) -> T
where
    T: FromStr + fmt::Debug,
    T::Err: fmt::Display,
{
    let env = match std::env::var(env_key) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse::<T>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(setting = name, env = env_key, error = %e, "Ignoring invalid environment value");
                None
            }
        },
        _ => None,
    };

    let sources: Vec<&str> = [
        cli.as_ref().map(|_| "command line"),
        env.as_ref().map(|_| "environment"),
        toml.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();
    if sources.len() > 1 {
        warn!(
            "{} set in multiple sources: {}. Using {} (highest priority).",
            name,
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(value) = cli {
        info!("{} = {:?} (command line)", name, value);
        value
    } else if let Some(value) = env {
        info!("{} = {:?} (environment)", name, value);
        value
    } else if let Some(value) = toml {
        info!("{} = {:?} (TOML config)", name, value);
        value
    } else {
        debug!("{} = {:?} (default)", name, default);
        default
    }
}

/// Parse a TOML string setting; an unparseable value is dropped with a warning
fn parse_toml<T>(name: &str, value: Option<&String>) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = value?;
    match raw.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(setting = name, error = %e, "Ignoring invalid TOML value");
            None
        }
    }
}

impl EtlConfig {
    /// Resolve every setting
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Result<Self> {
        let root = resolve_root_folder(cli.root_folder.as_deref(), toml);
        let default_db = root.join(DATABASE_FILE);

        let config = Self {
            database: pick("database", cli.database.clone(), DATABASE_ENV, toml.database.clone(), default_db),
            workers: pick("workers", cli.workers, WORKERS_ENV, toml.workers, DEFAULT_WORKERS),
            ror_url: pick("ror_url", None, ROR_URL_ENV, toml.ror_url.clone(), DEFAULT_ROR_URL.to_string()),
            doaj_url: pick("doaj_url", None, DOAJ_URL_ENV, toml.doaj_url.clone(), DEFAULT_DOAJ_URL.to_string()),
            currency_url: pick(
                "currency_url",
                None,
                CURRENCY_URL_ENV,
                toml.currency_url.clone(),
                DEFAULT_CURRENCY_URL.to_string(),
            ),
            http_timeout: Duration::from_secs(pick(
                "http_timeout_secs",
                None,
                HTTP_TIMEOUT_ENV,
                toml.http_timeout_secs,
                DEFAULT_HTTP_TIMEOUT_SECS,
            )),
            registry_score_threshold: pick(
                "registry_score_threshold",
                None,
                THRESHOLD_ENV,
                toml.registry_score_threshold,
                DEFAULT_REGISTRY_SCORE_THRESHOLD,
            ),
            conflict_policy: pick(
                "conflict_policy",
                cli.conflict_policy,
                CONFLICT_POLICY_ENV,
                parse_toml("conflict_policy", toml.conflict_policy.as_ref()),
                ConflictPolicy::default(),
            ),
            unmatched_author_policy: pick(
                "unmatched_author_policy",
                cli.unmatched_author_policy,
                UNMATCHED_AUTHORS_ENV,
                parse_toml("unmatched_author_policy", toml.unmatched_author_policy.as_ref()),
                UnmatchedAuthorPolicy::default(),
            ),
            enrichment: pick("enrichment", cli.enrichment, ENRICHMENT_ENV, toml.enrichment, true),
            oa_registry: pick(
                "oa_registry",
                cli.oa_registry,
                OA_REGISTRY_ENV,
                parse_toml("oa_registry", toml.oa_registry.as_ref()),
                OaRegistryMode::default(),
            ),
            usd_rates: toml.usd_rates.clone(),
            log_level: pick(
                "log_level",
                cli.log_level.clone(),
                LOG_LEVEL_ENV,
                Some(toml.logging.level.clone()).filter(|l| !l.trim().is_empty()),
                "info".to_string(),
            ),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.registry_score_threshold) {
            return Err(Error::Config(format!(
                "registry_score_threshold must be within 0.0-1.0, got {}",
                self.registry_score_threshold
            )));
        }
        if self.http_timeout.is_zero() {
            return Err(Error::Config("http_timeout_secs must be positive".to_string()));
        }
        if let Some((code, rate)) = self.usd_rates.iter().find(|(_, r)| !r.is_finite() || **r <= 0.0) {
            return Err(Error::Config(format!("usd_rates.{} must be positive, got {}", code, rate)));
        }
        Ok(())
    }

    pub fn database_path(&self) -> &Path {
        &self.database
    }
}
