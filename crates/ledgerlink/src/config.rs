//! Application configuration.
//!
//! Plain structs loaded from a TOML file, with defaults for every field
//! so a partial file works. Feature toggles are explicit booleans
//! checked at each decision point; no behavior-swapping indirection.

use anyhow::{Context, Result};
use ledgerlink_protocol::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the ledgerlink binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database path. Defaults under the ledgerlink home.
    pub db_path: PathBuf,
    /// Acting-user tag stamped on committed delivery files.
    pub created_by: String,
    pub recipient: RecipientConfig,
    pub retry: RetryConfig,
    pub toggles: Toggles,
    pub migration: MigrationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipientConfig {
    pub base_url: String,
    /// Per-call budget; a timeout counts as a transient failure.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub contribution: RetryPolicy,
    pub final_cost: RetryPolicy,
    /// Distinct policy for acknowledgement traffic to the source adapter.
    pub ack: RetryPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Toggles {
    /// No outbound call; the send policy synthesizes a local success.
    pub isolated_send: bool,
    /// No source mutation on acks; a synthetic zero id is returned.
    pub isolated_ack: bool,
    /// Route migrated payloads through the anonymization collaborator.
    pub anonymize_on_migrate: bool,
    /// Smoke-test mode: at most one migration task per batch.
    pub limited_migration_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    pub workers_per_kind: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: ledgerlink_logging::ledgerlink_home().join("ledgerlink.sqlite3"),
            created_by: "ledgerlink".to_string(),
            recipient: RecipientConfig::default(),
            retry: RetryConfig::default(),
            toggles: Toggles::default(),
            migration: MigrationSettings::default(),
        }
    }
}

impl Default for RecipientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            contribution: RetryPolicy::named("contribution-send"),
            final_cost: RetryPolicy::named("final-cost-send"),
            ack: RetryPolicy::named("ack-source"),
        }
    }
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            isolated_send: false,
            isolated_ack: false,
            anonymize_on_migrate: false,
            limited_migration_run: false,
        }
    }
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self { workers_per_kind: 2 }
    }
}

impl AppConfig {
    /// Load from an explicit path, or from `<home>/config.toml` when it
    /// exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let default = ledgerlink_logging::ledgerlink_home().join("config.toml");
                default.exists().then_some(default)
            }
        };

        match resolved {
            Some(p) => {
                let text = std::fs::read_to_string(&p)
                    .with_context(|| format!("Failed to read config: {}", p.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("Failed to parse config: {}", p.display()))
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            created_by = "scheduler"

            [toggles]
            isolated_send = true
            "#,
        )
        .unwrap();

        assert_eq!(cfg.created_by, "scheduler");
        assert!(cfg.toggles.isolated_send);
        assert!(!cfg.toggles.isolated_ack);
        assert_eq!(cfg.migration.workers_per_kind, 2);
        assert_eq!(cfg.retry.ack.name, "ack-source");
    }

    #[test]
    fn test_retry_policies_are_named_per_traffic_class() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.retry.contribution.name, "contribution-send");
        assert_eq!(cfg.retry.final_cost.name, "final-cost-send");
        assert_eq!(cfg.retry.ack.name, "ack-source");
    }
}
