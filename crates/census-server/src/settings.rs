//! Runtime configuration, layered from `config.toml` and `CENSUS_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use census_core::roster::Roster;
use serde::Deserialize;

/// Runtime server configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  pub store_path:          PathBuf,
  pub admin_username:      String,
  /// PHC string from `census-server --hash-password`.
  pub admin_password_hash: String,
  /// Replaces the built-in roster when present.
  #[serde(default)]
  pub roster:              Option<Roster>,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

impl ServerConfig {
  /// Read `path` (optional) and then the environment, later sources winning.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("CENSUS"))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  /// `store_path` with a leading `~` expanded.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use census_core::{
    fact::SubmissionType,
    roster::{Requirement, ScopeRequirement},
  };

  use super::*;

  fn parse(toml: &str) -> ServerConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn minimal_config_uses_defaults() {
    let cfg = parse(
      r#"
        store_path          = "census.db"
        admin_username      = "admin"
        admin_password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
      "#,
    );
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 8080);
    assert!(cfg.roster.is_none());
  }

  #[test]
  fn roster_override_is_read() {
    let cfg = parse(
      r#"
        store_path          = "census.db"
        admin_username      = "admin"
        admin_password_hash = "x"

        [roster.non-teaching-staff]
        kind   = "scopes"
        scopes = [{ scope = "Group B" }, { scope = "Group C" }]
      "#,
    );
    let roster = cfg.roster.unwrap();
    assert_eq!(
      roster.requirement(SubmissionType::NonTeachingStaff),
      Requirement::Scopes(vec![
        ScopeRequirement::new("Group B", None),
        ScopeRequirement::new("Group C", None),
      ])
    );
    assert_eq!(
      roster.requirement(SubmissionType::TeachingStaff),
      Requirement::AnyRow
    );
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    let expanded = expand_tilde(Path::new("~/census.db"));
    assert_eq!(expanded, PathBuf::from(home).join("census.db"));
    assert_eq!(expand_tilde(Path::new("/tmp/x.db")), PathBuf::from("/tmp/x.db"));
  }
}
