//! `rcpd`: illustrative wiring that assembles a `Configuration` from
//! environment variables and starts the server. This is the minimal glue a
//! caller needs — the real CLI front-ends (`cup`, `cupd`) that parse flags,
//! load config files and set up logging policy are out of scope for the
//! core (spec.md §1) and are not reproduced here.

use std::path::PathBuf;
use std::time::Duration;

use rcp::config::{Configuration, ScmConfig, SourceConfig};
use rcp::source::git::GitCredentials;
use rcp::Server;

fn configuration_from_env() -> anyhow::Result<Configuration> {
    let config_dir = std::env::var("RCP_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let default_revision =
        std::env::var("RCP_REVISION").unwrap_or_else(|_| "main".to_string());

    let source = match std::env::var("RCP_GIT_REMOTE") {
        Ok(url) => {
            let auth = match (std::env::var("RCP_GIT_USERNAME"), std::env::var("RCP_GIT_PASSWORD")) {
                (Ok(username), Ok(password)) => Some(GitCredentials { username, password }),
                _ => None,
            };

            let scm = match std::env::var("RCP_GITHUB_TOKEN") {
                Ok(token) => ScmConfig::GitHub {
                    token,
                    owner: std::env::var("RCP_GITHUB_OWNER")?,
                    repo: std::env::var("RCP_GITHUB_REPO")?,
                },
                Err(_) => ScmConfig::Mem,
            };

            let poll_interval = std::env::var("RCP_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(30));

            SourceConfig::Git {
                url,
                auth,
                poll_interval,
                scm,
            }
        }
        Err(_) => SourceConfig::Local {
            path: PathBuf::from(
                std::env::var("RCP_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            ),
        },
    };

    Ok(Configuration {
        config_dir: PathBuf::from(config_dir),
        source,
        default_revision,
        identity_provider: None,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let configuration = configuration_from_env()?;
    let bind = std::env::var("RCP_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    tracing::info!(%bind, config_dir = %configuration.config_dir.display(), "starting rcpd");

    let server = Server::new(&configuration)?;
    server.run(bind).await?;

    Ok(())
}
