use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use envconfig::Envconfig;
use rollout::{config::Config, DeleteOutcome, Feature, Manager};
use tracing::info;

use crate::output::format_table;

/// Exit code for commands that found nothing to act on.
pub const NOT_FOUND_EXIT_CODE: i32 = 3;

#[derive(Parser, Debug)]
#[command(name = "rollout", version, about = "Manage feature flag rollouts stored in redis", long_about = None)]
pub struct Cli {
    /// The redis server to connect to, overrides REDIS_URL
    #[arg(long, env = "ROLLOUT_HOST")]
    host: Option<String>,

    /// Namespace for feature flag keys, overrides KEY_PREFIX
    #[arg(long, env = "ROLLOUT_PREFIX")]
    prefix: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List every feature flag under the key prefix
    List,

    /// Roll a feature flag out to a percentage of teams
    Rollout {
        name: String,
        percentage: u8,
    },

    /// Turn a feature flag on for every team
    Activate { name: String },

    /// Turn a feature flag off for every team, dropping explicit teams
    Deactivate { name: String },

    /// Turn a feature flag on for a single team
    ActivateTeam {
        name: String,
        #[arg(allow_negative_numbers = true)]
        team_id: i64,
    },

    /// Remove a single team from a feature flag
    DeactivateTeam {
        name: String,
        #[arg(allow_negative_numbers = true)]
        team_id: i64,
    },

    /// Remove a feature flag from redis
    Delete { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done(String),
    Table(String),
    NotFound(String),
}

impl Outcome {
    pub fn message(&self) -> &str {
        match self {
            Outcome::Done(message) | Outcome::Table(message) | Outcome::NotFound(message) => {
                message
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::NotFound(_) => NOT_FOUND_EXIT_CODE,
            _ => 0,
        }
    }
}

impl Cli {
    pub async fn run() -> Result<Outcome> {
        let cli = Cli::parse();
        let config = cli.apply_overrides(
            Config::init_from_env().context("Failed to load rollout configuration")?,
        );

        let manager = Manager::from_config(&config)
            .await
            .with_context(|| format!("Failed to connect to redis at {}", config.redis_url))?;

        execute(&cli.command, &manager).await
    }

    pub fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(host) = &self.host {
            config.redis_url = host.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.key_prefix = prefix.clone();
        }
        config
    }

    pub fn command(&self) -> &Commands {
        &self.command
    }
}

pub async fn execute(command: &Commands, manager: &Manager) -> Result<Outcome> {
    match command {
        Commands::List => {
            let features = manager.list().await.context("Failed to list feature flags")?;
            info!(count = features.len(), "listed feature flags");
            Ok(Outcome::Table(format_table(&features)))
        }
        Commands::Rollout { name, percentage } => {
            let mut feature = Feature::new(name.as_str());
            manager
                .activate_percentage(&mut feature, *percentage)
                .await
                .with_context(|| format!("Failed to roll out {name}"))?;
            Ok(Outcome::Done(format!(
                "Feature flag {name} rolled out to {percentage}% of teams"
            )))
        }
        Commands::Activate { name } => {
            let mut feature = Feature::new(name.as_str());
            manager
                .activate(&mut feature)
                .await
                .with_context(|| format!("Failed to activate {name}"))?;
            Ok(Outcome::Done(format!("Feature flag {name} activated")))
        }
        Commands::Deactivate { name } => {
            let mut feature = Feature::new(name.as_str());
            manager
                .deactivate(&mut feature)
                .await
                .with_context(|| format!("Failed to deactivate {name}"))?;
            Ok(Outcome::Done(format!("Feature flag {name} deactivated")))
        }
        Commands::ActivateTeam { name, team_id } => {
            let mut feature = Feature::new(name.as_str());
            manager
                .activate_team(*team_id, &mut feature)
                .await
                .with_context(|| format!("Failed to activate {name} for team {team_id}"))?;
            Ok(Outcome::Done(format!(
                "Feature flag {name} activated for team {team_id}"
            )))
        }
        Commands::DeactivateTeam { name, team_id } => {
            let mut feature = Feature::new(name.as_str());
            manager
                .deactivate_team(*team_id, &mut feature)
                .await
                .with_context(|| format!("Failed to deactivate {name} for team {team_id}"))?;
            Ok(Outcome::Done(format!(
                "Feature flag {name} deactivated for team {team_id}"
            )))
        }
        Commands::Delete { name } => {
            let feature = Feature::new(name.as_str());
            let outcome = manager
                .delete(&feature)
                .await
                .with_context(|| format!("Failed to delete {name}"))?;
            match outcome {
                DeleteOutcome::Deleted => {
                    Ok(Outcome::Done(format!("Feature flag {name} deleted")))
                }
                DeleteOutcome::NotFound => {
                    Ok(Outcome::NotFound("Feature flag was not found".to_string()))
                }
            }
        }
    }
}
