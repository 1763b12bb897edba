use crate::commands::{chart, classifier, files};
use crate::output;
use crate::services::classifier::batch::BatchOptions;
use crate::services::classifier::client::{ClientConfig, InferenceClient, DEFAULT_ENDPOINT};
use crate::services::classifier::{CandidateLabels, ModelType, Settings};
use crate::services::intake::{FileStore, IntakePolicy};
use crate::shell;
use crate::state::AppState;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Tag images with a remote zero-shot classifier and chart the top labels.
#[derive(Parser, Debug)]
#[command(name = "deep-img", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Inference API token
    #[arg(long, env = "HF_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Base URL of the inference API; the model id is appended
    #[arg(long, env = "DEEP_IMG_ENDPOINT", default_value = DEFAULT_ENDPOINT, global = true)]
    pub endpoint: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60, global = true)]
    pub timeout_secs: u64,

    /// Maximum classification requests in flight (default: all at once)
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// How long the oversize notice stays up, in milliseconds
    #[arg(long, default_value_t = 4000, global = true)]
    pub notice_ms: u64,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add images, classify them, print results and the label chart
    Tag {
        /// Image files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        settings: SettingsArgs,

        /// Walk directories recursively
        #[arg(short, long)]
        recursive: bool,

        /// Write JPEG previews into this directory
        #[arg(long)]
        previews: Option<PathBuf>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive session: add, remove, classify and chart step by step
    Shell {
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// List the supported model ids
    Models,
}

#[derive(Args, Debug)]
pub struct SettingsArgs {
    /// Model id
    #[arg(long, default_value = "openai/clip-vit-base-patch32")]
    pub model: String,

    /// Candidate label (repeat up to 10 times; default: built-in set)
    #[arg(long = "label")]
    pub labels: Vec<String>,
}

impl SettingsArgs {
    pub fn to_settings(&self) -> Result<Settings> {
        let model: ModelType = self.model.parse()?;
        let labels = if self.labels.is_empty() {
            CandidateLabels::default()
        } else {
            CandidateLabels::new(&self.labels)?
        };
        Ok(Settings { model, labels })
    }
}

impl Cli {
    pub fn build_state(&self, settings: Settings) -> Result<AppState> {
        let client = InferenceClient::new(ClientConfig {
            endpoint: self.endpoint.clone(),
            token: self.token.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        })?;
        let store = FileStore::new(IntakePolicy::default(), Duration::from_millis(self.notice_ms));
        let batch = BatchOptions {
            max_concurrency: self.concurrency,
            reclassify: false,
        };
        Ok(AppState::new(store, Arc::new(client), settings, batch))
    }
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Models => {
            for model in ModelType::ALL {
                println!("{}", model);
            }
            Ok(())
        }
        Command::Shell { settings } => {
            let state = cli.build_state(settings.to_settings()?)?;
            let result = shell::run_shell(&state).await;
            state.teardown();
            result
        }
        Command::Tag {
            paths,
            settings,
            recursive,
            previews,
            json,
        } => {
            let state = cli.build_state(settings.to_settings()?)?;
            let result = run_tag(&state, paths, *recursive, previews.as_ref(), *json).await;
            state.teardown();
            result
        }
    }
}

async fn run_tag(
    state: &AppState,
    paths: &[PathBuf],
    recursive: bool,
    previews: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let intake = files::add_paths(state, paths, recursive)
        .await
        .context("failed to read input files")?;
    if !json {
        eprintln!("{}", output::format_intake(&intake));
    }

    let run = classifier::classify_files(state, false).await?;
    let entries = files::list_files(state);
    let chart = chart::get_chart(state);

    if let Some(dir) = previews {
        let written = files::write_previews(state, dir);
        tracing::info!(count = written.len(), dir = %dir.display(), "wrote previews");
    }

    if json {
        println!(
            "{}",
            output::format_json(&output::TagOutput {
                intake: &intake,
                run: &run,
                files: &entries,
                chart: chart.as_ref(),
            })
        );
        return Ok(());
    }

    println!("{}", output::format_files(&entries));
    if run.total > 0 {
        println!("\n{}", output::format_report(&run));
    }
    if let Some(chart) = &chart {
        println!("\n{}", output::format_chart(chart));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tag_with_labels() {
        let cli = Cli::try_parse_from([
            "deep-img",
            "tag",
            "a.jpg",
            "photos/",
            "--label",
            "cat",
            "--label",
            "dog",
            "--concurrency",
            "4",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.concurrency, Some(4));
        match cli.command {
            Command::Tag {
                paths, settings, json, ..
            } => {
                assert_eq!(paths.len(), 2);
                assert!(json);
                let settings = settings.to_settings().unwrap();
                assert_eq!(settings.labels.as_slice(), ["cat", "dog"]);
                assert_eq!(settings.model, ModelType::ClipVitBasePatch32);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn unknown_model_is_rejected() {
        let args = SettingsArgs {
            model: "acme/nope".into(),
            labels: Vec::new(),
        };
        assert!(args.to_settings().is_err());
    }

    #[test]
    fn tag_requires_paths() {
        assert!(Cli::try_parse_from(["deep-img", "tag"]).is_err());
    }

    #[test]
    fn state_builds_without_token() {
        let cli = Cli::try_parse_from(["deep-img", "--notice-ms", "10", "models"]).unwrap();
        let state = cli.build_state(Settings::default()).unwrap();
        assert_eq!(state.store.notice().delay(), Duration::from_millis(10));
    }
}
