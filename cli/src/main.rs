//! CLI entrypoint for roundtable
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use roundtable_application::DiscussionManager;
use roundtable_application::bus::recv_lossy;
use roundtable_domain::{
    AgentProfile, Discussion, DiscussionEvent, DiscussionId, DiscussionSettings, NewMessage,
};
use roundtable_infrastructure::{
    ConfigLoader, FileConfig, FilePersona, InMemoryDiscussionRepository, JsonlTranscriptLogger,
    ScriptedBackend,
};
use roundtable_presentation::{Cli, ConsoleFormatter, ConsoleRenderer};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DISCUSSION_ID: &str = "main";

/// How long the renderer may take to drain buffered events on shutdown
const RENDER_GRACE: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli)?;

    info!("Starting roundtable");

    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow!("failed to load configuration: {e}"))?
    };
    if let Some(rounds) = cli.rounds {
        config.scheduler.round_limit = rounds;
    }
    if cli.no_stream {
        config.agents.streaming = false;
    }

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        println!();
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    config.validate().context("invalid configuration")?;
    if !config.output.color {
        ConsoleFormatter::disable_color();
    }

    let Some(topic) = cli.topic.clone() else {
        bail!("A topic is required, e.g. roundtable \"Should we rewrite the parser?\"");
    };

    // === Dependency Injection ===
    let repository = Arc::new(InMemoryDiscussionRepository::new());
    let seeded = seed(&repository, &config, &topic);

    let mut builder = DiscussionManager::builder(repository, Arc::new(ScriptedBackend::new()))
        .config(config.to_roundtable_config());
    if let Some(path) = &cli.transcript {
        let logger = JsonlTranscriptLogger::create(path)
            .with_context(|| format!("cannot create transcript {}", path.display()))?;
        builder = builder.transcript(Arc::new(logger));
    }
    let manager = builder.build();

    manager
        .switch_discussion(Some(seeded.discussion_id.clone()))
        .await?;

    print!(
        "{}",
        ConsoleFormatter::banner(&config.discussion.title, &topic, &seeded.cast, &seeded.settings)
    );

    let shutdown = CancellationToken::new();
    let renderer = ConsoleRenderer::new(&seeded.cast, config.output.show_thinking && !cli.quiet);
    let mut render_task = tokio::spawn(renderer.run(manager.subscribe(), shutdown.clone()));
    let mut events = manager.subscribe();

    manager.run().await?;

    tokio::select! {
        _ = wait_for_pause(&mut events) => info!("Discussion paused"),
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Cannot listen for Ctrl-C");
            }
            info!("Interrupted");
            manager.pause();
        }
    }

    manager.destroy().await;
    drop(manager);

    let finished = match tokio::time::timeout(RENDER_GRACE, &mut render_task).await {
        Ok(joined) => joined??,
        Err(_) => {
            shutdown.cancel();
            render_task.await??
        }
    };
    info!(finished, "Roundtable closed");

    Ok(())
}

/// Initialize logging based on verbosity level, optionally mirrored to a file
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::new(cli.log_level());
    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file, guard) = match &cli.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path.file_name().context("--log-file must name a file")?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    Ok(guard)
}

/// What `seed` put into the repository
struct Seeded {
    discussion_id: DiscussionId,
    cast: Vec<AgentProfile>,
    settings: DiscussionSettings,
}

/// Store the configured discussion, its personas and the opening topic.
fn seed(repository: &InMemoryDiscussionRepository, config: &FileConfig, topic: &str) -> Seeded {
    let discussion_id = DiscussionId::new(DISCUSSION_ID);
    let personas = config.personas_or_default();
    let cast: Vec<AgentProfile> = personas.iter().map(|p| p.profile.clone()).collect();

    let mut settings = config.discussion.settings.clone();
    settings.round_limit = config.scheduler.round_limit;

    repository.seed_discussion(
        Discussion::new(discussion_id.clone(), config.discussion.title.clone())
            .with_topic(topic)
            .with_settings(settings.clone()),
    );
    repository.seed_agents(cast.clone());
    repository.seed_members(
        &discussion_id,
        personas.iter().map(FilePersona::to_member).collect(),
    );
    repository.seed_message(NewMessage::user(discussion_id.clone(), topic));

    Seeded {
        discussion_id,
        cast,
        settings,
    }
}

async fn wait_for_pause(events: &mut broadcast::Receiver<DiscussionEvent>) {
    while let Some(event) = recv_lossy(events, "cli").await {
        if matches!(event, DiscussionEvent::Paused) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_domain::Author;

    #[test]
    fn test_seed_uses_scheduler_round_limit() {
        let repository = InMemoryDiscussionRepository::new();
        let mut config = FileConfig::default();
        config.scheduler.round_limit = 4;

        let seeded = seed(&repository, &config, "Tabs or spaces?");

        assert_eq!(seeded.settings.round_limit, 4);
        assert_eq!(seeded.cast.len(), 3);
        assert_eq!(repository.message_count(&seeded.discussion_id), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discussion_runs_until_round_budget() {
        let repository = Arc::new(InMemoryDiscussionRepository::new());
        let mut config = FileConfig::default();
        config.scheduler.round_limit = 3;
        config.agents.streaming = false;
        let seeded = seed(&repository, &config, "Tabs or spaces?");

        let manager = DiscussionManager::builder(
            repository.clone(),
            Arc::new(ScriptedBackend::new().with_chunk_delay(Duration::ZERO)),
        )
        .config(config.to_roundtable_config())
        .build();
        manager
            .switch_discussion(Some(seeded.discussion_id.clone()))
            .await
            .unwrap();
        let mut events = manager.subscribe();

        manager.run().await.unwrap();
        tokio::time::timeout(Duration::from_secs(300), wait_for_pause(&mut events))
            .await
            .unwrap();

        let state = manager.state();
        let agent_replies = state
            .messages()
            .iter()
            .filter(|m| matches!(m.author, Author::Agent(_)))
            .count();
        assert_eq!(agent_replies, 3);
        assert!(
            state
                .messages()
                .iter()
                .any(|m| m.author == Author::System)
        );

        manager.destroy().await;
    }
}
