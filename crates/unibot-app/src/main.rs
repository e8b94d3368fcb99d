//! UniBot application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Build the chat orchestrator with the configured backend
//! 3. Either chat on the terminal (`--repl`) or start the axum REST API server

mod cli;

use std::io;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use unibot_api::routes;
use unibot_api::state::AppState;
use unibot_chat::{ChatError, ChatOrchestrator};
use unibot_core::config::UnibotConfig;

use crate::cli::CliArgs;

/// Read lines from `input` and write replies to `output` until EOF or `exit`.
///
/// The session id is taken from each reply, so a session that expired while
/// idle is replaced and the conversation continues in the new one.
async fn run_repl<R, W>(orchestrator: &ChatOrchestrator, input: R, mut output: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let activation = orchestrator.activate(None).await;
    let mut session_id = activation.session_id;
    if let Some(welcome) = activation.welcome {
        output.write_all(format!("{}\n", welcome).as_bytes()).await?;
    }

    let mut lines = input.lines();
    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        let reply = match orchestrator.handle_message(line, Some(session_id)).await {
            Ok(reply) => {
                session_id = reply.session_id;
                reply.answer
            }
            Err(ChatError::EmptyMessage) => continue,
            Err(e) => e.to_string(),
        };
        output.write_all(format!("{}\n", reply).as_bytes()).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing is up so its log level can seed the filter.
    let config_file = args.resolve_config_path();
    let loaded = if config_file.exists() {
        Some(UnibotConfig::load(&config_file))
    } else {
        None
    };
    let mut config = match &loaded {
        Some(Ok(config)) => config.clone(),
        _ => UnibotConfig::default(),
    };

    // Tracing.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting UniBot v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Some(Ok(_)) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(Err(e)) => {
            tracing::warn!(path = %config_file.display(), error = %e, "Invalid config, using defaults")
        }
        None => tracing::info!(path = %config_file.display(), "No config file, using defaults"),
    }

    // CLI / env overrides.
    config.server.port = args.resolve_port(config.server.port);
    if let Some(source) = args.resolve_knowledge() {
        config.knowledge.source = source;
    }
    config.validate()?;

    // Chat engine.
    let orchestrator = Arc::new(ChatOrchestrator::from_config(&config)?);
    if let Err(e) = orchestrator.engine().warm_up().await {
        tracing::warn!(error = %e, "Backend warm-up failed; turns will retry");
    }

    if args.repl {
        run_repl(
            &orchestrator,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
        .await?;
        return Ok(());
    }

    // === Background tasks ===

    let purge_orchestrator = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let purged = purge_orchestrator.purge_expired();
            if purged > 0 {
                tracing::info!(purged, "Expired sessions removed");
            }
        }
    });

    // === API server ===

    let state = AppState::new(config, Arc::clone(&orchestrator));
    if let Err(e) = routes::start_server(state).await {
        tracing::error!(error = %e, "API server stopped");
        return Err(e.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, DuplexStream};
    use unibot_chat::knowledge::{KnowledgeBase, KnowledgeEntry, StaticKnowledgeSource};
    use unibot_chat::{ChatEngine, KnowledgeBackend, KnowledgeLoader, WELCOME_MESSAGE};
    use unibot_core::config::{CachePolicy, ChatConfig};

    const DORM_ANSWER: &str = "Dorms cost $4,000 per semester.";

    fn orchestrator() -> Arc<ChatOrchestrator> {
        let kb = KnowledgeBase::new(vec![KnowledgeEntry {
            questions: vec![],
            keywords: vec!["dorm".to_string()],
            answer: DORM_ANSWER.to_string(),
        }]);
        let loader = KnowledgeLoader::new(
            Arc::new(StaticKnowledgeSource::new(kb)),
            CachePolicy::Cached,
        );
        let engine = ChatEngine::with_backend(Arc::new(KnowledgeBackend::new(Arc::new(loader))));
        Arc::new(ChatOrchestrator::new(ChatConfig::default(), Arc::new(engine)))
    }

    /// Read REPL output up to and including the next prompt.
    async fn read_until_prompt(output: &mut DuplexStream) -> String {
        let mut bytes = Vec::new();
        let mut buf = [0u8; 1024];
        while !bytes.ends_with(b"> ") {
            let n = output.read(&mut buf).await.unwrap();
            assert!(n > 0, "REPL closed early");
            bytes.extend_from_slice(&buf[..n]);
        }
        String::from_utf8(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_repl_follows_replacement_session() {
        let orch = orchestrator();
        let (mut input_tx, input_rx) = tokio::io::duplex(4096);
        let (output_tx, mut output_rx) = tokio::io::duplex(4096);

        let repl_orch = Arc::clone(&orch);
        let repl = tokio::spawn(async move {
            run_repl(&repl_orch, BufReader::new(input_rx), output_tx).await
        });

        let banner = read_until_prompt(&mut output_rx).await;
        assert!(banner.starts_with(WELCOME_MESSAGE));

        // Drop the REPL's session, as expiry would.
        let stale = orch.list_sessions().await[0].id;
        orch.delete_session(stale).unwrap();

        input_tx.write_all(b"How much is a dorm room\n").await.unwrap();
        assert!(read_until_prompt(&mut output_rx).await.starts_with(DORM_ANSWER));

        input_tx.write_all(b"more details\n").await.unwrap();
        let elaborated = read_until_prompt(&mut output_rx).await;
        assert!(elaborated.starts_with(&format!("{}\n\n", DORM_ANSWER)));

        assert_eq!(orch.session_count(), 1);
        assert_ne!(orch.list_sessions().await[0].id, stale);

        input_tx.write_all(b"exit\n").await.unwrap();
        repl.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_repl_skips_blank_lines_and_stops_at_eof() {
        let orch = orchestrator();
        let input = BufReader::new(&b"\n   \nHow much is a dorm room\n"[..]);
        let mut output = Vec::new();
        run_repl(&orch, input, &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.matches(DORM_ANSWER).count(), 1);
        assert_eq!(orch.list_sessions().await[0].message_count, 1);
    }
}
