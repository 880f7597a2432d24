use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use globo_core::types::Mode;
use globo_core::{
    AudioError, AudioPlaybackController, CredentialCheck, ModelCatalog, PlaybackEvent,
    SessionController, SessionError, VoiceCatalog, locale,
};
use globo_native_utils::CpalOutput;
use globo_providers::{ElevenLabsNarrator, OpenAiChat, PromptSet, WolframVisualizer};
use globo_service::commands::{self, HELP, ReplCommand};
use globo_service::config::Config;
use globo_service::history_cache::FileHistoryCache;
use globo_service::prompt_loader;
use globo_service::render::{render_error, render_message};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Math homework help from Gloria, in Spanish or English")]
struct Cli {
    /// Start in developer mode (English, structured replies)
    #[arg(long)]
    developer: bool,
    /// Continue the cached conversation of the selected mode
    #[arg(long)]
    resume: bool,
    /// Never narrate replies
    #[arg(long)]
    no_audio: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List the chat models available to the configured key
    Models,
    /// Check that the configured OpenAI key works
    CheckKey,
    /// List the audio output devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load application configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let prompts = prompt_loader::load_prompt_overrides(&config.prompts_dir)
        .context("Failed to load LLM prompts")?;
    tracing::info!("Loaded {} prompt overrides.", prompts.len());

    let openai_config = globo_providers::Config::builder()
        .with_base_url(&config.openai_base_url)
        .with_api_key(&config.openai_api_key)
        .with_chat_model(&config.chat_model)
        .with_vision_model(&config.vision_model)
        .build();
    let chat = Arc::new(
        OpenAiChat::new(openai_config).with_prompts(PromptSet::default().with_overrides(&prompts)),
    );

    match cli.command {
        Some(Command::Models) => return list_models(chat.as_ref()).await,
        Some(Command::CheckKey) => return check_key(chat.as_ref()).await,
        Some(Command::Devices) => {
            println!("{}", globo_native_utils::device::get_available_outputs()?);
            return Ok(());
        }
        None => {}
    }

    let mode = if cli.developer {
        Mode::Developer
    } else {
        Mode::Standard
    };
    let session = Arc::new(build_session(&config, chat.clone(), mode, cli.no_audio));
    let resumed = cli.resume && session.restore_from_cache();

    for message in session.messages() {
        println!("{}", render_message(&message, mode));
    }
    if !resumed {
        if let Some(welcome) = session.messages().first() {
            spawn_play(session.clone(), welcome.id());
        }
    }

    run_repl(session.clone()).await?;

    session.stop_audio();
    let stats = chat.stats();
    tracing::info!(
        "Session finished. Tokens used: {} ({} in, {} out).",
        stats.total_tokens(),
        stats.input_tokens(),
        stats.output_tokens()
    );
    Ok(())
}

fn build_session(
    config: &Config,
    chat: Arc<OpenAiChat>,
    mode: Mode,
    no_audio: bool,
) -> SessionController {
    let mut builder = SessionController::builder(chat)
        .with_cache(Arc::new(FileHistoryCache::new(&config.history_path)))
        .with_voices(VoiceCatalog::new(&config.voice_id, &config.voice_id_en));

    match config.wolfram_app_id.as_deref() {
        Some(app_id) => {
            builder = builder.with_visualization(Arc::new(WolframVisualizer::new(app_id)));
        }
        None => tracing::info!("WOLFRAM_APP_ID not set, visualizations disabled."),
    }

    match (config.elevenlabs_api_key.as_deref(), no_audio) {
        (_, true) => tracing::info!("Narration disabled by --no-audio."),
        (None, false) => tracing::info!("ELEVENLABS_API_KEY not set, narration disabled."),
        (Some(api_key), false) => {
            let audio = AudioPlaybackController::new(
                Arc::new(ElevenLabsNarrator::new(api_key)),
                Arc::new(CpalOutput::new(config.output_device.clone())),
            )
            .with_settle_delay(config.audio_settle);
            let audio = Arc::new(audio);
            watch_playback(&audio);
            builder = builder.with_audio(audio);
        }
    }

    builder.build(mode)
}

fn watch_playback(audio: &AudioPlaybackController) {
    let mut events = audio.events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                PlaybackEvent::Started { generation } => {
                    tracing::debug!("Narration {} started", generation)
                }
                PlaybackEvent::Finished { generation } => {
                    tracing::debug!("Narration {} finished", generation)
                }
                PlaybackEvent::Stopped { generation } => {
                    tracing::debug!("Narration {} stopped", generation)
                }
            }
        }
    });
}

async fn run_repl(session: Arc<SessionController>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, shutting down.");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match ReplCommand::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("! {e}");
                continue;
            }
        };

        match command {
            ReplCommand::Submit(raw) => spawn_submit(session.clone(), raw),
            ReplCommand::Photo(path) => match commands::photo_submission(&path) {
                Ok(raw) => spawn_submit(session.clone(), raw),
                Err(e) => println!("! {e:#}"),
            },
            ReplCommand::Play(id) => spawn_play(session.clone(), id),
            ReplCommand::Stop => {
                session.stop_audio();
            }
            ReplCommand::SwitchMode(mode) => {
                let welcome = session.switch_mode(mode);
                println!("{}", render_message(&welcome, mode));
                spawn_play(session.clone(), welcome.id());
            }
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Quit => break,
        }
    }
    Ok(())
}

fn spawn_submit(session: Arc<SessionController>, raw: String) {
    let mode = session.mode();
    if session.is_loading() {
        println!("{}", locale::loading_message(mode));
        return;
    }
    tokio::spawn(async move {
        println!("{}", locale::loading_message(mode));
        match session.submit(&raw).await {
            Ok(reply) => println!("{}", render_message(&reply, mode)),
            Err(SessionError::Busy) => println!("{}", locale::loading_message(mode)),
            Err(SessionError::Stale) => tracing::debug!("Reply dropped after a mode switch"),
            Err(e) => {
                tracing::debug!("Exchange failed: {}", e);
                if let Some(notice) = session.last_error() {
                    println!("{}", render_error(&notice));
                }
            }
        }
    });
}

fn spawn_play(session: Arc<SessionController>, id: globo_core::types::MessageId) {
    if session.audio().is_none() {
        return;
    }
    tokio::spawn(async move {
        match session.play_message(id).await {
            Ok(()) | Err(SessionError::Audio(AudioError::Superseded)) => {}
            Err(e) => {
                let notice = locale::error_notice(session.mode(), &e);
                println!("{}", render_error(&notice));
            }
        }
    });
}

async fn list_models(catalog: &dyn ModelCatalog) -> Result<()> {
    let models = catalog
        .list_models()
        .await
        .context("Failed to list models")?;
    for model in models {
        println!("{model}");
    }
    Ok(())
}

async fn check_key(check: &dyn CredentialCheck) -> Result<()> {
    let status = check
        .check_credential()
        .await
        .context("Failed to check the OpenAI key")?;
    println!("{}", status.message);
    if !status.valid {
        anyhow::bail!("the configured OpenAI key was rejected");
    }
    Ok(())
}
