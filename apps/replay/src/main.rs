mod error;
mod fixture;
mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use convo_interface::UserId;
use hypr_transcript::chat::{ChatEvent, ChatFrame, TypingTracker, merge_timeline, parse_chat};
use hypr_transcript::{
    ChannelDispatcher, ChannelObserver, Clock, EngineConfig, RenderMode, Session, SpeechDone,
    SpeechRequest, SystemClock, TranscriptEvent,
};
use tokio::sync::mpsc::UnboundedReceiver;

use error::Error;
use fixture::FixtureEvent;

#[derive(Clone, Copy, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum ModeArg {
    Text,
    Word,
    Auto,
}

impl From<ModeArg> for RenderMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Text => RenderMode::Text,
            ModeArg::Word => RenderMode::Word,
            ModeArg::Auto => RenderMode::Auto,
        }
    }
}

#[derive(Parser)]
#[command(name = "convo-replay", about = "Replay a recorded conversation through the transcript engine")]
struct Args {
    /// JSON-lines fixture of frames, payloads, clock updates and chat.
    #[arg(short, long)]
    fixture: PathBuf,

    #[arg(long, env = "TRANSCRIPT_SENTINEL")]
    sentinel: Option<String>,

    #[arg(long, env = "TRANSCRIPT_RENDER_MODE")]
    mode: Option<ModeArg>,

    #[arg(long, env = "TRANSCRIPT_TICK_INTERVAL_MS")]
    tick_ms: Option<u64>,

    /// Chat from this user counts as our own.
    #[arg(long, env = "REPLAY_LOCAL_USER", default_value = "42")]
    local_user: String,

    /// Frames per replayed payload.
    #[arg(long, default_value_t = 2)]
    parts: usize,
}

impl Args {
    fn config(&self) -> Result<EngineConfig, Error> {
        let mut config = EngineConfig::from_env()?;
        if let Some(sentinel) = &self.sentinel {
            config.sentinel = Some(sentinel.clone()).filter(|s| !s.trim().is_empty());
        }
        if let Some(mode) = self.mode {
            tracing::info!(%mode, "render_mode_from_args");
            config.render_mode = mode.into();
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_interval_ms = tick_ms;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.config()?;
    let events = fixture::parse(&std::fs::read_to_string(&args.fixture)?)?;

    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    let (speech_tx, mut speech_rx) = tokio::sync::mpsc::unbounded_channel();
    let session = Session::builder()
        .config(config)
        .observer(ChannelObserver(event_tx))
        .dispatcher(ChannelDispatcher(speech_tx))
        .build();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let local_user = UserId::from(args.local_user.as_str());
    let mut typing = TypingTracker::default();
    let mut typed = Vec::new();

    for (n, event) in events.into_iter().enumerate() {
        match event {
            FixtureEvent::Frame { data } => {
                if let Some(done) = session.handle_stream_message(data.as_bytes()).await {
                    wait_for_speech(done).await;
                }
            }
            FixtureEvent::Payload { value } => {
                let message_id = value
                    .get("message_id")
                    .and_then(|id| id.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("replay-{n}"));
                for frame in fixture::chunk(&message_id, &value, args.parts) {
                    if let Some(done) = session.handle_stream_message(frame.as_bytes()).await {
                        wait_for_speech(done).await;
                    }
                }
            }
            FixtureEvent::Pts { ms } => {
                session.set_pts(ms).await;
            }
            FixtureEvent::AudioMetadata { pts } => {
                session.handle_audio_metadata(&pts.to_le_bytes()).await;
            }
            FixtureEvent::Chat { from, data, at } => {
                let Some(chat) = parse_chat(ChatFrame::Text(&data), &from, &local_user, at, clock.as_ref()) else {
                    continue;
                };
                typing.observe(&chat, std::time::Instant::now());
                match chat {
                    ChatEvent::Typing(user) => println!("~ {user} is typing"),
                    ChatEvent::Message(message) => typed.push(message),
                }
            }
            FixtureEvent::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            FixtureEvent::Cleanup => {
                session.cleanup().await;
                println!("-- cleanup --");
            }
        }

        drain(&mut event_rx, &mut speech_rx);
    }

    session.tick().await;
    drain(&mut event_rx, &mut speech_rx);

    println!("== timeline ==");
    for item in merge_timeline(&session.snapshot().await, &typed) {
        println!("{}", render::timeline_item(&item));
    }
    for user in typing.active(std::time::Instant::now()) {
        println!("~ {user} is still typing");
    }

    Ok(())
}

async fn wait_for_speech(done: SpeechDone) {
    if let Err(error) = done.await {
        tracing::warn!(%error, "speech_dispatch_abandoned");
    }
}

fn drain(
    events: &mut UnboundedReceiver<TranscriptEvent>,
    speech: &mut UnboundedReceiver<SpeechRequest>,
) {
    while let Ok(request) = speech.try_recv() {
        println!("> speak turn {}: {}", request.turn_id, request.text);
    }

    while let Ok(event) = events.try_recv() {
        match event {
            TranscriptEvent::Updated(snapshot) => {
                println!("-- transcript ({} entries) --", snapshot.len());
                for entry in snapshot.iter() {
                    println!("{}", render::entry(entry));
                }
            }
            TranscriptEvent::UserActivity(turn_id) => {
                tracing::debug!(turn_id = %turn_id, "user_activity");
            }
        }
    }
}
