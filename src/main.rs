//! board-speaker-rs: reads bulletin-board threads aloud.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use board_speaker::api::{self, ApiState};
use board_speaker::board::thread::parse_thread;
use board_speaker::board::Dialect;
use board_speaker::config::Config;
use board_speaker::history::History;
use board_speaker::reader::ThreadReader;
use board_speaker::speech::dispatcher::SpeechDispatcher;
use board_speaker::speech::kokoro::KokoroSynthesizer;
use board_speaker::speech::relay::RelayClient;
use board_speaker::speech::SpeechSynthesizer;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "board-speaker-rs", about = "Read bulletin-board threads aloud")]
struct Args {
    /// Thread file with one raw record per line
    thread: Option<PathBuf>,

    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Record layout: jbbs or 2ch (overrides config)
    #[arg(short, long)]
    dialect: Option<String>,

    /// Voice to speak with; use the relay voice name to send to Bouyomi-chan
    #[arg(long)]
    voice: Option<String>,

    /// Treat posts up to this number as already read
    #[arg(long)]
    from: Option<i32>,

    /// Read the new posts once and exit instead of following the file
    #[arg(long)]
    once: bool,

    /// Print available voice names and exit
    #[arg(long)]
    list_voices: bool,

    /// Print the thread as HTML fragments and exit
    #[arg(long)]
    render_html: bool,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging (suppress noisy ort internals)
    let filter = if args.verbose {
        EnvFilter::new("debug,ort=info")
    } else {
        EnvFilter::new("info,ort=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load(args.config.as_deref());

    let dialect = match args.dialect.as_deref() {
        Some(name) => name.parse::<Dialect>()?,
        None => config.board.dialect,
    };

    if args.render_html {
        let path = args.thread.as_deref().ok_or("a thread file is required")?;
        let text = tokio::fs::read_to_string(path).await?;
        for post in parse_thread(&text, dialect) {
            println!("{}", post.display_body);
        }
        return Ok(());
    }

    // Load Kokoro (blocking, takes a few seconds)
    let synth: Option<Arc<dyn SpeechSynthesizer>> = if config.kokoro.enabled {
        info!("Loading Kokoro TTS model...");
        let kokoro_config = config.kokoro.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            let mut engine = KokoroSynthesizer::new(&kokoro_config);
            engine.load_model_sync().map(|()| engine)
        })
        .await?;
        match loaded {
            Ok(engine) => Some(Arc::new(engine) as Arc<dyn SpeechSynthesizer>),
            Err(e) => {
                warn!("Failed to load Kokoro model: {e}");
                info!("Local voices disabled, only the relay is available");
                None
            }
        }
    } else {
        None
    };

    let dispatcher = Arc::new(SpeechDispatcher::new(
        synth,
        RelayClient::new(&config.relay.host, config.relay.port),
        &config.speech.locale,
    ));
    dispatcher.initialize();
    dispatcher.set_rate(config.speech.rate);
    dispatcher.set_volume(config.speech.volume);

    if args.list_voices {
        for name in dispatcher.voice_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let voice = args.voice.unwrap_or_else(|| config.speech.voice.clone());
    dispatcher.select_initial_voice(&voice);

    let path = args.thread.ok_or("a thread file is required")?;
    let mut reader = ThreadReader::new(&path, dialect, dispatcher.clone())
        .announce_numbers(config.speech.announce_number)
        .poll_interval(Duration::from_millis(config.board.poll_interval_ms));
    if config.history.enabled {
        if let Some(history) = History::in_home() {
            reader = reader.with_history(history, config.history.resume);
        }
    }
    if let Some(from) = args.from {
        reader = reader.start_after(from);
    }

    if config.api.enabled {
        let state = ApiState {
            dispatcher: dispatcher.clone(),
            progress: reader.progress(),
        };
        api::start_api(state, config.api.port).await;
    }

    if args.once {
        let spoken = reader.read_new_posts().await;
        info!("Read {spoken} post(s)");
    } else {
        reader.run().await;
    }

    Ok(())
}
