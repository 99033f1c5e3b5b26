use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lingo::assistant::{MicrophoneListener, TtsSpeaker};
use lingo::config::{Overrides, SttBackend};
use lingo::db::OpenAiEmbedder;
use lingo::llm::OpenAiChat;
use lingo::voice::{SpeechToText, TextToSpeech};
use lingo::{Assistant, Config, Conversation, MemoryStore, Retrieval, TurnOutcome, UserInput};

/// Lingo - practice a language by talking with an AI that remembers you
#[derive(Parser)]
#[command(name = "lingo", version, about)]
struct Cli {
    /// Your name (asked for at startup when not configured)
    #[arg(short, long)]
    name: Option<String>,

    /// Conversation language code (e.g. "en")
    #[arg(short, long)]
    language: Option<String>,

    /// Speaking level as a school grade: K or 1-12
    #[arg(long)]
    level: Option<String>,

    /// Whisper model size: tiny, base, small, medium, large
    #[arg(long)]
    model_size: Option<String>,

    /// Voice gender: male (M) or female (F)
    #[arg(long)]
    gender: Option<String>,

    /// Directory for the memory store
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Disable voice input and spoken replies
    #[arg(long, env = "LINGO_DISABLE_VOICE")]
    disable_voice: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive setup
    Setup,
    /// Search long-term memories
    Recall {
        /// What to look for
        query: String,
        /// Maximum number of memories
        #[arg(short, long, default_value = "4")]
        count: usize,
    },
    /// List the newest memories
    Memories {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,lingo=info",
        1 => "info,lingo=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if matches!(cli.command, Some(Command::Setup)) {
        return lingo::setup::run_setup();
    }

    let config = Config::load(Overrides {
        name: cli.name,
        language: cli.language,
        level: cli.level,
        model_size: cli.model_size,
        gender: cli.gender,
        data_dir: cli.data_dir,
        disable_voice: cli.disable_voice,
    })?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Some(Command::Recall { query, count }) => recall(&config, &query, count).await,
        Some(Command::Memories { limit }) => list_memories(&config, limit),
        Some(Command::TestMic { duration }) => test_mic(&config, duration).await,
        Some(Command::TestTts { text }) => test_tts(&config, &text).await,
        Some(Command::Setup) | None => converse(config).await,
    }
}

/// Open the memory store; failure here aborts startup
fn open_store(config: &Config) -> anyhow::Result<MemoryStore> {
    let embedder = OpenAiEmbedder::new(config.openai_key()?)?.with_base_url(&config.llm.base_url);
    let store = MemoryStore::open(config.memory_dir(), Arc::new(embedder))?;
    Ok(store)
}

fn build_stt(config: &Config) -> lingo::Result<SpeechToText> {
    match config.voice.stt_backend {
        SttBackend::Local => SpeechToText::new_local(config.voice.model_size, &config.language),
        SttBackend::Api => SpeechToText::new_api(config.openai_key()?, &config.language),
    }
}

/// Read one line from stdin; `None` at end of input
async fn read_line() -> anyhow::Result<Option<String>> {
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let n = std::io::stdin().lock().read_line(&mut line)?;
        Ok::<_, std::io::Error>((n > 0).then_some(line))
    })
    .await??;
    Ok(line)
}

async fn ask_name() -> anyhow::Result<String> {
    let name = tokio::task::spawn_blocking(|| {
        dialoguer::Input::<String>::new()
            .with_prompt("Please enter your name")
            .interact_text()
    })
    .await??;
    Ok(name.trim().to_string())
}

/// Run the interactive conversation loop
async fn converse(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let chat = OpenAiChat::new(config.openai_key()?, &config.llm.model)?
        .with_base_url(&config.llm.base_url);

    let name = match &config.user_name {
        Some(name) => name.clone(),
        None => ask_name().await?,
    };

    let memories = store.count()?;
    tracing::info!(
        name = %name,
        language = %config.language,
        level = %config.level,
        memories,
        "starting conversation"
    );

    let conversation = Conversation::new(Arc::new(chat), store, config.conversation(&name));
    let mut assistant = Assistant::new(conversation);

    if config.voice.enabled {
        assistant = attach_voice(assistant, &config)?;
    }

    let mut stdout = std::io::stdout();
    loop {
        println!("Press Enter to speak, or type your message... (type 'goodbye' to quit)");
        let input = match read_line().await? {
            Some(line) => UserInput::classify(&line),
            None => UserInput::Goodbye,
        };
        let leaving = input == UserInput::Goodbye;

        match assistant.turn(input, &mut stdout).await {
            Ok(TurnOutcome::Finished) => break,
            Ok(TurnOutcome::Replied(_) | TurnOutcome::NothingHeard) => {}
            Err(e) if leaving => return Err(e.into()),
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                eprintln!("Error: {e}");
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn attach_voice(mut assistant: Assistant, config: &Config) -> anyhow::Result<Assistant> {
    if !lingo::voice::AUDIO_ENABLED {
        tracing::warn!("built without the `audio` feature; voice input and playback unavailable");
    }

    match build_stt(config) {
        Ok(stt) => {
            assistant = assistant.with_listener(Box::new(MicrophoneListener::new(Arc::new(stt))));
        }
        Err(e) => tracing::warn!(error = %e, "voice input disabled"),
    }

    let tts = TextToSpeech::new(config.openai_key()?, &config.voice.tts_model)?
        .with_base_url(&config.llm.base_url);
    let speaker = TtsSpeaker::new(tts, &config.language, config.voice.gender)?;
    Ok(assistant.with_speaker(Box::new(speaker)))
}

/// Search memories
async fn recall(config: &Config, query: &str, count: usize) -> anyhow::Result<()> {
    let store = open_store(config)?;
    match store.query(query, count).await? {
        Retrieval::EmptyStore => println!("No memories yet."),
        Retrieval::Found(records) if records.is_empty() => println!("Nothing relevant found."),
        Retrieval::Found(records) => {
            for record in records {
                println!(
                    "[{}] {}\n    {}\n",
                    record.id,
                    record.created_at.format("%Y-%m-%d %H:%M:%S %:z"),
                    record.summary
                );
            }
        }
    }
    Ok(())
}

/// List the newest memories
fn list_memories(config: &Config, limit: usize) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let records = store.recent(limit)?;
    if records.is_empty() {
        println!("No memories yet.");
    }
    for record in records {
        println!(
            "[{}] {}\n    {}\n",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M:%S %:z"),
            record.summary
        );
    }
    println!("{} memories stored", store.count()?);
    Ok(())
}

/// Test microphone input
#[cfg(feature = "audio")]
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    use lingo::voice::{SAMPLE_RATE, samples_to_wav};

    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let samples = tokio::task::spawn_blocking(move || {
        lingo::voice::record_for(std::time::Duration::from_secs(duration))
    })
    .await??;

    let energy = calculate_rms(&samples);
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    println!("Samples: {} | RMS: {energy:.4} | Peak: {peak:.4}", samples.len());

    if energy < 0.001 {
        println!("\nRMS stayed near 0, check that your mic is plugged in and unmuted.");
        return Ok(());
    }

    println!("Transcribing...");
    let stt = build_stt(config)?;
    let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
    match stt.transcribe(&wav).await? {
        Some(text) => println!("Heard: {text}"),
        None => println!("Heard nothing."),
    }

    Ok(())
}

#[cfg(not(feature = "audio"))]
#[allow(clippy::unused_async)]
async fn test_mic(_config: &Config, _duration: u64) -> anyhow::Result<()> {
    anyhow::bail!("microphone support not built; rebuild with --features audio")
}

#[cfg(feature = "audio")]
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Test TTS output
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let tts = TextToSpeech::new(config.openai_key()?, &config.voice.tts_model)?
        .with_base_url(&config.llm.base_url);

    println!(
        "Synthesizing speech ({} / {})...",
        config.language, config.voice.gender
    );
    let mp3_data = tts
        .synthesize(text, &config.language, config.voice.gender)
        .await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    #[cfg(feature = "audio")]
    {
        println!("Playing audio...");
        tokio::task::spawn_blocking(move || lingo::voice::play_mp3(&mp3_data)).await??;
        println!("Done.");
    }

    #[cfg(not(feature = "audio"))]
    println!("Playback not built; rebuild with --features audio to hear it.");

    Ok(())
}
