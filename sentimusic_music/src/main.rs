// Sentimusic: CLI entry point.
//
// Loads (or trains and caches) the sentiment classifier, starts the live
// composer, then reads lines from stdin. Each line is classified and the
// music switches mood to match. `exit`, `quit`, or end of input stops the
// session; with the MIDI file backend the session is written out on exit.
//
// Usage:
//   cargo run -p sentimusic_music -- [--config FILE] [--corpus DIR] [--model FILE]
//     [--soundfont FILE.sf2] [--midi-out FILE] [--seed N] [--direct] [--evaluate] [--debug]
//
// `--direct` skips the classifier: lines are read as `positive`/`pos` or
// `negative`/`neg` and set the mood directly.
//
// Logs go to stderr (RUST_LOG is honored); prompts go to stdout.

use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use sentimusic_music::midi::MidiRecorder;
use sentimusic_music::{AudioBackend, BackendKind, LiveComposer, SessionConfig};
use sentimusic_sentiment::artifact::load_or_train;
use sentimusic_sentiment::corpus::Corpus;
use sentimusic_sentiment::{Sentiment, SentimentError, TextClassifier};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "sentimusic", about = "Live music that follows the mood of what you type")]
struct Cli {
    /// JSON session config; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Review corpus directory (with pos/ and neg/).
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Cached model artifact path.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Play live through this SoundFont (needs the `soundfont` feature).
    #[arg(long)]
    soundfont: Option<PathBuf>,

    /// Write the session to this MIDI file.
    #[arg(long)]
    midi_out: Option<PathBuf>,

    /// Seed for key and note choices.
    #[arg(long)]
    seed: Option<u64>,

    /// Set the mood with "positive"/"negative" instead of classifying text.
    #[arg(long)]
    direct: bool,

    /// Report held-out accuracy after training.
    #[arg(long)]
    evaluate: bool,

    /// Log per-mood details.
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(io::stderr)
        .init();

    let config = load_config(&cli)?;
    let classifier = if cli.direct {
        None
    } else {
        Some(load_classifier(&config, cli.evaluate)?)
    };

    match config.backend {
        BackendKind::MidiFile => {
            let backend = match &config.midi_output {
                Some(path) => MidiRecorder::with_output(path),
                None => MidiRecorder::new(),
            };
            run_session(backend, &config, classifier.as_ref())
        }
        BackendKind::SoundFont => {
            if config.composer.instrument_bank.is_none() {
                bail!("the sound_font backend needs an instrument bank (--soundfont FILE)");
            }
            run_soundfont(&config, classifier.as_ref())
        }
    }
}

fn load_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => SessionConfig::load(path).context("loading session config")?,
        None => SessionConfig::default(),
    };
    if let Some(corpus) = &cli.corpus {
        config.corpus_dir = corpus.clone();
    }
    if let Some(model) = &cli.model {
        config.model_path = model.clone();
    }
    if let Some(bank) = &cli.soundfont {
        config.composer.instrument_bank = Some(bank.clone());
        config.backend = BackendKind::SoundFont;
    }
    if let Some(out) = &cli.midi_out {
        config.midi_output = Some(out.clone());
    }
    if cli.seed.is_some() {
        config.composer.seed = cli.seed;
    }
    Ok(config)
}

fn load_classifier(config: &SessionConfig, evaluate: bool) -> Result<TextClassifier> {
    let corpus_dir = config.corpus_dir.clone();
    let classifier = load_or_train(&config.model_path, config.classifier.clone(), || {
        Corpus::load_dir(&corpus_dir)
    })
    .context("preparing sentiment classifier")?;

    debug!(words = ?classifier.most_informative(10), "most informative words");
    if evaluate {
        match classifier.evaluate() {
            Ok(accuracy) => info!(accuracy, "held-out accuracy"),
            Err(SentimentError::NoHeldOutDocuments) => warn!(
                path = %config.model_path.display(),
                "model was restored from disk; delete it to retrain and evaluate"
            ),
            Err(e) => return Err(e).context("evaluating classifier"),
        }
    }
    Ok(classifier)
}

#[cfg(feature = "soundfont")]
fn run_soundfont(config: &SessionConfig, classifier: Option<&TextClassifier>) -> Result<()> {
    run_session(
        sentimusic_music::soundfont::SoundFontBackend::new(),
        config,
        classifier,
    )
}

#[cfg(not(feature = "soundfont"))]
fn run_soundfont(_config: &SessionConfig, _classifier: Option<&TextClassifier>) -> Result<()> {
    bail!("sentimusic was built without the `soundfont` feature")
}

fn run_session<B: AudioBackend + 'static>(
    backend: B,
    config: &SessionConfig,
    classifier: Option<&TextClassifier>,
) -> Result<()> {
    let composer =
        LiveComposer::new(config.composer.clone(), backend).context("starting composer")?;
    composer.start().context("starting playback")?;

    println!("Type sentences and press enter to change the mood of the music.");
    println!("Type \"exit\" to quit.");
    println!();
    println!("So, how was your day?");

    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }

        let sentiment = match classifier {
            Some(classifier) => classifier.classify(text)?,
            None => match text.parse::<Sentiment>() {
                Ok(sentiment) => sentiment,
                Err(e) => {
                    println!("{e}; type positive or negative");
                    continue;
                }
            },
        };
        debug!(%sentiment, text, "classified");
        composer.set_sentiment(sentiment)?;
    }

    composer.close().context("stopping composer")?;
    Ok(())
}
