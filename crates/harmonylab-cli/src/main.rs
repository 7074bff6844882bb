//! harmonylab: headless front end for the HarmonyLab engine
//!
//! Usage: harmonylab [KEY] [MODE] [BARS] [BPM] [--play SECONDS]

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harmonylab_core::{
    build_progression, format_note_text, generate_sequence, KeyName, Mode, PartName, Settings,
    UserNotes, SUPPORTED_BARS,
};
use harmonylab_engine::{AudioEngine, LookaheadScheduler};

struct Args {
    settings: Settings,
    play_secs: Option<f64>,
}

fn parse_args() -> Result<Args> {
    let mut settings = Settings::default();
    let mut play_secs = None;
    let mut positional: Vec<String> = Vec::new();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--play" {
            let value = iter
                .next()
                .context("--play requires a duration in seconds")?;
            play_secs = Some(value.parse().context("invalid --play duration")?);
        } else {
            positional.push(arg.clone());
        }
    }

    if let Some(key) = positional.first() {
        settings.key =
            KeyName::from_name(key).with_context(|| format!("unknown key: {key}"))?;
    }
    if let Some(mode) = positional.get(1) {
        settings.mode =
            Mode::from_name(mode).with_context(|| format!("unknown mode: {mode}"))?;
    }
    if let Some(bars) = positional.get(2) {
        settings.bars = bars.parse().context("invalid bar count")?;
        if !SUPPORTED_BARS.contains(&settings.bars) {
            bail!("bar count must be one of {SUPPORTED_BARS:?}");
        }
    }
    if let Some(bpm) = positional.get(3) {
        settings.bpm = bpm.parse().context("invalid bpm")?;
    }

    Ok(Args {
        settings: settings.clamped(),
        play_secs,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("harmonylab=info".parse()?),
        )
        .init();

    let Args {
        settings,
        play_secs,
    } = parse_args()?;

    let progression = build_progression(settings.mode, settings.bars);
    let sequence = generate_sequence(&settings, &progression, &UserNotes::default());

    println!(
        "{} {} | {} bars @ {:.0} bpm, swing {:.2}",
        settings.key.name(),
        settings.mode.name(),
        settings.bars,
        settings.bpm,
        settings.swing
    );
    println!("progression: {:?}", progression.degrees);
    for part in [PartName::Bass, PartName::Arp, PartName::Lead] {
        println!(
            "{:>4}: {}",
            part.name(),
            format_note_text(sequence.generated.part(part))
        );
    }

    let Some(secs) = play_secs else {
        return Ok(());
    };

    let engine = AudioEngine::start(&settings)
        .context("unable to open an audio output device; generation still works without one")?;
    let scheduler = LookaheadScheduler::new(engine.clock(), engine.sink());
    let notes = scheduler.subscribe();
    scheduler.start(&sequence.events, &settings);
    tracing::info!(secs, "playing");

    let deadline = Instant::now() + Duration::from_secs_f64(secs);
    while Instant::now() < deadline {
        match notes.recv_timeout(Duration::from_millis(200)) {
            Ok(Some(event)) => {
                tracing::info!(part = event.part.name(), step = event.step, "now playing");
            }
            Ok(None) | Err(_) => {}
        }
    }

    scheduler.stop();
    engine.stop();
    Ok(())
}
