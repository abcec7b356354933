use std::io::Write;

use env_logger::{Builder, Env};

fn init_logger() {
    Builder::from_env(Env::default().filter_or("RUST_LOG", "warn,narration_engine=info,narration=info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}

mod cli {
    use std::env;
    use std::fs;
    use std::path::{Path, PathBuf};

    use anyhow::{anyhow, bail, Context, Result};

    use narration_engine::backend::memory::MemoryBackend;
    use narration_engine::background::TrackCategory;
    use narration_engine::clock::{AudioClock, ManualClock};
    use narration_engine::playback::PlaybackEvent;
    use narration_engine::timing::TimingMapBuilder;
    use narration_engine::{
        BackgroundTrack, EngineConfig, NarrationBuffer, NarrationSession, PlaybackState,
        SessionEvent,
    };

    const USAGE: &str = "Usage:
  narration timing   <script.txt> <seconds|narration.wav> [--config <file>]
  narration simulate <script.txt> <seconds|narration.wav> [--config <file>]
                     [--step <secs>] [--seek <at>:<target>]... [--pause <at>:<secs>]...
                     [--background <url>]
  narration play     <script.txt> <narration.wav> [--config <file>]
                     [--background <file>] [--prefs <file>]

Flags:
  --config <file>      Engine configuration (JSON); missing fields use defaults
  --step <secs>        Simulation clock step (default: tick interval)
  --seek <at>:<to>     Seek to <to> seconds when the clock reaches <at>
  --pause <at>:<secs>  Pause at <at> for <secs> seconds
  --background <src>   Background track to loop under the narration
  --prefs <file>       Load and save the background selection and volume
  -h, --help           Show this help

Interactive commands (play):
  p            pause / resume
  s <secs>     seek
  w <index>    seek to word
  v <0..1>     background volume
  q            quit
";

    #[derive(Default)]
    struct Options {
        positional: Vec<String>,
        config: Option<PathBuf>,
        step: Option<f64>,
        seeks: Vec<(f64, f64)>,
        pauses: Vec<(f64, f64)>,
        background: Option<String>,
        prefs: Option<PathBuf>,
        help: bool,
    }

    fn parse_pair(flag: &str, value: &str) -> Result<(f64, f64)> {
        let (a, b) = value
            .split_once(':')
            .ok_or_else(|| anyhow!("{flag} expects <a>:<b>, got '{value}'"))?;
        Ok((
            a.trim().parse().with_context(|| format!("{flag}: bad number '{a}'"))?,
            b.trim().parse().with_context(|| format!("{flag}: bad number '{b}'"))?,
        ))
    }

    fn parse_options(mut args: impl Iterator<Item = String>) -> Result<Options> {
        let mut opts = Options::default();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} requires an argument"))
            };
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--config" => opts.config = Some(PathBuf::from(value("--config")?)),
                "--prefs" => opts.prefs = Some(PathBuf::from(value("--prefs")?)),
                "--background" => opts.background = Some(value("--background")?),
                "--step" => {
                    let raw = value("--step")?;
                    opts.step = Some(raw.parse().with_context(|| format!("--step: bad number '{raw}'"))?);
                }
                "--seek" => opts.seeks.push(parse_pair("--seek", &value("--seek")?)?),
                "--pause" => opts.pauses.push(parse_pair("--pause", &value("--pause")?)?),
                _ if arg.starts_with('-') && arg.parse::<f64>().is_err() => {
                    bail!("Unknown flag: {arg}")
                }
                _ => opts.positional.push(arg),
            }
        }
        Ok(opts)
    }

    fn load_config(opts: &Options) -> Result<EngineConfig> {
        match opts.config.as_deref() {
            Some(path) => EngineConfig::from_file(path)
                .with_context(|| format!("Failed to load config '{}'", path.display())),
            None => Ok(EngineConfig::default()),
        }
    }

    fn read_script(path: &str) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("Failed to read script '{path}'"))
    }

    /// Narration audio: a WAV file, or a bare duration rendered as silence.
    fn load_narration(source: &str) -> Result<NarrationBuffer> {
        if let Ok(seconds) = source.parse::<f64>() {
            return NarrationBuffer::silence(seconds, 8_000)
                .with_context(|| format!("Invalid narration duration '{source}'"));
        }
        NarrationBuffer::from_wav_file(source)
            .with_context(|| format!("Failed to load narration '{source}'"))
    }

    fn background_track(source: &str) -> BackgroundTrack {
        let name = Path::new(source)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.to_string());
        BackgroundTrack::new("cli", name, source, TrackCategory::Other)
    }

    fn script_and_audio(opts: &Options) -> Result<(String, NarrationBuffer)> {
        match opts.positional.as_slice() {
            [_, script, audio] => Ok((read_script(script)?, load_narration(audio)?)),
            _ => bail!("expected <script.txt> <seconds|narration.wav>\n\n{USAGE}"),
        }
    }

    fn timing(opts: &Options) -> Result<()> {
        let config = load_config(opts)?;
        let (script, buffer) = script_and_audio(opts)?;
        let map = TimingMapBuilder::with_weights(config.timing).build(&script, buffer.duration());
        println!("{}", map.to_json()?);
        Ok(())
    }

    enum Scripted {
        Seek(f64),
        Pause,
        Resume,
    }

    fn simulate(opts: &Options) -> Result<()> {
        let config = load_config(opts)?;
        let (script, buffer) = script_and_audio(opts)?;
        let step = opts.step.unwrap_or(config.playback.tick_interval_secs);
        if !step.is_finite() || step <= 0.0 {
            bail!("--step must be positive, got {step}");
        }

        let mut actions: Vec<(f64, Scripted)> = Vec::new();
        for &(at, target) in &opts.seeks {
            actions.push((at, Scripted::Seek(target)));
        }
        for &(at, secs) in &opts.pauses {
            actions.push((at, Scripted::Pause));
            actions.push((at + secs.max(0.0), Scripted::Resume));
        }
        actions.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut actions = actions.into_iter().peekable();

        let clock = ManualClock::new();
        let backend = MemoryBackend::new();
        let mut session =
            NarrationSession::with_config(clock.clone(), backend.clone(), backend, &config);
        if let Some(source) = opts.background.as_deref() {
            session.select_background(background_track(source));
        }

        let duration = buffer.duration();
        let map = session.load(buffer, &script);
        log::info!(
            "simulating {:.2}s narration: {} words, {} sentences",
            duration,
            map.word_count(),
            map.sentence_count()
        );
        session.play()?;

        let horizon = duration
            + opts.pauses.iter().map(|p| p.1.max(0.0)).sum::<f64>()
            + opts.seeks.iter().map(|s| s.0.max(0.0)).fold(0.0, f64::max)
            + 1.0;
        while clock.now() <= horizon {
            while let Some((_, action)) = actions.next_if(|(at, _)| *at <= clock.now()) {
                let result = match action {
                    Scripted::Seek(target) => session.seek(target),
                    Scripted::Pause => {
                        session.pause();
                        Ok(())
                    }
                    Scripted::Resume => session.play(),
                };
                if let Err(err) = result {
                    log::warn!("scripted action at {:.3}s rejected: {err}", clock.now());
                }
            }

            session.poll();
            let mut ended = false;
            for event in session.drain_events() {
                ended |= matches!(event, SessionEvent::Narration(PlaybackEvent::Ended));
                println!("{:.3}\t{}", clock.now(), serde_json::to_string(&event)?);
            }
            if ended && actions.peek().is_none() {
                break;
            }
            clock.advance(step);
        }

        if session.narration().state() != PlaybackState::Idle {
            log::warn!("simulation horizon reached before the narration ended");
        }
        Ok(())
    }

    #[cfg(feature = "streaming")]
    fn play(opts: &Options) -> Result<()> {
        use std::io::{self, BufRead};
        use std::sync::mpsc;
        use std::time::Duration;

        use narration_engine::clock::MonotonicClock;
        use narration_engine::{AudioOutput, TrackPreferences};

        let config = load_config(opts)?;
        let (script, buffer) = match opts.positional.as_slice() {
            [_, script, audio] => (
                read_script(script)?,
                NarrationBuffer::from_wav_file(audio)
                    .with_context(|| format!("Failed to load narration '{audio}'"))?,
            ),
            _ => bail!("expected <script.txt> <narration.wav>\n\n{USAGE}"),
        };

        let output = AudioOutput::open_default()?;
        let backend = output.backend();
        let mut session =
            NarrationSession::with_config(MonotonicClock::new(), backend.clone(), backend, &config);

        if let Some(path) = opts.prefs.as_deref() {
            let prefs = TrackPreferences::load(path)
                .with_context(|| format!("Failed to load preferences '{}'", path.display()))?;
            session.apply_preferences(&prefs);
        }
        if let Some(source) = opts.background.as_deref() {
            session.select_background(background_track(source));
        }

        let map = session.load(buffer, &script);
        println!(
            "Narration: {} words, {} sentences, {:.1}s",
            map.word_count(),
            map.sentence_count(),
            map.total_duration()
        );
        println!("Commands: p (pause/resume), s <secs>, w <index>, v <volume>, q\n");

        let (tx, rx) = mpsc::channel::<String>();
        std::thread::spawn(move || {
            for line in io::stdin().lock().lines().map_while(|l| l.ok()) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        session.play()?;
        let frame = Duration::from_secs_f64(config.playback.tick_interval_secs);
        'main: loop {
            std::thread::sleep(frame);

            while let Ok(line) = rx.try_recv() {
                let mut parts = line.split_whitespace();
                let result = match (parts.next(), parts.next()) {
                    (Some("q"), _) => break 'main,
                    (Some("p"), _) => match session.narration().state() {
                        PlaybackState::Playing => {
                            session.pause();
                            Ok(())
                        }
                        _ => session.play(),
                    },
                    (Some("s"), Some(secs)) => match secs.parse::<f64>() {
                        Ok(secs) => session.seek(secs),
                        Err(_) => Err(narration_engine::NarrationError::InvalidArgument(format!(
                            "bad seek target '{secs}'"
                        ))),
                    },
                    (Some("w"), Some(index)) => match index.parse::<usize>() {
                        Ok(index) => session.seek_to_word(index),
                        Err(_) => Err(narration_engine::NarrationError::InvalidArgument(format!(
                            "bad word index '{index}'"
                        ))),
                    },
                    (Some("v"), Some(volume)) => {
                        if let Ok(volume) = volume.parse::<f32>() {
                            println!("Background volume: {:.2}", session.set_background_volume(volume));
                        }
                        Ok(())
                    }
                    (None, _) => Ok(()),
                    _ => {
                        eprintln!("Unknown command: {line}");
                        Ok(())
                    }
                };
                if let Err(err) = result {
                    eprintln!("{err}");
                }
            }

            session.poll();
            for event in session.drain_events() {
                match event {
                    SessionEvent::Narration(PlaybackEvent::WordChanged(position)) => {
                        if let Some(word) = position.word_index.and_then(|i| map.word(i)) {
                            println!("[{:>6.2}s] {}", position.current_time, word.content);
                        }
                    }
                    SessionEvent::Narration(PlaybackEvent::Ended) => {
                        println!("\nNarration complete!");
                        break 'main;
                    }
                    SessionEvent::Narration(PlaybackEvent::StateChanged(state)) => {
                        log::info!("narration {state:?}");
                    }
                    SessionEvent::Narration(PlaybackEvent::Error(message)) => {
                        eprintln!("Playback error: {message}");
                    }
                    SessionEvent::Background(event) => {
                        log::info!("background: {}", serde_json::to_string(&event)?);
                    }
                }
            }
        }

        session.stop();
        if let Some(path) = opts.prefs.as_deref() {
            session
                .preferences()
                .save(path)
                .with_context(|| format!("Failed to save preferences '{}'", path.display()))?;
        }
        Ok(())
    }

    #[cfg(not(feature = "streaming"))]
    fn play(_opts: &Options) -> Result<()> {
        bail!("`play` requires the \"streaming\" feature. Rebuild with `--features streaming` to enable audio output.")
    }

    pub fn run() -> Result<()> {
        let opts = parse_options(env::args().skip(1))?;
        if opts.help {
            print!("{USAGE}");
            return Ok(());
        }
        match opts.positional.first().map(String::as_str) {
            Some("timing") => timing(&opts),
            Some("simulate") => simulate(&opts),
            Some("play") => play(&opts),
            Some(other) => bail!("Unknown command: {other}\n\n{USAGE}"),
            None => {
                eprint!("{USAGE}");
                Ok(())
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_logger();
    cli::run()
}
