use std::io::BufRead as _;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "vidconv", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Filter a frame stream and report per-mode FPS.
    Run(RunArgs),
    /// Run the same frames through both engines, check parity and compare throughput.
    Compare(CompareArgs),
    /// Print the authored and prepared kernel.
    Kernel(KernelArgs),
}

#[derive(Parser, Debug)]
struct SourceArgs {
    /// Session config JSON (kernel, divisor, fps_window, threads, mode, verify).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of still images decoded as consecutive frames.
    #[arg(long, conflicts_with = "synthetic")]
    frames: Option<PathBuf>,

    /// Synthetic test pattern size, e.g. `640x480` (used when `--frames` is absent).
    #[arg(long, default_value = "640x480")]
    synthetic: String,

    /// Override accelerated engine worker threads.
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Filter mode for the whole run (defaults to the config's mode).
    #[arg(long, value_enum, conflicts_with_all = ["schedule", "interactive"])]
    mode: Option<ModeChoice>,

    /// Mode switch points, e.g. `0:reference,120:accelerated,240:none`.
    #[arg(long, conflicts_with = "interactive")]
    schedule: Option<String>,

    /// Read mode names (none / reference / accelerated) from stdin while running.
    #[arg(long)]
    interactive: bool,

    /// Stop after this many displayed frames.
    #[arg(long, default_value_t = 300)]
    max_frames: u64,

    /// Write displayed frames as a PNG sequence into this directory.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Cross-check accelerated output against the reference engine.
    #[arg(long)]
    verify: bool,
}

#[derive(Parser, Debug)]
struct CompareArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Frames per engine.
    #[arg(long, default_value_t = 120)]
    max_frames: u64,
}

#[derive(Parser, Debug)]
struct KernelArgs {
    /// Session config JSON; the built-in sharpen kernel is used when absent.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeChoice {
    None,
    Reference,
    Accelerated,
}

impl From<ModeChoice> for vidconv::FilterMode {
    fn from(choice: ModeChoice) -> Self {
        match choice {
            ModeChoice::None => vidconv::FilterMode::None,
            ModeChoice::Reference => vidconv::FilterMode::Reference,
            ModeChoice::Accelerated => vidconv::FilterMode::Accelerated,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::Compare(args) => cmd_compare(args),
        Command::Kernel(args) => cmd_kernel(args),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<vidconv::SessionConfig> {
    match path {
        Some(p) => vidconv::SessionConfig::from_path(p)
            .with_context(|| format!("load config '{}'", p.display())),
        None => Ok(vidconv::SessionConfig::default()),
    }
}

fn parse_size(s: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .with_context(|| format!("size '{s}' must look like WIDTHxHEIGHT"))?;
    let w = w.trim().parse().with_context(|| format!("width in '{s}'"))?;
    let h = h.trim().parse().with_context(|| format!("height in '{s}'"))?;
    Ok((w, h))
}

fn open_source(
    args: &SourceArgs,
    limit: Option<u64>,
) -> anyhow::Result<Box<dyn vidconv::FrameSource>> {
    if let Some(dir) = &args.frames {
        let src = vidconv::ImageSequenceSource::open(dir)
            .with_context(|| format!("open frames '{}'", dir.display()))?;
        return Ok(Box::new(src));
    }
    let (w, h) = parse_size(&args.synthetic)?;
    Ok(Box::new(vidconv::SyntheticSource::new(w, h, limit)?))
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(args.source.config.as_ref())?;
    if args.source.threads.is_some() {
        cfg.threads = args.source.threads;
    }
    cfg.verify |= args.verify;

    let mut lp = vidconv::FrameLoop::new(&cfg)?.with_max_frames(Some(args.max_frames));
    let mut source = open_source(&args.source, None)?;

    let mut selector: Box<dyn vidconv::FilterSelector> = if let Some(schedule) = &args.schedule {
        Box::new(vidconv::ScheduledSelector::parse(schedule)?)
    } else if args.interactive {
        let switch = vidconv::ModeSwitch::new(cfg.mode);
        spawn_stdin_switch(switch.clone());
        Box::new(switch)
    } else {
        let mode = args.mode.map(Into::into).unwrap_or(cfg.mode);
        Box::new(vidconv::FixedSelector(mode))
    };

    let mut sink: Box<dyn vidconv::FrameSink> = match &args.out {
        Some(dir) => Box::new(vidconv::PngSequenceSink::new(dir)),
        None => Box::new(vidconv::NullSink::default()),
    };

    let stats = lp.run(source.as_mut(), selector.as_mut(), sink.as_mut(), |report| {
        tracing::info!(
            tick = report.index.0,
            mode = %report.mode,
            ms = report.elapsed.as_secs_f64() * 1000.0,
            fps = %report.fps,
            "frame"
        );
    })?;

    eprintln!(
        "displayed {} frames ({} skipped)",
        stats.frames_displayed, stats.frames_skipped
    );
    for mode in vidconv::FilterMode::ALL {
        eprintln!(
            "  {:<12} frames: {:>6}  fps: {}",
            mode.as_str(),
            stats.displayed_in(mode),
            lp.sampler().estimate_fps(mode)
        );
    }
    if cfg.verify {
        eprintln!("  verify mismatches: {}", stats.verify_mismatches);
        anyhow::ensure!(
            stats.verify_mismatches == 0,
            "accelerated output differed from reference on {} frames",
            stats.verify_mismatches
        );
    }
    Ok(())
}

fn spawn_stdin_switch(switch: vidconv::ModeSwitch) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match line.parse::<vidconv::FilterMode>() {
                Ok(mode) => {
                    switch.set(mode);
                    tracing::info!(%mode, "filter mode switched");
                }
                Err(e) => tracing::warn!("{e}"),
            }
        }
    });
}

fn cmd_compare(args: CompareArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(args.source.config.as_ref())?;
    if args.source.threads.is_some() {
        cfg.threads = args.source.threads;
    }

    let mut source = open_source(&args.source, Some(args.max_frames))?;
    let mut frames = Vec::new();
    while (frames.len() as u64) < args.max_frames {
        match source.next_frame()? {
            vidconv::SourceFrame::Ready(frame) => frames.push(frame),
            vidconv::SourceFrame::Stalled => continue,
            vidconv::SourceFrame::Ended => break,
        }
    }
    anyhow::ensure!(!frames.is_empty(), "source produced no frames");

    let mut outputs = Vec::new();
    for mode in [
        vidconv::FilterMode::Reference,
        vidconv::FilterMode::Accelerated,
    ] {
        let mut lp = vidconv::FrameLoop::new(&cfg)?;
        let mut src = vidconv::MemorySource::new(frames.iter().cloned());
        let mut sink = vidconv::InMemorySink::new();
        lp.run(
            &mut src,
            &mut vidconv::FixedSelector(mode),
            &mut sink,
            |_| {},
        )?;
        let mean = lp.sampler().timing(mode).mean_ms().unwrap_or(0.0);
        println!(
            "{:<12} frames: {:>5}  mean: {:>8.3} ms  fps: {}",
            mode.as_str(),
            sink.frames().len(),
            mean,
            lp.sampler().estimate_fps(mode)
        );
        outputs.push(sink);
    }

    let mismatched = outputs[0]
        .frames()
        .iter()
        .zip(outputs[1].frames())
        .filter(|((_, a), (_, b))| a != b)
        .count();
    anyhow::ensure!(
        mismatched == 0,
        "reference and accelerated outputs differ on {mismatched} frames"
    );
    println!("parity: ok ({} frames)", frames.len());
    Ok(())
}

fn cmd_kernel(args: KernelArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_ref())?;
    let authored = cfg.authored_kernel()?;
    let applied = vidconv::prepare(&authored);

    println!("authored:");
    print_rows(&authored.rows());
    println!("prepared (180 degree rotation):");
    print_rows(&applied.kernel().rows());
    println!("divisor: {}", cfg.divisor);
    println!("weight sum: {}", authored.weight_sum());
    Ok(())
}

fn print_rows(rows: &[Vec<i32>]) {
    for row in rows {
        let cells: Vec<String> = row.iter().map(|v| format!("{v:>4}")).collect();
        println!("  [{}]", cells.join(","));
    }
}
