use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::Context as _;
use serde_json::json;
use sha2::Digest as _;

#[derive(Clone, Debug)]
struct BenchArgs {
    width: u32,
    height: u32,
    frames: u32,
    warmup: u32,
    repeats: u32,
    modes: Vec<vidconv::FilterMode>,
    threads: Option<usize>,
    config: Option<PathBuf>,
    json_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
struct RunMetrics {
    engine_create: Duration,
    capture_total: Duration,
    filter_total: Duration,
    wall_total: Duration,
    /// sha256 over every filtered frame of the run, in order.
    digest: String,
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let args = parse_args()?;

    if args.width == 0 || args.height == 0 {
        anyhow::bail!("--width/--height must be > 0");
    }
    if args.frames == 0 || args.repeats == 0 {
        anyhow::bail!("--frames and --repeats must be > 0");
    }
    if let Some(n) = args.threads
        && n == 0
    {
        anyhow::bail!("--threads must be >= 1 when set");
    }

    let mut cfg = match &args.config {
        Some(p) => vidconv::SessionConfig::from_path(p)
            .with_context(|| format!("load config '{}'", p.display()))?,
        None => vidconv::SessionConfig::default(),
    };
    if args.threads.is_some() {
        cfg.threads = args.threads;
    }
    let kernel = cfg.applied_kernel()?;

    eprintln!(
        "bench: {repeats} run(s) ({profile} build), {frames} frames/run at {w}x{h}, kernel={n}x{n}, threads={threads}",
        repeats = args.repeats,
        profile = if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
        frames = args.frames,
        w = args.width,
        h = args.height,
        n = kernel.size(),
        threads = cfg
            .threads
            .map(|n| n.to_string())
            .unwrap_or_else(|| "auto".to_string()),
    );

    let mut summary = Vec::new();
    let mut digests = Vec::new();
    for &mode in &args.modes {
        for i in 0..args.warmup {
            let _ = run_once(&args, &cfg, &kernel, mode)
                .with_context(|| format!("{mode} warmup run {i}"))?;
        }

        let mut runs = Vec::<RunMetrics>::with_capacity(args.repeats as usize);
        for i in 0..args.repeats {
            runs.push(
                run_once(&args, &cfg, &kernel, mode)
                    .with_context(|| format!("{mode} run {i}"))?,
            );
        }

        let digest = runs[0].digest.clone();
        if runs.iter().any(|r| r.digest != digest) {
            anyhow::bail!("{mode} produced different output across runs (bug)");
        }
        eprintln!("\n{mode}: output sha256 {digest}");
        let report = report_percentiles(&runs, args.frames);
        summary.push(json!({
            "mode": mode.as_str(),
            "sha256": digest,
            "percentiles_ms": report,
        }));
        digests.push((mode, digest));
    }

    let filtered: Vec<_> = digests
        .iter()
        .filter(|(m, _)| *m != vidconv::FilterMode::None)
        .collect();
    if let Some((first_mode, first)) = filtered.first() {
        for (mode, d) in &filtered[1..] {
            anyhow::ensure!(
                d == first,
                "{mode} output differs from {first_mode} output (sha256 {d} vs {first})"
            );
        }
        if filtered.len() > 1 {
            eprintln!("\nparity: all filtering engines produced identical output");
        }
    }

    if let Some(path) = &args.json_out {
        let doc = json!({
            "width": args.width,
            "height": args.height,
            "frames": args.frames,
            "repeats": args.repeats,
            "threads": cfg.threads,
            "modes": summary,
        });
        let text = serde_json::to_string_pretty(&doc)?;
        std::fs::write(path, text).with_context(|| format!("write '{}'", path.display()))?;
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

fn run_once(
    args: &BenchArgs,
    cfg: &vidconv::SessionConfig,
    kernel: &vidconv::AppliedKernel,
    mode: vidconv::FilterMode,
) -> anyhow::Result<RunMetrics> {
    let wall_t0 = Instant::now();
    let mut m = RunMetrics::default();

    let t0 = Instant::now();
    let mut engine = vidconv::create_engine(mode, &cfg.engine_settings())?;
    m.engine_create = t0.elapsed();

    let mut source =
        vidconv::SyntheticSource::new(args.width, args.height, Some(args.frames.into()))?;
    let mut hasher = sha2::Sha256::new();
    loop {
        let t0 = Instant::now();
        let frame = match vidconv::FrameSource::next_frame(&mut source)? {
            vidconv::SourceFrame::Ready(frame) => frame,
            vidconv::SourceFrame::Stalled => continue,
            vidconv::SourceFrame::Ended => break,
        };
        m.capture_total += t0.elapsed();

        let (w, h) = (frame.width(), frame.height());
        let mut data = frame.into_data();
        let t0 = Instant::now();
        engine.apply(&mut data, w, h, kernel)?;
        m.filter_total += t0.elapsed();
        hasher.update(&data);
    }

    m.digest = hex(&hasher.finalize());
    m.wall_total = wall_t0.elapsed();
    Ok(m)
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn parse_args() -> anyhow::Result<BenchArgs> {
    let mut args = std::env::args().skip(1);

    let mut out = BenchArgs {
        width: 640,
        height: 480,
        frames: 120,
        warmup: 1,
        repeats: 20,
        modes: vec![
            vidconv::FilterMode::None,
            vidconv::FilterMode::Reference,
            vidconv::FilterMode::Accelerated,
        ],
        threads: None,
        config: None,
        json_out: None,
    };

    while let Some(a) = args.next() {
        match a.as_str() {
            "--width" => out.width = parse_u32(args.next(), "--width")?,
            "--height" => out.height = parse_u32(args.next(), "--height")?,
            "--frames" => out.frames = parse_u32(args.next(), "--frames")?,
            "--warmup" => out.warmup = parse_u32(args.next(), "--warmup")?,
            "--repeats" => out.repeats = parse_u32(args.next(), "--repeats")?,
            "--threads" => out.threads = Some(parse_usize(args.next(), "--threads")?),
            "--modes" => {
                let v = args.next().ok_or_else(|| {
                    anyhow::anyhow!("missing value for --modes (e.g. reference,accelerated)")
                })?;
                out.modes = v
                    .split(',')
                    .map(|s| s.trim().parse::<vidconv::FilterMode>())
                    .collect::<Result<_, _>>()
                    .with_context(|| format!("parse --modes value '{v}'"))?;
            }
            "--config" => {
                out.config = Some(PathBuf::from(args.next().ok_or_else(|| {
                    anyhow::anyhow!("missing value for --config (expected a path)")
                })?))
            }
            "--json" => {
                out.json_out = Some(PathBuf::from(args.next().ok_or_else(|| {
                    anyhow::anyhow!("missing value for --json (expected a path)")
                })?))
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => anyhow::bail!("unknown arg '{a}' (try --help)"),
        }
    }

    Ok(out)
}

fn print_help() {
    eprintln!(
        r#"vidconv-bench

Filters a synthetic clip repeatedly with each engine and reports p50/p90/p99 per stage.

Usage:
  cargo run -q --release
  cargo run -q --release -- --repeats 50 --frames 240
  cargo run -q --release -- --modes reference,accelerated --threads 4

Args:
  --width N        (default 640)
  --height N       (default 480)
  --frames N       frames per run (default 120)
  --warmup N       (default 1)
  --repeats N      (default 20)
  --modes LIST     comma-separated none,reference,accelerated (default all)
  --threads N      accelerated engine workers (default auto)
  --config PATH    session config JSON for kernel and divisor
  --json PATH      also write the percentile summary as JSON
"#
    );
}

fn parse_u32(v: Option<String>, flag: &str) -> anyhow::Result<u32> {
    let v = v.ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))?;
    v.parse::<u32>()
        .with_context(|| format!("parse {flag} value '{v}'"))
}

fn parse_usize(v: Option<String>, flag: &str) -> anyhow::Result<usize> {
    let v = v.ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))?;
    v.parse::<usize>()
        .with_context(|| format!("parse {flag} value '{v}'"))
}

fn report_percentiles(runs: &[RunMetrics], frames: u32) -> serde_json::Value {
    type Getter = fn(&RunMetrics) -> Duration;
    type Field = (&'static str, Getter);

    fn collect(runs: &[RunMetrics], f: Getter) -> Vec<Duration> {
        let mut v = runs.iter().map(f).collect::<Vec<_>>();
        v.sort_by_key(|d| d.as_nanos());
        v
    }

    fn p(v: &[Duration], p: f64) -> Duration {
        if v.is_empty() {
            return Duration::ZERO;
        }
        let n = v.len();
        let rank = (p * (n as f64)).ceil().clamp(1.0, n as f64) as usize;
        v[rank - 1]
    }

    fn ms(d: Duration) -> f64 {
        d.as_secs_f64() * 1000.0
    }

    let fields: &[Field] = &[
        ("engine_create", |m| m.engine_create),
        ("capture_total", |m| m.capture_total),
        ("filter_total", |m| m.filter_total),
        ("wall_total", |m| m.wall_total),
    ];

    let mut out = serde_json::Map::new();
    eprintln!("percentiles across runs (p50/p90/p99):");
    for (name, getter) in fields {
        let v = collect(runs, *getter);
        let (p50, p90, p99) = (p(&v, 0.50), p(&v, 0.90), p(&v, 0.99));
        eprintln!(
            "  {name:14} p50={p50:>10.3}ms  p90={p90:>10.3}ms  p99={p99:>10.3}ms",
            name = *name,
            p50 = ms(p50),
            p90 = ms(p90),
            p99 = ms(p99)
        );
        out.insert(
            (*name).to_string(),
            json!({ "p50": ms(p50), "p90": ms(p90), "p99": ms(p99) }),
        );
    }

    let filter = collect(runs, |m| m.filter_total);
    let per_frame = ms(p(&filter, 0.50)) / f64::from(frames);
    let fps = if per_frame > 0.0 {
        1000.0 / per_frame
    } else {
        f64::INFINITY
    };
    eprintln!("  filter per frame (p50) {per_frame:.3}ms  ~{fps:.1} fps");
    out.insert("filter_per_frame_p50".to_string(), json!(per_frame));
    serde_json::Value::Object(out)
}
