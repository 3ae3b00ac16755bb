use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::LazyLock;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use vidpress_core::compress::{UPLOAD_LIMIT_BYTES, labelled_output_path};
use vidpress_core::ffmpeg::{EncodeSettings, FfmpegEngine, FfprobeSource};
use vidpress_core::plan::{BITRATE_TIERS, RESOLUTION_PRESETS, find_preset};
use vidpress_core::{AppError, CompressRequest, CompressionReport, Compressor, TargetSpec};

const LOG_TARGET: &str = "vidpress::cli";

#[derive(Parser, Debug)]
#[command(
    name = "vidpress",
    version,
    about = "Shrinks a video to a sensible resolution and bitrate with ffmpeg"
)]
struct Cli {
    /// Video to compress. Prompted for when omitted.
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Resolution preset (1080p, 720p, 480p, 360p, 240p) or "auto". Prompted for when omitted.
    #[arg(short, long, value_name = "LABEL")]
    quality: Option<String>,

    /// Explicit target size, e.g. 1280x720. Takes precedence over --quality.
    #[arg(short, long, value_name = "WxH", value_parser = parse_resolution)]
    resolution: Option<(u32, u32)>,

    /// Output file. Defaults to <output-dir>/compressed_<label>_<name>.mp4
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[arg(long, value_name = "DIR", default_value = "compressed")]
    output_dir: PathBuf,

    /// Stretch to the requested size instead of fitting the source aspect ratio.
    #[arg(long)]
    no_keep_aspect: bool,

    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=51))]
    crf: Option<u32>,

    /// x264 speed preset (ultrafast … veryslow).
    #[arg(long, value_name = "NAME")]
    preset: Option<String>,

    /// Audio bitrate in kbps.
    #[arg(long, value_name = "KBPS")]
    audio_bitrate: Option<u32>,

    /// JSON file with encode settings; flags override its values.
    #[arg(long, value_name = "FILE", env = "VIDPRESS_SETTINGS")]
    settings: Option<PathBuf>,

    /// Print the resolution presets and bitrate tiers, then exit.
    #[arg(long)]
    list_presets: bool,

    /// Probe and plan only; do not encode.
    #[arg(long)]
    dry_run: bool,

    /// Debug logging (RUST_LOG overrides).
    #[arg(short, long)]
    verbose: bool,
}

static RESOLUTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,5})\s*[xX×]\s*(\d{1,5})\s*$").expect("invalid resolution regex")
});

fn parse_resolution(value: &str) -> Result<(u32, u32), String> {
    let caps = RESOLUTION_RE
        .captures(value)
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {:?}", value))?;
    let width: u32 = caps[1].parse().map_err(|e| format!("bad width: {}", e))?;
    let height: u32 = caps[2].parse().map_err(|e| format!("bad height: {}", e))?;
    if width == 0 || height == 0 {
        return Err("width and height must be positive".to_string());
    }
    Ok((width, height))
}

fn prompt(question: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", question)?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_presets() {
    println!("Resolution presets:");
    for preset in RESOLUTION_PRESETS {
        println!("  {:<6} {}x{}", preset.label, preset.width, preset.height);
    }
    println!("  {:<6} scale by source size", "auto");
    println!("Bitrate tiers (long edge >= threshold):");
    for tier in BITRATE_TIERS {
        println!("  {:>5}px  {} kbps", tier.min_dimension, tier.kbps);
    }
}

fn resolve_input(cli: &Cli) -> Result<PathBuf, AppError> {
    if let Some(input) = &cli.input {
        return Ok(input.clone());
    }
    let answer = prompt("Path to the video: ")?;
    // Drag-and-drop into a terminal often quotes the path.
    let answer = answer.trim_matches(|c| c == '"' || c == '\'');
    if answer.is_empty() {
        return Err(AppError::FileNotFound(PathBuf::new()));
    }
    Ok(PathBuf::from(answer))
}

fn resolve_target(cli: &Cli) -> Result<TargetSpec, AppError> {
    if let Some((width, height)) = cli.resolution {
        return Ok(TargetSpec::explicit(width, height).keep_aspect(!cli.no_keep_aspect));
    }
    let label = match &cli.quality {
        Some(label) => label.clone(),
        None if io::stdin().is_terminal() => {
            let choices = RESOLUTION_PRESETS
                .iter()
                .map(|p| p.label)
                .collect::<Vec<_>>()
                .join(", ");
            prompt(&format!("Quality ({}, auto) [auto]: ", choices))?
        }
        None => String::new(),
    };
    let label = label.trim();
    if label.is_empty() || label.eq_ignore_ascii_case("auto") {
        return Ok(TargetSpec::auto());
    }
    if find_preset(label).is_none() {
        eprintln!("Unknown quality {:?}, using automatic scaling.", label);
    }
    Ok(TargetSpec::preset(label).keep_aspect(!cli.no_keep_aspect))
}

fn resolve_settings(cli: &Cli) -> Result<EncodeSettings, AppError> {
    let base = match &cli.settings {
        Some(path) => EncodeSettings::from_json_file(path)?,
        None => EncodeSettings::default(),
    };
    Ok(base.overlay(EncodeSettings {
        crf: cli.crf,
        preset: cli.preset.clone(),
        audio_bitrate: cli.audio_bitrate,
        ..Default::default()
    }))
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  Encoding: {percent:>3}% [{bar:30}] ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##."),
    );
    pb
}

fn print_report(report: &CompressionReport) {
    println!("Compressed: {}", report.output_path.display());
    println!(
        "  {}x{} -> {}",
        report.source.width, report.source.height, report.plan
    );
    println!(
        "  Size: {:.2} MiB -> {:.2} MiB ({:.1}% smaller)",
        report.original_mib(),
        report.compressed_mib(),
        report.reduction_percent()
    );
    println!("  Time: {:.1}s", report.elapsed.as_secs_f64());
    if !report.fits_upload_limit() {
        println!(
            "  Warning: output is larger than the {} GiB upload limit.",
            UPLOAD_LIMIT_BYTES / (1024 * 1024 * 1024)
        );
    }
}

fn output_path(cli: &Cli, target: &TargetSpec, input: &Path) -> PathBuf {
    match &cli.output {
        Some(output) => output.clone(),
        None => labelled_output_path(&cli.output_dir, &target.label(), input),
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let input = resolve_input(cli)?;
    let target = resolve_target(cli)?;
    let settings = resolve_settings(cli)?;
    let request = CompressRequest::new(&input)
        .output(output_path(cli, &target, &input))
        .target(target)
        .settings(settings);
    log::debug!(target: LOG_TARGET, "request: {:?}", request);

    let compressor = Compressor::new(FfprobeSource::new(), FfmpegEngine::new());

    if cli.dry_run {
        let (source, plan) = compressor.plan(&request)?;
        println!("Source: {}x{}", source.width, source.height);
        println!("Plan:   {}", plan);
        println!("Output: {}", request.output_path().display());
        return Ok(());
    }

    let pb = progress_bar();
    let result = compressor.compress(&request, |update| pb.set_position(update.whole_percent()));
    pb.finish_and_clear();
    print_report(&result?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    vidpress_core::logging::init(cli.verbose);

    if cli.list_presets {
        print_presets();
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            if let Some(detail) = err.detail() {
                eprintln!("{}", detail);
            }
            ExitCode::FAILURE
        }
    }
}
