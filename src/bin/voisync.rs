use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use voisync::{
    AnimationController, CharacterConfig, CropRect, ExportOptions, FfmpegMuxer, Fps, FrameFormat,
    FsImageLoader, LayerRenderer, LipSyncSummary, MouthShape, MuxConfig, PixelSurface,
    SynthesisQuery, generate_frames,
};

#[derive(Parser, Debug)]
#[command(name = "voisync", version)]
struct Cli {
    /// Log at DEBUG instead of INFO.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn a synthesis query into a mouth-shape timeline.
    Lipsync(LipsyncArgs),
    /// Render one still of a character as a PNG.
    Frame(FrameArgs),
    /// Export every frame of an utterance, optionally muxing an MP4 (requires `ffmpeg` on PATH).
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct LipsyncArgs {
    /// Synthesis query JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output JSON path; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Character config JSON.
    #[arg(long)]
    character: PathBuf,

    /// Mouth shape (a, i, u, e, o, n, closed).
    #[arg(long, default_value_t = MouthShape::Closed)]
    mouth: MouthShape,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Character config JSON.
    #[arg(long)]
    character: PathBuf,

    /// Synthesis query JSON.
    #[arg(long)]
    query: PathBuf,

    /// Directory receiving `frameNNNNNN.<ext>` files.
    #[arg(long)]
    out_dir: PathBuf,

    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// png, jpeg or webp.
    #[arg(long, default_value_t = FrameFormat::Png)]
    format: FrameFormat,

    /// JPEG quality in (0, 1].
    #[arg(long, default_value_t = 1.0)]
    quality: f32,

    /// Output width; letterboxed when the aspect ratio differs from the crop.
    #[arg(long, requires = "height")]
    width: Option<u32>,

    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Source region as X,Y,W,H.
    #[arg(long)]
    crop: Option<CropRect>,

    /// Mux the exported frames into this MP4.
    #[arg(long)]
    video: Option<PathBuf>,

    /// WAV audio to mux alongside the frames.
    #[arg(long, requires = "video")]
    audio: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Lipsync(args) => cmd_lipsync(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_character(path: &Path) -> anyhow::Result<(CharacterConfig, LayerRenderer)> {
    let cfg = CharacterConfig::from_path(path)?;
    let loader = FsImageLoader::new(cfg.asset_root(path));
    let renderer = cfg.renderer(path, &loader)?;
    Ok((cfg, renderer))
}

fn cmd_lipsync(args: LipsyncArgs) -> anyhow::Result<()> {
    let query = SynthesisQuery::from_path(&args.in_path)?;
    let summary = LipSyncSummary::from_frames(generate_frames(&query));
    let json = serde_json::to_string_pretty(&summary).context("serialize lip-sync summary")?;

    match args.out {
        Some(out) => {
            voisync::encode::ffmpeg::ensure_parent_dir(&out)?;
            std::fs::write(&out, json).with_context(|| format!("write '{}'", out.display()))?;
            eprintln!(
                "wrote {} ({} frames, {:.3}s)",
                out.display(),
                summary.frame_count,
                summary.total_duration
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let (cfg, renderer) = load_character(&args.character)?;
    let mut surface = PixelSurface::new(renderer.canvas());
    let result = renderer.render_mouth(&mut surface, &cfg.base_layers, args.mouth)?;
    for e in &result.errors {
        tracing::warn!(kind = ?e.kind, layer = ?e.layer_path, "{}", e.details);
    }

    voisync::encode::ffmpeg::ensure_parent_dir(&args.out)?;
    surface
        .to_rgba_image()?
        .save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let (cfg, renderer) = load_character(&args.character)?;
    let query = SynthesisQuery::from_path(&args.query)?;
    let controller = AnimationController::new(generate_frames(&query), renderer)?;

    let fps = Fps::new(args.fps, 1)?;
    let opts = ExportOptions {
        fps,
        format: args.format,
        quality: args.quality,
        crop: args.crop,
        output_size: args
            .width
            .zip(args.height)
            .map(|(width, height)| voisync::Canvas { width, height }),
        ..ExportOptions::default()
    };

    let mut progress = |done: usize, total: usize| {
        if done == total || done.is_multiple_of(60) {
            tracing::info!(done, total, "export progress");
        }
    };
    let frames = controller.export_frames(&cfg.base_layers, &opts, Some(&mut progress))?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;
    for (i, frame) in frames.iter().enumerate() {
        let p = args
            .out_dir
            .join(format!("frame{i:06}.{}", frame.format.extension()));
        std::fs::write(&p, &frame.data).with_context(|| format!("write '{}'", p.display()))?;
    }
    eprintln!("wrote {} frames to {}", frames.len(), args.out_dir.display());

    if let Some(video) = args.video {
        let wav = args
            .audio
            .as_deref()
            .map(|p| std::fs::read(p).with_context(|| format!("read audio '{}'", p.display())))
            .transpose()?;
        let muxer = FfmpegMuxer::new(MuxConfig {
            fps,
            ..MuxConfig::default()
        })?;
        muxer.mux(&frames, wav.as_deref(), &video)?;
        muxer.close()?;
        eprintln!("wrote {}", video.display());
    }
    Ok(())
}
