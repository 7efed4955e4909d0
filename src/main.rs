use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;
use volslice::{
    Colormap, DatasetConfig, Icbm2009NonLinSym, Interpolation, Orientation, PerVolume,
    RenderFormat, Slicer, SlicerOptions, StaticPlotOptions, TemplateLabel, Volume, VolumeLoader,
    dataset::{DEFAULT_DOWNLOAD_DIR, DEFAULT_URL},
    static_plot,
};
use web_time::Instant;

const TEMPLATE_PREFIX: &str = "template:";

/// Fetch the ICBM 2009c template and inspect 3D volumes slice by slice.
///
/// Inputs are NIfTI paths or `template:<label>` (t1, t2, brain, eyes, face,
/// gm, wm, csf), which loads a template image, downloading it if needed.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download and unpack the template, then list its volumes
    Fetch(DatasetArgs),
    /// Save one slice through each axis side by side
    Static(StaticArgs),
    /// Step through slices interactively in the terminal
    Slice(SliceArgs),
    /// Render every slice along an axis to an animation
    Animate(AnimateArgs),
}

#[derive(Args, Debug, Clone)]
struct DatasetArgs {
    /// Directory the template is downloaded to
    #[arg(long, env = "VOLSLICE_DATA_DIR", default_value = DEFAULT_DOWNLOAD_DIR)]
    data_dir: PathBuf,

    /// Template archive URL
    #[arg(long, env = "VOLSLICE_DATASET_URL", default_value = DEFAULT_URL)]
    url: String,

    /// Keep the downloaded archive next to the extracted files
    #[arg(long)]
    keep_zip: bool,
}

impl DatasetArgs {
    fn config(&self) -> DatasetConfig {
        DatasetConfig::default()
            .with_url(self.url.clone())
            .with_download_dir(self.data_dir.clone())
            .with_remove_zip(!self.keep_zip)
    }
}

#[derive(Args, Debug)]
struct StaticArgs {
    /// NIfTI file or template:<label>
    input: String,

    /// Slice per axis as `a,b,c`; defaults to the middle of each axis
    #[arg(long, value_parser = parse_slices)]
    slices: Option<(usize, usize, usize)>,

    #[arg(long, allow_hyphen_values = true)]
    vmin: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    vmax: Option<f32>,

    #[arg(long, value_enum, default_value_t = Colormap::Plasma)]
    cmap: Colormap,

    /// Figure size in pixels as `WxH`
    #[arg(long, value_parser = parse_size, default_value = "1000x600")]
    size: (u32, u32),

    #[arg(long)]
    no_grid: bool,

    #[arg(long, value_enum, default_value_t = Interpolation::Bilinear)]
    interpolation: Interpolation,

    /// Colorbar height relative to the figure
    #[arg(long, default_value_t = 0.4)]
    cbar_scale: f32,

    /// Output image; the format follows the extension
    #[arg(short, long, default_value = "static.png")]
    output: PathBuf,

    #[command(flatten)]
    dataset: DatasetArgs,
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// NIfTI files or template:<label>
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Slicing axis (0, 1 or 2)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
    axis: u8,

    /// Keep every n-th slice
    #[arg(long)]
    spacing: Option<usize>,

    #[arg(long, default_value_t = 1)]
    nrows: usize,

    /// One value for all volumes or one per volume
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    vmin: Vec<f32>,

    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    vmax: Vec<f32>,

    #[arg(long, value_enum, num_args = 1..)]
    cmap: Vec<Colormap>,

    #[arg(long, num_args = 1..)]
    title: Vec<String>,

    /// Figure size in pixels as `WxH`
    #[arg(long, value_parser = parse_size, default_value = "1200x400")]
    size: (u32, u32),

    #[arg(long)]
    no_grid: bool,

    #[arg(long, value_enum, default_value_t = Interpolation::Bilinear)]
    interpolation: Interpolation,

    #[command(flatten)]
    dataset: DatasetArgs,
}

impl ViewArgs {
    fn options(&self) -> SlicerOptions {
        SlicerOptions {
            size: self.size,
            nrows: self.nrows,
            grid: !self.no_grid,
            interpolation: self.interpolation,
            spacing: self.spacing,
            vmin: per_volume(&self.vmin),
            vmax: per_volume(&self.vmax),
            cmap: per_volume(&self.cmap),
            title: per_volume(&self.title),
            ..SlicerOptions::default()
        }
    }

    fn orientation(&self) -> Orientation {
        Orientation::from_index(self.axis as usize).unwrap_or(Orientation::Axial)
    }
}

#[derive(Args, Debug)]
struct SliceArgs {
    #[command(flatten)]
    view: ViewArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AnimationOutput {
    Gif,
    Html5Video,
    Jshtml,
}

#[derive(Args, Debug)]
struct AnimateArgs {
    #[command(flatten)]
    view: ViewArgs,

    /// Delay between frames in milliseconds
    #[arg(long, default_value_t = 50)]
    interval: u64,

    #[arg(long, value_enum, default_value_t = AnimationOutput::Gif)]
    format: AnimationOutput,

    /// Output file; defaults to `animation.gif` or `animation.html` by format
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl AnimateArgs {
    fn output(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let extension = match self.format {
                AnimationOutput::Gif => "gif",
                AnimationOutput::Html5Video | AnimationOutput::Jshtml => "html",
            };
            PathBuf::from(format!("animation.{extension}"))
        })
    }
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {s}"))?;
    let w = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    Ok((w, h))
}

fn parse_slices(s: &str) -> Result<(usize, usize, usize), String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<usize>().map_err(|e| format!("bad slice {p}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        [a, b, c] => Ok((*a, *b, *c)),
        _ => Err(format!("expected three slices, got {s}")),
    }
}

fn per_volume<T: Clone>(values: &[T]) -> PerVolume<T> {
    match values {
        [] => PerVolume::Unset,
        [value] => PerVolume::All(value.clone()),
        values => PerVolume::Each(values.iter().cloned().map(Some).collect()),
    }
}

fn progress_reporter() -> impl FnMut(u64, Option<u64>) {
    let mut last = Instant::now();
    move |done, total| {
        let finished = total == Some(done);
        if last.elapsed() < Duration::from_millis(250) && !finished && done != 0 {
            return;
        }
        last = Instant::now();
        let mib = |b: u64| b as f64 / (1024.0 * 1024.0);
        match total {
            Some(total) => eprint!("\rDownloading: {:.1} / {:.1} MiB", mib(done), mib(total)),
            None => eprint!("\rDownloading: {:.1} MiB", mib(done)),
        }
        if finished {
            eprintln!();
        }
    }
}

async fn load_input(input: &str, dataset: &DatasetArgs) -> Result<Volume> {
    match input.strip_prefix(TEMPLATE_PREFIX) {
        Some(label) => {
            let label: TemplateLabel = label.parse()?;
            let dir = Icbm2009NonLinSym::ensure_downloaded(&dataset.config(), progress_reporter())
                .await
                .context("failed to fetch template")?;
            let template =
                tokio::task::spawn_blocking(move || Icbm2009NonLinSym::load_labels(dir, &[label]))
                    .await??;
            template
                .get(label)
                .cloned()
                .with_context(|| format!("template has no {label} volume"))
        }
        None => VolumeLoader::load_nifti(Path::new(input))
            .with_context(|| format!("failed to load {input}")),
    }
}

async fn load_inputs(inputs: &[String], dataset: &DatasetArgs) -> Result<Vec<Volume>> {
    let mut volumes = Vec::with_capacity(inputs.len());
    for input in inputs {
        volumes.push(load_input(input, dataset).await?);
    }
    Ok(volumes)
}

async fn fetch(args: DatasetArgs) -> Result<()> {
    let template = Icbm2009NonLinSym::fetch(&args.config(), progress_reporter())
        .await
        .context("failed to fetch template")?;
    println!("{}", template.dir().display());
    for (label, volume) in template.volumes() {
        let (d0, d1, d2) = volume.dim();
        println!(
            "{label:>6}  {d0}x{d1}x{d2}  [{:.3}, {:.3}]",
            volume.min().unwrap_or(f32::NAN),
            volume.max().unwrap_or(f32::NAN)
        );
    }
    Ok(())
}

async fn static_snapshot(args: StaticArgs) -> Result<()> {
    let volume = load_input(&args.input, &args.dataset).await?;
    let options = StaticPlotOptions {
        slices: args.slices,
        vmin: args.vmin,
        vmax: args.vmax,
        cmap: args.cmap,
        size: args.size,
        grid: !args.no_grid,
        interpolation: args.interpolation,
        cbar_scale: args.cbar_scale,
    };
    let figure = static_plot(&volume, &options)?;
    figure
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(output = %args.output.display(), titles = ?figure.titles(), "saved static plot");
    Ok(())
}

#[cfg(feature = "tui")]
async fn slice(args: SliceArgs) -> Result<()> {
    let volumes = load_inputs(&args.view.inputs, &args.view.dataset).await?;
    let mut viewer = Slicer::new(&volumes, args.view.orientation(), args.view.options())?
        .interactive()?;
    volslice::tui::run_terminal(&mut viewer).context("terminal viewer failed")
}

#[cfg(not(feature = "tui"))]
async fn slice(_args: SliceArgs) -> Result<()> {
    bail!("the interactive viewer needs the `tui` feature")
}

async fn animate(args: AnimateArgs) -> Result<()> {
    let volumes = load_inputs(&args.view.inputs, &args.view.dataset).await?;
    let options = args.view.options().with_interval_ms(args.interval);
    let animation = Slicer::new(&volumes, args.view.orientation(), options)?.animate()?;
    if animation.is_empty() {
        bail!("no slices to animate");
    }
    let output = args.output();
    match args.format {
        AnimationOutput::Gif => animation.save_gif(&output)?,
        AnimationOutput::Html5Video => {
            animation.render_to_file(&output, RenderFormat::Html5Video)?
        }
        AnimationOutput::Jshtml => animation.render_to_file(&output, RenderFormat::JsHtml)?,
    }
    info!(output = %output.display(), frames = animation.len(), "saved animation");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Fetch(args) => fetch(args).await,
        Command::Static(args) => static_snapshot(args).await,
        Command::Slice(args) => slice(args).await,
        Command::Animate(args) => animate(args).await,
    }
}
