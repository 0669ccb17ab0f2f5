use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use cryoet_alignment_tools::convert::ImodExportOptions;
use cryoet_alignment_tools::io::mrc;
use cryoet_alignment_tools::model::AlignmentFormat;
use cryoet_alignment_tools::volume::VolumeOptions;
use cryoet_alignment_tools::{Result, ToolError, logging, sync};

fn main() {
    let cli = Cli::parse();
    if let Err(error) = logging::init(&cli.log).and_then(|()| run(cli.command)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Convert(args) => execute_convert(args),
        Command::Info(args) => execute_info(args),
        Command::Export(args) => {
            sync::export_tables(&args.input, args.from.into(), &args.output)
        }
    }
}

fn execute_convert(args: ConvertArgs) -> Result<()> {
    let volume = args.volume_options()?;
    match (args.from, args.to) {
        (DataFormat::Imod, DataFormat::Cdp) => {
            sync::imod_to_portal(&args.input, &args.output, &volume)
        }
        (DataFormat::Aretomo3, DataFormat::Cdp) => {
            sync::aretomo_to_portal(&args.input, &args.output, &volume)
        }
        (DataFormat::Cdp, DataFormat::Imod) => {
            let mut options = ImodExportOptions::new(args.require_ts_size()?, args.pixel_spacing);
            options.binning = args.binning;
            sync::portal_to_imod(&args.input, &args.output, &options)
        }
        (DataFormat::Cdp, DataFormat::Aretomo3) => {
            sync::portal_to_aretomo(&args.input, &args.output, args.require_ts_size()?)
        }
        (DataFormat::Imod, DataFormat::Aretomo3) => {
            sync::imod_to_aretomo(&args.input, &args.output, args.ts_size())
        }
        (DataFormat::Aretomo3, DataFormat::Imod) => sync::aretomo_to_imod(
            &args.input,
            &args.output,
            &volume,
            args.pixel_spacing,
            args.binning,
        ),
        _ => Err(ToolError::UnsupportedConversion {
            from: args.from.to_string(),
            to: args.to.to_string(),
        }),
    }
}

fn execute_info(args: InfoArgs) -> Result<()> {
    let summary = sync::describe(&args.input, args.from.into(), args.frames)?;
    println!("format: {}", summary.format);
    println!("frames: {}", summary.frame_count);
    println!("sections: {}", summary.section_count);
    println!("skipped sections: {:?}", summary.skipped_sections);
    match summary.median_tilt_axis {
        Some(angle) => println!("median tilt axis: {angle:.3}"),
        None => println!("median tilt axis: n/a"),
    }
    Ok(())
}

fn read_volume(path: &Path) -> Result<VolumeOptions> {
    Ok(VolumeOptions::from_header(mrc::read_header(path)?))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Convert tilt-series alignments between IMOD, AreTomo3 and the CryoET Data Portal."
)]
struct Cli {
    /// Default log filter; `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert an alignment from one representation to another.
    Convert(ConvertArgs),
    /// Print frame bookkeeping and the median tilt axis of an alignment.
    Info(InfoArgs),
    /// Export the numeric tables of an alignment to an Excel workbook.
    Export(ExportArgs),
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// Source representation.
    #[arg(long, value_enum)]
    from: DataFormat,

    /// Input file path, or basename for IMOD bundles.
    #[arg(long)]
    input: PathBuf,

    /// Target representation.
    #[arg(long, value_enum)]
    to: DataFormat,

    /// Output file path, or basename for IMOD bundles.
    #[arg(long)]
    output: PathBuf,

    /// Tilt-series size in pixels and frames.
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
    ts_size: Option<Vec<usize>>,

    /// Pixel spacing of the unbinned tilt series, in Angstrom.
    #[arg(long, default_value_t = 1.0)]
    pixel_spacing: f64,

    /// Binning factor recorded in newst.com.
    #[arg(long, default_value_t = 1)]
    binning: u32,

    /// Reconstruction whose MRC header provides the volume dimension.
    #[arg(long, conflicts_with = "volume_size")]
    volume: Option<PathBuf>,

    /// Explicit volume dimension in Angstrom.
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
    volume_size: Option<Vec<f64>>,
}

impl ConvertArgs {
    fn ts_size(&self) -> Option<[usize; 3]> {
        match self.ts_size.as_deref() {
            Some(&[x, y, z]) => Some([x, y, z]),
            _ => None,
        }
    }

    fn require_ts_size(&self) -> Result<[usize; 3]> {
        self.ts_size()
            .ok_or_else(|| ToolError::MissingInput("--ts-size X Y Z is required".into()))
    }

    fn volume_options(&self) -> Result<VolumeOptions> {
        match (&self.volume, self.volume_size.as_deref()) {
            (_, Some(&[x, y, z])) => Ok(VolumeOptions::explicit([x, y, z])),
            (Some(path), _) => read_volume(path),
            _ => Ok(VolumeOptions::default()),
        }
    }
}

#[derive(clap::Args)]
struct InfoArgs {
    /// Source representation.
    #[arg(long, value_enum)]
    from: DataFormat,

    /// Input file path, or basename for IMOD bundles.
    #[arg(long)]
    input: PathBuf,

    /// Number of frames in the original tilt series.
    #[arg(long)]
    frames: Option<usize>,
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Source representation.
    #[arg(long, value_enum)]
    from: DataFormat,

    /// Input file path, or basename for IMOD bundles.
    #[arg(long)]
    input: PathBuf,

    /// Output workbook path.
    #[arg(long)]
    output: PathBuf,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DataFormat {
    Imod,
    Aretomo3,
    Cdp,
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", AlignmentFormat::from(*self))
    }
}

impl From<DataFormat> for AlignmentFormat {
    fn from(format: DataFormat) -> Self {
        match format {
            DataFormat::Imod => AlignmentFormat::Imod,
            DataFormat::Aretomo3 => AlignmentFormat::AreTomo3,
            DataFormat::Cdp => AlignmentFormat::Portal,
        }
    }
}
