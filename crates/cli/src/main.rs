use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;

use framekit_core::pipeline::export_frames_use_case::{
    ExportFramesUseCase, ExportRequest, ExportTarget,
};
use framekit_core::shared::constants::DEFAULT_HDF5_DATASET;
use framekit_core::shared::error::VideoError;
use framekit_core::video::domain::backend_options::BackendOptions;
use framekit_core::video::factory;
use framekit_core::video::video::Video;

/// Inspect and convert frame-indexed videos.
#[derive(Parser)]
#[command(name = "framekit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print shape, dtype and frame rate of a video.
    Info {
        /// Media file, HDF5 file, image directory or image store.
        path: PathBuf,

        /// Backend option as key=value (e.g. dataset=box, grayscale=true).
        #[arg(short = 'o', long = "option")]
        options: Vec<String>,

        /// Print a JSON object instead of aligned text.
        #[arg(long)]
        json: bool,
    },

    /// Copy frames into a new HDF5 group or image store.
    Export {
        source: PathBuf,

        destination: PathBuf,

        #[arg(long, value_enum)]
        target: TargetArg,

        /// HDF5 group to write.
        #[arg(long, default_value = DEFAULT_HDF5_DATASET)]
        dataset: String,

        /// Frames to copy (comma-separated). All frames when omitted.
        #[arg(long, value_delimiter = ',')]
        frames: Option<Vec<usize>>,

        /// Image format for embedded frames, or codec/container for a clip.
        #[arg(long, default_value = "")]
        format: String,

        /// Key the new store by position instead of original frame number.
        #[arg(long)]
        by_index: bool,

        /// Do not decode missing frames from the source video.
        #[arg(long)]
        no_source_fallback: bool,

        /// Backend option for the source as key=value.
        #[arg(short = 'o', long = "option")]
        options: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetArg {
    Hdf5,
    Imgstore,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Info {
            path,
            options,
            json,
        } => run_info(path, &options, json),
        Command::Export {
            source,
            destination,
            target,
            dataset,
            frames,
            format,
            by_index,
            no_source_fallback,
            options,
        } => {
            let target = match target {
                TargetArg::Hdf5 => ExportTarget::Hdf5 { dataset },
                TargetArg::Imgstore => ExportTarget::ImgStore,
            };
            let request = ExportRequest {
                frame_numbers: frames,
                format,
                index_by_original: !by_index,
                enable_source_fallback: !no_source_fallback,
            };
            run_export(source, destination, &target, request, &options)
        }
    }
}

/// Shape, dtype, frame rate and key space of `video` as one JSON object.
fn describe(video: &mut Video) -> Result<serde_json::Value, VideoError> {
    let (frames, height, width, channels) = video.shape()?.as_tuple();
    Ok(json!({
        "backend": video.kind().to_string(),
        "file": video.filename().map(|p| p.display().to_string()),
        "shape": [frames, height, width, channels],
        "dtype": video.dtype().to_string(),
        "fps": video.fps()?,
        "indexing": format!("{:?}", video.index_mode()?),
        "last_key": video.last_frame_idx()?,
    }))
}

fn run_info(path: PathBuf, options: &[String], as_json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let options = BackendOptions::from_pairs(options)?;
    let mut video = factory::open(path, &options)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&describe(&mut video)?)?);
        video.close();
        return Ok(());
    }

    let (frames, height, width, channels) = video.shape()?.as_tuple();
    println!("backend:  {}", video.kind());
    if let Some(filename) = video.filename() {
        println!("file:     {}", filename.display());
    }
    println!("shape:    ({frames}, {height}, {width}, {channels})");
    println!("dtype:    {}", video.dtype());
    match video.fps()? {
        Some(fps) => println!("fps:      {fps:.3}"),
        None => println!("fps:      -"),
    }
    println!("indexing: {:?}", video.index_mode()?);
    if let Some(last) = video.last_frame_idx()? {
        println!("last key: {last}");
    }
    video.close();
    Ok(())
}

fn run_export(
    source: PathBuf,
    destination: PathBuf,
    target: &ExportTarget,
    request: ExportRequest,
    options: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let options = BackendOptions::from_pairs(options)?;
    let mut video = factory::open(source, &options)?;

    let progress: Box<dyn Fn(usize, usize) + Send> = Box::new(|current, total| {
        eprint!("\rExporting frame {current}/{total}");
    });
    let mut use_case = ExportFramesUseCase::new(target.writer(), Some(progress));
    let mut exported = use_case.execute(&mut video, &destination, request)?;
    eprintln!();

    log::info!(
        "Wrote {} frames to {}",
        exported.len()?,
        destination.display()
    );
    exported.close();
    video.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_describe_reports_shape_and_keys() {
        let mut video = Video::from_ndarray(Array4::zeros((3, 4, 5, 1)), &BackendOptions::default());
        let summary = describe(&mut video).unwrap();
        assert_eq!(summary["backend"], video.kind().to_string());
        assert_eq!(summary["shape"], json!([3, 4, 5, 1]));
        assert_eq!(summary["file"], serde_json::Value::Null);
        assert_eq!(summary["fps"], serde_json::Value::Null);
        assert_eq!(summary["last_key"], 2);
    }

    #[test]
    fn test_info_json_flag() {
        let cli = Cli::try_parse_from(["framekit", "info", "clip.mp4", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Info { json: true, .. }));
    }
}
