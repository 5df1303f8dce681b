use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Args, CommandFactory, ErrorKind, Parser, Subcommand};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::Serialize;

use seamloop::frames;
use seamloop::util;
use seamloop::video::{self, AnalysisConfig, AnalysisSession, LoopWindow, RenderRequest, Timeline};

#[derive(Args, Debug)]
struct AnalysisArgs {
    #[clap(
        long,
        default_value_t = video::DEFAULT_FRAMES_PER_SECOND,
        value_parser = clap::value_parser!(f32),
        help = "Rate at which the frames in each directory were sampled, in frames per second."
    )]
    fps: f32,

    #[clap(
        long,
        default_value_t = video::DEFAULT_THUMBNAIL_SIZE,
        value_parser = clap::value_parser!(u32),
        help = "Frames are downsampled to a square of this many pixels before comparison. Larger sizes only add cost."
    )]
    thumbnail_size: u32,

    #[clap(
        long,
        default_value_t = video::DEFAULT_MIN_LOOP_DURATION,
        value_parser = clap::value_parser!(f64),
        help = "Minimum loop duration, in seconds."
    )]
    min_duration: f64,

    #[clap(
        long,
        default_value_t = video::DEFAULT_MAX_LOOP_DURATION,
        value_parser = clap::value_parser!(f64),
        help = "Maximum loop duration, in seconds. Longer windows make the search slower."
    )]
    max_duration: f64,
}

impl AnalysisArgs {
    fn config(&self) -> seamloop::Result<AnalysisConfig> {
        Ok(AnalysisConfig::default()
            .with_frames_per_second(self.fps)
            .with_thumbnail_size(self.thumbnail_size)
            .with_min_loop_duration(seconds("min_duration", self.min_duration)?)
            .with_max_loop_duration(seconds("max_duration", self.max_duration)?))
    }
}

fn seconds(name: &str, value: f64) -> seamloop::Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| seamloop::Error::InvalidConfig(format!("{} ({}): {}", name, value, e)))
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[clap(after_help = "Displays info about seamloop.")]
    Info,

    #[clap(
        arg_required_else_help = true,
        after_help = "Find the most seamless loop in one or more clips. Each directory holds the frames of one clip as still images, sampled at a fixed rate and named so that they sort in playback order."
    )]
    Analyze {
        #[clap(
            required = true,
            multiple_values = true,
            value_parser = clap::value_parser!(PathBuf),
            help = "Directories of frames to analyze, one clip per directory."
        )]
        paths: Vec<PathBuf>,

        #[clap(flatten)]
        settings: AnalysisArgs,

        #[clap(
            long,
            default_value_t = video::DEFAULT_RENDER_REPEAT,
            value_parser = clap::value_parser!(u32),
            help = "Number of back-to-back repetitions to request from the renderer."
        )]
        repeat: u32,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Print a JSON report instead of a summary."
        )]
        json: bool,

        #[clap(
            long,
            default_value = "false",
            action(ArgAction::SetTrue),
            help = "Analyze clips in parallel, one thread per clip."
        )]
        threaded: bool,
    },

    #[clap(
        arg_required_else_help = true,
        after_help = "Score a manually chosen loop window. The score is the raw similarity of the frames at the two timestamps."
    )]
    Rescore {
        #[clap(
            value_parser = clap::value_parser!(PathBuf),
            help = "Directory of frames for the clip."
        )]
        path: PathBuf,

        #[clap(flatten)]
        settings: AnalysisArgs,

        #[clap(long, value_parser = clap::value_parser!(f64), help = "Loop start, in seconds.")]
        start: f64,

        #[clap(long, value_parser = clap::value_parser!(f64), help = "Loop end, in seconds.")]
        end: f64,
    },
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(
        long,
        global = true,
        default_value = "false",
        action(ArgAction::SetTrue),
        help = "Enable debug logging."
    )]
    verbose: bool,
}

impl Cli {
    fn validate(&self) {
        let mut cmd = Cli::command();
        let settings = match &self.command {
            Commands::Info => return,
            Commands::Analyze { settings, .. } => settings,
            Commands::Rescore { settings, .. } => settings,
        };
        if !(settings.min_duration.is_finite() && settings.min_duration > 0.0) {
            cmd.error(
                ErrorKind::InvalidValue,
                "min_duration must be a positive number",
            )
            .exit();
        }
        if !(settings.max_duration.is_finite() && settings.max_duration > 0.0) {
            cmd.error(
                ErrorKind::InvalidValue,
                "max_duration must be a positive number",
            )
            .exit();
        }
        if let Err(e) = settings.config().and_then(|config| config.validate()) {
            cmd.error(ErrorKind::InvalidValue, e.to_string()).exit();
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    path: &'a Path,
    config: &'a AnalysisConfig,
    best: LoopWindow,
    render: RenderRequest,
    timeline: Timeline,
}

fn analyze_clip(path: &Path, config: &AnalysisConfig) -> seamloop::Result<AnalysisSession> {
    let thumbnails =
        frames::load_image_sequence(path, config.frames_per_second, config.thumbnail_size)?;
    let session = AnalysisSession::new(config.clone())?;
    session.analyze(&frames::as_frames(&thumbnails))?;
    Ok(session)
}

fn display_loop(path: &Path, best: &LoopWindow) {
    println!("\n{}\n", path.display());
    println!(
        "* Loop - {}-{} (score: {:.1}%)",
        util::format_time(best.start),
        util::format_time(best.end),
        best.score * 100.0
    );
}

fn main() -> seamloop::Result<()> {
    let args = Cli::parse();
    args.validate();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match args.command {
        Commands::Analyze {
            ref paths,
            ref settings,
            repeat,
            json,
            threaded,
        } => {
            let config = settings.config()?;

            let mut results = Vec::new();
            if cfg!(feature = "rayon") && threaded {
                #[cfg(feature = "rayon")]
                {
                    results = paths
                        .par_iter()
                        .map(|path| analyze_clip(path, &config))
                        .collect::<Vec<_>>();
                }
            } else {
                results.extend(paths.iter().map(|path| analyze_clip(path, &config)));
            }

            let mut reports = Vec::new();
            for (path, result) in paths.iter().zip(results) {
                let session = result?;
                let (best, timeline) = match (session.best_loop(), session.timeline()) {
                    (Some(best), Some(timeline)) => (best, timeline),
                    _ => continue,
                };
                if json {
                    reports.push(Report {
                        path,
                        config: &config,
                        best,
                        render: best.render_request(repeat),
                        timeline,
                    });
                } else {
                    display_loop(path, &best);
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }
        }
        Commands::Rescore {
            ref path,
            ref settings,
            start,
            end,
        } => {
            let session = analyze_clip(path, &settings.config()?)?;
            match session.rescore(start, end) {
                Some(score) => println!("Seam score: {:.1}%", score * 100.0),
                None => println!("Selection is outside the clip; no score."),
            }
        }
        Commands::Info => {
            println!("seamloop version: {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn settings(min_duration: f64, max_duration: f64) -> AnalysisArgs {
        AnalysisArgs {
            fps: 10.0,
            thumbnail_size: video::DEFAULT_THUMBNAIL_SIZE,
            min_duration,
            max_duration,
        }
    }

    #[test]
    fn test_config_from_args() {
        let config = settings(0.7, 2.5).config().unwrap();
        assert_eq!(config.min_duration_samples(), 7);
        assert_eq!(config.max_duration_samples(), 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_unrepresentable_durations() {
        for (min, max) in [(1e30, 1e30), (1.0, f64::INFINITY), (-1.0, 2.0), (f64::NAN, 2.0)] {
            assert!(matches!(
                settings(min, max).config(),
                Err(seamloop::Error::InvalidConfig(_))
            ));
        }
    }
}
