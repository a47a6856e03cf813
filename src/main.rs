use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use shelfcheck::detection::find_latest_weights;
use shelfcheck::render;
use shelfcheck::{
    Detector, LabelFileDetector, ReviewConfig, ReviewMode, ScanOrder, Session, YoloDetector,
    YoloParams,
};

#[derive(Parser)]
#[command(name = "shelfcheck")]
#[command(about = "Review clipstrip detections across a corpus of shelf photos")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print corpus statistics
    Summary {
        #[command(flatten)]
        args: ReviewArgs,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,

        /// Include the per-store breakdown
        #[arg(long)]
        groups: bool,
    },
    /// Step through detections interactively
    Browse {
        #[command(flatten)]
        args: ReviewArgs,
    },
}

#[derive(Args)]
struct ReviewArgs {
    /// Directories containing shelf images
    #[arg(value_name = "DIR")]
    roots: Vec<PathBuf>,

    /// JSON config file; flags given here override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Detection model weights (.rten)
    #[arg(long, value_name = "FILE")]
    weights: Option<PathBuf>,

    /// Use the newest <RUN>/weights/best.rten under this directory
    #[arg(long, value_name = "DIR")]
    runs_dir: Option<PathBuf>,

    /// Replay exported YOLO prediction files instead of running a model
    #[arg(long)]
    predictions: bool,

    /// Directory holding exported prediction files (default: next to images)
    #[arg(long, value_name = "DIR", requires = "predictions")]
    labels_dir: Option<PathBuf>,

    /// Minimum detection confidence
    #[arg(short = 'c', long)]
    confidence: Option<f32>,

    /// Images per page in paged mode
    #[arg(long)]
    page_size: Option<usize>,

    /// Review one image at a time or a page at a time
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Show the most recently modified images first
    #[arg(long)]
    recent: bool,

    /// Scan subdirectories of each root
    #[arg(short, long)]
    recursive: bool,

    /// Run detection on all CPU cores
    #[arg(long)]
    parallel: bool,

    /// Class names by class id
    #[arg(long, value_delimiter = ',')]
    classes: Option<Vec<String>>,

    /// Write annotated images to this directory
    #[arg(long, value_name = "DIR")]
    save_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Single,
    Paged,
}

impl From<ModeArg> for ReviewMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => ReviewMode::Single,
            ModeArg::Paged => ReviewMode::Paged,
        }
    }
}

impl ReviewArgs {
    fn review_config(&self) -> anyhow::Result<ReviewConfig> {
        let mut config = match &self.config {
            Some(path) => ReviewConfig::from_json_file(path)?,
            None => ReviewConfig::default(),
        };

        if !self.roots.is_empty() {
            config.roots = self.roots.clone();
        }
        if let Some(confidence) = self.confidence {
            config.confidence_threshold = confidence;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }
        if self.recent {
            config.order = ScanOrder::Recent;
        }
        config.recursive |= self.recursive;
        config.parallel |= self.parallel;

        config.validate()?;
        Ok(config)
    }

    fn class_names(&self) -> Vec<String> {
        self.classes
            .clone()
            .unwrap_or_else(|| YoloParams::default().class_names)
    }

    fn detector(&self) -> anyhow::Result<Arc<dyn Detector>> {
        if self.predictions {
            let detector = LabelFileDetector::new(self.labels_dir.clone(), self.class_names())?;
            return Ok(Arc::new(detector));
        }

        let weights = match (&self.weights, &self.runs_dir) {
            (Some(weights), _) => weights.clone(),
            (None, Some(runs_dir)) => find_latest_weights(runs_dir)
                .with_context(|| format!("Failed to search {:?} for weights", runs_dir))?
                .ok_or_else(|| anyhow::anyhow!("No trained weights found under {:?}", runs_dir))?,
            (None, None) => anyhow::bail!("Pass --weights, --runs-dir or --predictions"),
        };

        let params = YoloParams {
            class_names: self.class_names(),
            ..YoloParams::default()
        };
        Ok(Arc::new(YoloDetector::load(&weights, params)?))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let args = match &cli.command {
        Command::Summary { args, .. } | Command::Browse { args } => args,
    };

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    // Both fatal errors surface here, before any review output is printed.
    let config = args.review_config()?;
    let detector = args.detector()?;
    let mut session = Session::open(config, detector)?;

    if session.corpus().is_empty() {
        println!("No images found in the corpus folders.");
        return Ok(());
    }

    match &cli.command {
        Command::Summary { json, groups, .. } => run_summary(&mut session, *json, *groups)?,
        Command::Browse { .. } => run_browse(&mut session)?,
    }

    if let Some(dir) = &args.save_dir {
        export_annotated(&mut session, dir)?;
    }

    Ok(())
}

fn run_summary(session: &mut Session, json: bool, groups: bool) -> anyhow::Result<()> {
    let stats = session.statistics();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let target = session.config().target_label.clone();
    println!("=== {} compliance summary ===", capitalize(&target));
    println!("{}", render::metrics_block(&stats, &target));
    println!("{}", render::summary_line(&stats, &target));
    if groups {
        println!("\n{}", render::group_table(&stats));
    }
    Ok(())
}

fn run_browse(session: &mut Session) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    print_screen(session);
    loop {
        print!("[n]ext [p]rev [r]efresh [t <conf>] [q]uit > ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("n") | Some("next") => {
                session.advance();
            }
            Some("p") | Some("prev") => {
                session.retreat();
            }
            Some("r") | Some("refresh") => {
                if let Err(e) = session.refresh() {
                    println!("refresh failed: {e}");
                    continue;
                }
            }
            Some("t") | Some("threshold") => {
                let value = parts.next().and_then(|v| v.parse::<f32>().ok());
                match value {
                    Some(value) => {
                        if let Err(e) = session.set_threshold(value) {
                            println!("{e}");
                            continue;
                        }
                    }
                    None => {
                        println!("usage: t <confidence between 0 and 1>");
                        continue;
                    }
                }
            }
            Some("q") | Some("quit") => break,
            _ => continue,
        }
        print_screen(session);
    }
    Ok(())
}

fn print_screen(session: &mut Session) {
    let target = session.config().target_label.clone();
    let snapshot = session.snapshot();
    let position = &snapshot.position;

    println!();
    println!("{}", render::summary_line(&snapshot.statistics, &target));
    println!(
        "Compliance: {:.1}% | Avg confidence: {:.2} | Threshold: {:.2}",
        snapshot.statistics.compliance_rate,
        snapshot.statistics.average_confidence,
        snapshot.confidence_threshold
    );
    println!(
        "Viewing images {} to {} of {}",
        position.first, position.last, position.total
    );

    for record in &snapshot.records {
        let view = render::record_view(record, &target);
        println!("\n  {} [{}]", view.file_name, view.group);
        println!("  {}", view.compliance_line);
        println!("  {}", view.count_line);
        for caption in &view.box_captions {
            println!("    {} at ({}, {})", caption.text, caption.x, caption.y);
        }
    }
}

fn export_annotated(session: &mut Session, dir: &std::path::Path) -> anyhow::Result<()> {
    let mut saved = 0;
    for record in session.records() {
        match render::save_annotated(dir, record) {
            Ok(_) => saved += 1,
            Err(e) => tracing::warn!(path = %record.image().path.display(), error = %e, "could not export annotated image"),
        }
    }
    println!("Saved {} annotated images to {}", saved, dir.display());
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
