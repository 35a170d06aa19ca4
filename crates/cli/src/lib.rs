use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use grader_core::{FinishCheck, GradingSession, QuestionSeed, UploadSource};
use raster_engine::{decode_bitmap, default_rasterizer, PageRasterizer, SheetFormat};
use serde::Serialize;
use sheet_model::{Marksheet, PaperDetails, StudentInfo};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::MarksheetArchive;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "redpen")]
#[command(about = "RedPen grading CLI")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a batch of answer sheet files and print their metadata.
    Info {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
    /// Rasterize one page to a PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Render scale for PDF pages; bitmap sheets keep their pixel size.
        #[arg(long, default_value_t = 1.5)]
        scale: f32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Grade answer sheets non-interactively and print the marksheet.
    Grade(GradeArgs),
    /// Inspect the marksheet archive.
    Archive {
        #[command(subcommand)]
        command: ArchiveCommands,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Args)]
struct GradeArgs {
    /// Answer sheet files, appended in the order given.
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
    /// JSON question list: [{"label": "Q1", "max_marks": 10.0}, ...].
    #[arg(long, value_name = "FILE")]
    questions: Option<PathBuf>,
    /// Number of uniform questions, when --questions is not given.
    #[arg(long)]
    count: Option<u32>,
    /// Maximum marks per question, for --count.
    #[arg(long, default_value_t = 10.0)]
    max: f32,
    /// Comma-separated marks, applied to questions in order.
    #[arg(long, value_delimiter = ',')]
    marks: Vec<f32>,
    #[arg(long)]
    name: String,
    #[arg(long)]
    roll: String,
    #[arg(long)]
    class: Option<String>,
    #[arg(long)]
    paper: String,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long, default_value = "anonymous")]
    evaluator: String,
    /// Score unmarked questions as zero instead of refusing to finish.
    #[arg(long)]
    allow_incomplete: bool,
    /// Append the marksheet to the default archive.
    #[arg(long)]
    archive: bool,
    /// Append the marksheet to an archive rooted at this directory.
    #[arg(long, value_name = "DIR")]
    archive_root: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum ArchiveCommands {
    /// List archived marksheets, newest first.
    List {
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print aggregate statistics for the archive.
    Stats {
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    files: Vec<FileInfo>,
    total_pages: u32,
}

#[derive(Debug, Serialize)]
struct FileInfo {
    path: String,
    format: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct ArchiveRow {
    roll_no: String,
    student: String,
    paper: String,
    percentage: f32,
    grade: String,
    evaluated_at: i64,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    init_tracing();
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { files } => run_info(&files),
        Commands::Render { file, page, scale, output } => {
            run_render(&file, page, scale, output.as_deref())
        }
        Commands::Grade(args) => run_grade(args),
        Commands::Archive { command } => match command {
            ArchiveCommands::List { root, limit } => run_archive_list(root.as_deref(), limit),
            ArchiveCommands::Stats { root } => run_archive_stats(root.as_deref()),
        },
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_info(files: &[PathBuf]) -> Result<()> {
    let mut rows = Vec::with_capacity(files.len());
    let mut total_pages = 0u32;

    for file in files {
        ensure_sheet_exists(file)?;
        let format = sheet_format(file)?;

        let row = if format.is_pdf() {
            let mut rasterizer = default_rasterizer();
            let handle = rasterizer
                .open(UploadSource::from(file.as_path()))
                .with_context(|| format!("failed to open PDF {}", file.display()))?;

            let page_count = rasterizer.page_count(handle)?;
            let size = rasterizer.page_size(handle, 1)?;
            rasterizer.close(handle)?;

            FileInfo {
                path: file.display().to_string(),
                format: format.as_str().to_string(),
                page_count,
                first_page_size_pt: Some(PageSizeOutput {
                    width: size.width_pt,
                    height: size.height_pt,
                }),
            }
        } else {
            FileInfo {
                path: file.display().to_string(),
                format: format.as_str().to_string(),
                page_count: 1,
                first_page_size_pt: None,
            }
        };

        total_pages += row.page_count;
        rows.push(row);
    }

    let payload = InfoOutput { files: rows, total_pages };
    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_render(file: &Path, page: u32, scale: f32, output: Option<&Path>) -> Result<()> {
    ensure_sheet_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }
    let format = sheet_format(file)?;

    let image = if format.is_pdf() {
        let mut rasterizer = default_rasterizer();
        let handle = rasterizer.open(UploadSource::from(file)).context("failed to open PDF")?;
        let rendered =
            rasterizer.render_page(handle, page, scale).context("failed to render page")?;
        rasterizer.close(handle)?;
        rendered
    } else {
        if page != 1 {
            anyhow::bail!("bitmap sheets have a single page");
        }
        let bytes = fs::read(file)?;
        decode_bitmap(&bytes).context("failed to decode image")?
    };

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn run_grade(args: GradeArgs) -> Result<()> {
    for file in &args.files {
        ensure_sheet_exists(file)?;
    }

    let seeds = load_seeds(&args)?;
    let mut session = GradingSession::new(default_rasterizer(), seeds, args.evaluator.as_str())
        .context("invalid question list")?;

    if args.marks.len() > session.ledger().len() {
        anyhow::bail!(
            "{} marks given for {} questions",
            args.marks.len(),
            session.ledger().len()
        );
    }

    let sources: Vec<UploadSource> =
        args.files.iter().map(|file| UploadSource::from(file.as_path())).collect();
    session.upload(sources).context("failed to load answer sheets")?;

    for value in &args.marks {
        session.enter_marks(*value);
    }

    if let FinishCheck::Incomplete(warning) = session.request_finish()? {
        if !args.allow_incomplete {
            anyhow::bail!("{warning}; pass --allow-incomplete to score them zero");
        }
    }

    let mut student = StudentInfo::new(args.name.as_str(), args.roll.as_str());
    if let Some(class_name) = &args.class {
        student = student.with_class(class_name.as_str());
    }
    let mut paper = PaperDetails::new(args.paper.as_str());
    if let Some(subject) = &args.subject {
        paper = paper.with_subject(subject.as_str());
    }

    let sheet = session.confirm_finish(&student, &paper, args.allow_incomplete)?;
    archive_if_requested(&args, &sheet)?;

    let json = serde_json::to_string_pretty(&sheet)?;
    println!("{json}");

    Ok(())
}

fn run_archive_list(root: Option<&Path>, limit: Option<usize>) -> Result<()> {
    let archive = open_archive(root)?;
    let mut records = archive.list().context("failed to read archive")?;
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    let rows: Vec<ArchiveRow> = records
        .into_iter()
        .map(|sheet| ArchiveRow {
            roll_no: sheet.student.roll_no,
            student: sheet.student.name,
            paper: sheet.paper.title,
            percentage: sheet.percentage,
            grade: sheet.grade.as_str().to_string(),
            evaluated_at: sheet.evaluated_at,
        })
        .collect();

    let json = serde_json::to_string_pretty(&rows)?;
    println!("{json}");

    Ok(())
}

fn run_archive_stats(root: Option<&Path>) -> Result<()> {
    let archive = open_archive(root)?;
    let stats = archive.stats().context("failed to read archive")?;

    let json = serde_json::to_string_pretty(&stats)?;
    println!("{json}");

    Ok(())
}

fn load_seeds(args: &GradeArgs) -> Result<Vec<QuestionSeed>> {
    if let Some(path) = &args.questions {
        let bytes =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let seeds = serde_json::from_slice(&bytes).context("invalid questions file")?;
        return Ok(seeds);
    }

    let count = args.count.context("provide --questions or --count")?;
    Ok((1..=count).map(|n| QuestionSeed::new(format!("Q{n}"), args.max)).collect())
}

fn archive_if_requested(args: &GradeArgs, sheet: &Marksheet) -> Result<()> {
    let archive = match (&args.archive_root, args.archive) {
        (Some(root), _) => MarksheetArchive::with_root(root),
        (None, true) => MarksheetArchive::from_default_project()
            .context("failed to resolve archive directory")?,
        (None, false) => return Ok(()),
    };

    archive.append(sheet).context("failed to archive marksheet")?;
    Ok(())
}

fn open_archive(root: Option<&Path>) -> Result<MarksheetArchive> {
    match root {
        Some(root) => Ok(MarksheetArchive::with_root(root)),
        None => MarksheetArchive::from_default_project()
            .context("failed to resolve archive directory"),
    }
}

fn sheet_format(file: &Path) -> Result<SheetFormat> {
    let name = file.file_name().and_then(|name| name.to_str()).unwrap_or_default();

    SheetFormat::from_name(name)
        .with_context(|| format!("unsupported file type: {}", file.display()))
}

fn ensure_sheet_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
