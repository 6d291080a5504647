use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

use storeshot::storage::transfer::ProjectFile;
use storeshot::{
    Canvas, CompositeRenderer, DeviceType, DirDatabase, DirFrameSource, DirSink, ExportCoordinator,
    FileKvStore, FontLibrary, FrameSource, MAX_PREVIEWS, MemoryFrameSource, Orientation,
    PersistenceGateway, Project, ProjectDatabase, RenderRequest, SaveOutcome, StoreshotConfig,
};

#[derive(Parser, Debug)]
#[command(name = "storeshot", version)]
struct Cli {
    /// JSON config file; `STORESHOT_*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a project file from screenshots, one panel per screenshot.
    Init(InitArgs),
    /// Render one panel as a PNG.
    Render(RenderArgs),
    /// Export every panel at full device resolution.
    Export(ExportArgs),
    /// Manage stored projects.
    Projects(ProjectsArgs),
}

#[derive(Parser, Debug)]
struct InitArgs {
    #[arg(long, value_enum, default_value_t = DeviceArg::Iphone)]
    device: DeviceArg,

    #[arg(long, value_enum, default_value_t = OrientationArg::Portrait)]
    orientation: OrientationArg,

    /// Screenshot image files.
    #[arg(long = "screenshot")]
    screenshots: Vec<PathBuf>,

    #[arg(long, default_value = "Untitled Project")]
    name: String,

    /// Output project JSON path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Project JSON (a project file or a bare project).
    #[arg(long)]
    project: PathBuf,

    /// Panel number (1-based).
    #[arg(long, default_value_t = 1)]
    panel: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Display size relative to the device resolution.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Backing pixels per display unit.
    #[arg(long, default_value_t = 1.0)]
    density: f64,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    #[arg(long)]
    project: PathBuf,

    #[arg(long)]
    out_dir: PathBuf,
}

#[derive(Parser, Debug)]
struct ProjectsArgs {
    /// Storage directory holding the project database and key-value file.
    #[arg(long)]
    store: PathBuf,

    #[command(subcommand)]
    cmd: ProjectsCommand,
}

#[derive(Subcommand, Debug)]
enum ProjectsCommand {
    /// List stored projects.
    List,
    /// Delete a stored project.
    Delete { id: String },
    /// Import a project file and make it current.
    Import { file: PathBuf },
    /// Write a stored project as a project file.
    Export {
        id: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Store a project file, keeping its id unless `--new` is given.
    Save {
        file: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "new")]
        as_new: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DeviceArg {
    Iphone,
    Ipad,
}

impl From<DeviceArg> for DeviceType {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Iphone => Self::Iphone,
            DeviceArg::Ipad => Self::Ipad,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrientationArg {
    Portrait,
    Landscape,
}

impl From<OrientationArg> for Orientation {
    fn from(o: OrientationArg) -> Self {
        match o {
            OrientationArg::Portrait => Self::Portrait,
            OrientationArg::Landscape => Self::Landscape,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = StoreshotConfig::load(cli.config.as_deref()).context("load config")?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    rt.block_on(async {
        match cli.cmd {
            Command::Init(args) => cmd_init(args).await,
            Command::Render(args) => cmd_render(args, &config).await,
            Command::Export(args) => cmd_export(args, &config).await,
            Command::Projects(args) => cmd_projects(args, &config).await,
        }
    })
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("storeshot={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_init(args: InitArgs) -> anyhow::Result<()> {
    let mut project = Project::new(&args.name, args.device.into(), args.orientation.into());
    if args.screenshots.len() > MAX_PREVIEWS {
        tracing::warn!(
            given = args.screenshots.len(),
            "only the first {MAX_PREVIEWS} screenshots get their own panel"
        );
    }
    for (i, path) in args.screenshots.iter().enumerate() {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("read screenshot '{}'", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("screenshot-{}", i + 1));
        let index = project
            .add_screenshot(name, &bytes)
            .with_context(|| format!("decode screenshot '{}'", path.display()))?;
        if i > 0 && i < MAX_PREVIEWS {
            project.add_preview()?;
        }
        if i < MAX_PREVIEWS {
            project.select_screenshot(i32::try_from(index)?)?;
        }
    }
    project.switch_preview(0)?;

    let file = ProjectFile {
        id: project.id.clone(),
        name: project.name.clone(),
        date: chrono::Utc::now(),
        data: project,
    };
    write_file(&args.out, serde_json::to_string_pretty(&file)?.as_bytes()).await?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

async fn cmd_render(args: RenderArgs, config: &StoreshotConfig) -> anyhow::Result<()> {
    let project = read_project(&args.project).await?;
    let panel = args
        .panel
        .checked_sub(1)
        .context("panel numbers start at 1")?;
    let mut renderer = make_renderer(config).await;
    let req = RenderRequest::for_panel(&project, panel, args.scale, args.density)?;
    let mut canvas = Canvas::new();
    let report = renderer.render(&mut canvas, &req).await?;
    for skipped in &report.skipped {
        eprintln!("skipped {:?} layer: {}", skipped.layer, skipped.reason);
    }
    let png = canvas.snapshot().to_png()?;
    write_file(&args.out, &png).await?;
    eprintln!(
        "wrote {} ({}x{})",
        args.out.display(),
        report.pixel_width,
        report.pixel_height
    );
    Ok(())
}

async fn cmd_export(args: ExportArgs, config: &StoreshotConfig) -> anyhow::Result<()> {
    let project = read_project(&args.project).await?;
    let mut renderer = make_renderer(config).await;
    let coordinator = ExportCoordinator::new(config.export.clone());
    let mut sink = DirSink::new(&args.out_dir);
    let report = coordinator
        .export_all(&mut renderer, &project, &mut sink)
        .await?;
    for p in &report.exported {
        eprintln!(
            "wrote {} ({}x{})",
            args.out_dir.join(&p.file_name).display(),
            p.width,
            p.height
        );
    }
    for f in &report.failed {
        eprintln!("panel {} failed: {}", f.index + 1, f.error);
    }
    if !report.is_complete() {
        anyhow::bail!(
            "{} of {} panels failed to export",
            report.failed.len(),
            project.preview_settings.len()
        );
    }
    Ok(())
}

async fn cmd_projects(args: ProjectsArgs, config: &StoreshotConfig) -> anyhow::Result<()> {
    let gateway = open_gateway(&args.store, config);
    match args.cmd {
        ProjectsCommand::List => {
            let current = gateway.load_current_project_pointer().await?;
            for p in gateway.list_projects().await? {
                let mark = if current.as_ref().is_some_and(|c| c.id == p.id) {
                    "*"
                } else {
                    " "
                };
                println!("{mark} {}\t{}\t{}", p.id, p.name, p.date.to_rfc3339());
            }
        }
        ProjectsCommand::Delete { id } => {
            gateway.delete_project(&id).await?;
            eprintln!("deleted {id}");
        }
        ProjectsCommand::Import { file } => {
            let json = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("read project file '{}'", file.display()))?;
            let out = storeshot::import_project_json(&gateway, &json).await?;
            report_save_warning(&out.save);
            println!("{}", out.save.info.id);
            eprintln!(
                "imported \"{}\" ({})",
                out.save.info.name,
                out.save.tier.as_str()
            );
        }
        ProjectsCommand::Export { id, out } => {
            let json = storeshot::export_project_json(&gateway, &id).await?;
            write_file(&out, json.as_bytes()).await?;
            eprintln!("wrote {}", out.display());
        }
        ProjectsCommand::Save { file, name, as_new } => {
            let project = read_project(&file).await?;
            let id = if as_new || project.id.is_empty() {
                uuid::Uuid::new_v4().to_string()
            } else {
                project.id.clone()
            };
            let name = name.unwrap_or_else(|| project.name.clone());
            let out = gateway.save_project(&id, &name, &project).await?;
            gateway.save_current_project_pointer(Some(&out.info)).await?;
            report_save_warning(&out);
            println!("{}", out.info.id);
            eprintln!("saved \"{}\" ({})", out.info.name, out.tier.as_str());
        }
    }
    Ok(())
}

fn report_save_warning(outcome: &SaveOutcome) {
    if outcome.screenshots_error {
        eprintln!("warning: settings were saved without screenshots");
    }
    if outcome.index_error {
        eprintln!("warning: project saved but could not be added to the project list");
    }
}

fn open_gateway(store: &Path, config: &StoreshotConfig) -> PersistenceGateway {
    let db_root = store.join("db");
    let kv = FileKvStore::new(store.join("kv.json"), config.storage.kv_quota_bytes);
    PersistenceGateway::new(
        async move {
            let db: Arc<dyn ProjectDatabase> = Arc::new(DirDatabase::open(db_root).await?);
            Ok::<_, storeshot::StoreshotError>(db)
        },
        Arc::new(kv),
        config.storage.clone(),
    )
}

async fn make_renderer(config: &StoreshotConfig) -> CompositeRenderer {
    let frames: Arc<dyn FrameSource> = match &config.assets.frames_dir {
        Some(dir) => Arc::new(DirFrameSource::new(dir)),
        None => Arc::new(MemoryFrameSource::new()),
    };
    let fonts = FontLibrary::new();
    match &config.assets.fonts_dir {
        // A failed load marks the library failed; text is then skipped.
        Some(dir) => {
            let _ = fonts.load_dir(dir).await;
        }
        None => fonts.mark_failed("no fonts directory configured"),
    }
    CompositeRenderer::new(frames, fonts, config.render.clone())
}

/// Read a project file (`{id, name, date, data}`) or a bare project.
async fn read_project(path: &Path) -> anyhow::Result<Project> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read project '{}'", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| "parse project JSON")?;
    let is_file = value.get("data").is_some_and(|d| d.is_object());
    let mut project: Project = if is_file {
        let file: ProjectFile =
            serde_json::from_value(value).with_context(|| "parse project file")?;
        let mut p = file.data;
        p.id = file.id;
        p.name = file.name;
        p
    } else {
        serde_json::from_value(value).with_context(|| "parse project")?
    };
    project.sanitize();
    project.validate()?;
    Ok(project)
}

async fn write_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("write '{}'", path.display()))
}
