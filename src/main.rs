use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use storeimg::cancel::CancelToken;
use storeimg::catalog::DEFAULT_VARIANT;
use storeimg::config::{self, StorageCredentials, StoreConfig};
use storeimg::upload::{self, SupabaseStorage};
use storeimg::{imaging, optimize, output};

fn version_string() -> &'static str {
    let hash = env!("GIT_HASH");
    if hash.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup
        Box::leak(format!("{} ({hash})", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "storeimg")]
#[command(about = "Optimize product images to WebP and upload them to Supabase Storage")]
#[command(long_about = "\
Optimize product images to WebP and upload them to Supabase Storage

Typical run:

  storeimg optimize originals/ optimized/ --variant product_card
  storeimg upload optimized/ --bucket products --prefix cards

Variants (see 'storeimg variants'):
  cover    scale so the image covers the box; one side may overflow, nothing is cropped
  contain  scale so the image fits inside the box

Upload credentials come from the environment (a .env file is read if present):
  SUPABASE_URL           project URL, e.g. https://abc.supabase.co
  SUPABASE_SERVICE_KEY   service-role key

Set RUST_LOG=debug for per-file diagnostics.
Run 'storeimg gen-config' to generate a documented storeimg.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: ./storeimg.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resize and recompress every image in a directory to WebP
    Optimize(OptimizeArgs),
    /// Upload every .webp in a directory to a storage bucket
    Upload(UploadArgs),
    /// List the available variants
    Variants,
    /// Print a stock storeimg.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct OptimizeArgs {
    /// Directory of source images (jpg, jpeg, png, webp, bmp, tiff)
    input_dir: PathBuf,

    /// Directory for the produced .webp files (created if missing)
    output_dir: PathBuf,

    /// Variant preset to apply
    #[arg(long, default_value = DEFAULT_VARIANT)]
    variant: String,

    /// Parallel workers, capped at the number of CPU cores
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    jobs: Option<u16>,

    /// Exit non-zero if any file failed
    #[arg(long)]
    strict: bool,
}

#[derive(clap::Args)]
struct UploadArgs {
    /// Directory containing .webp files
    local_dir: PathBuf,

    /// Target bucket (default from config: products)
    #[arg(long)]
    bucket: Option<String>,

    /// Path prefix inside the bucket
    #[arg(long)]
    prefix: Option<String>,

    /// Exit non-zero if any upload failed
    #[arg(long)]
    strict: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Optimize(args) => {
            let config = load_config(cli.config.as_deref())?;
            let catalog = config.catalog();
            let spec = catalog.lookup(&args.variant)?.clone();

            let mut processing = config.processing.clone();
            if let Some(jobs) = args.jobs {
                processing.jobs = Some(usize::from(jobs));
            }
            init_thread_pool(&processing);

            let scratch = args.output_dir.clone();
            let cancel = install_cancel(move || {
                let removed = imaging::remove_partial_files(&scratch);
                if removed > 0 {
                    eprintln!("Removed {removed} partial file(s) from {}", scratch.display());
                }
            });
            output::print_optimize_header(&args.input_dir, &args.output_dir, &spec);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    println!("{}", output::format_optimize_event(&event));
                }
            });
            let report = optimize::process_directory(
                &args.input_dir,
                &args.output_dir,
                &spec,
                &cancel,
                Some(tx),
            );
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            let report = report?;

            output::print_summary(&report.summary());
            if cancel.is_cancelled() {
                println!("\nInterrupted: remaining files were not processed.");
            }
            Ok(exit_code(args.strict && report.has_failures()))
        }
        Command::Upload(args) => {
            let config = load_config(cli.config.as_deref())?;
            let bucket = args.bucket.unwrap_or(config.upload.bucket);
            let prefix = args.prefix.unwrap_or(config.upload.prefix);

            // Credentials are checked before anything touches the network.
            let credentials = StorageCredentials::from_env()?;
            let files = upload::collect_uploads(&args.local_dir)?;
            if files.is_empty() {
                output::print_upload_report(&Default::default(), &args.local_dir);
                return Ok(ExitCode::SUCCESS);
            }

            log::info!("connecting to Supabase at {}", credentials.url);
            let storage = SupabaseStorage::new(credentials)?;
            let cancel = install_cancel(|| {});
            output::print_upload_header(files.len(), &bucket, &prefix);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    println!("{}", output::format_upload_event(&event));
                }
            });
            let report = upload::upload_files(&storage, &files, &bucket, &prefix, &cancel, Some(tx));
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;

            output::print_upload_report(&report, &args.local_dir);
            Ok(exit_code(args.strict && report.has_failures()))
        }
        Command::Variants => {
            let config = load_config(cli.config.as_deref())?;
            output::print_variants(&config.catalog(), DEFAULT_VARIANT);
            Ok(ExitCode::SUCCESS)
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// An explicit `--config` must exist; the implicit `./storeimg.toml` is optional.
fn load_config(explicit: Option<&Path>) -> Result<StoreConfig, config::ConfigError> {
    match explicit {
        Some(path) => config::load_config_file(path),
        None => config::load_config(Path::new(config::CONFIG_FILENAME)),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    log::debug!("using {threads} worker thread(s)");
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn install_cancel(on_abort: impl Fn() + Send + 'static) -> CancelToken {
    let cancel = CancelToken::new();
    if let Err(e) = cancel.install_ctrlc_handler(on_abort) {
        log::warn!("Ctrl-C handler not installed: {e}");
    }
    cancel
}

fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
