//! Trove CLI - Command line interface for building and inspecting vaults.
//!
//! `create` packs host files into an archive or a generated loader source
//! file. The query commands read from an archive, a host directory, or a
//! backend picked by a selector configuration.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use trove_storage::{
    BackendRegistry, Environment, FilesystemVault, SelectorConfig, Vault, VaultSelector,
};
use trove_vault::{BuilderOptions, MemoryBuilder, MemoryVault};

#[derive(Parser)]
#[command(name = "trove")]
#[command(about = "Trove - In-memory vaults packed from host files")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack host files into a vault.
    Create {
        /// Vault name, used for generated identifiers and default output.
        #[arg(short, long)]
        name: String,

        /// Output file (default: trove_<name>.rs, or trove_<name>.bin with --binary).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Directory the include globs are relative to.
        #[arg(long)]
        include_root: Option<PathBuf>,

        /// Glob of host files to include. May be repeated.
        #[arg(short, long, required = true)]
        include: Vec<String>,

        /// Make the generated loader public.
        #[arg(long)]
        export_loader: bool,

        /// Write the raw archive instead of a loader source file.
        #[arg(long)]
        binary: bool,
    },

    /// List a vault directory.
    Ls {
        #[command(flatten)]
        source: SourceArgs,

        /// Directory within the vault.
        #[arg(default_value = ".")]
        dir: String,
    },

    /// Print the paths matching a glob pattern.
    Glob {
        #[command(flatten)]
        source: SourceArgs,

        /// Shell-style pattern.
        pattern: String,
    },

    /// Write a file's contents to stdout.
    Cat {
        #[command(flatten)]
        source: SourceArgs,

        /// File within the vault.
        path: String,
    },

    /// Show information about a file or directory.
    Stat {
        #[command(flatten)]
        source: SourceArgs,

        /// Path within the vault.
        #[arg(default_value = ".")]
        path: String,
    },
}

/// Where query commands read from.
#[derive(Args, Debug, Default)]
struct SourceArgs {
    /// Vault archive file.
    #[arg(short, long)]
    archive: Option<PathBuf>,

    /// Host directory served as a filesystem vault.
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Selector configuration (JSON). The archive and root, when given,
    /// are registered as the `archive` and `filesystem` backends.
    #[arg(short, long)]
    select: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Create {
            name,
            out,
            include_root,
            include,
            export_loader,
            binary,
        } => cmd_create(
            &name,
            out,
            include_root.unwrap_or_default(),
            &include,
            export_loader,
            binary,
        ),

        Commands::Ls { source, dir } => cmd_ls(&source, &dir),

        Commands::Glob { source, pattern } => cmd_glob(&source, &pattern),

        Commands::Cat { source, path } => cmd_cat(&source, &path),

        Commands::Stat { source, path } => cmd_stat(&source, &path),
    }
}

/// Default output file for `create`.
fn default_output(name: &str, binary: bool) -> PathBuf {
    let extension = if binary { "bin" } else { "rs" };
    PathBuf::from(format!("trove_{}.{}", name, extension))
}

/// Build a vault from host files and write it out.
fn cmd_create(
    name: &str,
    out: Option<PathBuf>,
    include_root: PathBuf,
    include: &[String],
    export_loader: bool,
    binary: bool,
) -> Result<()> {
    info!("Creating vault: {}", name);

    let options = BuilderOptions::new().with_export_loader(export_loader);
    let mut builder = MemoryBuilder::with_options(options);
    builder
        .include(&include_root, include)
        .context("Failed to include files")?;

    let out = out.unwrap_or_else(|| default_output(name, binary));
    let file = File::create(&out)
        .with_context(|| format!("Failed to create output file {}", out.display()))?;
    let mut writer = BufWriter::new(file);

    if binary {
        builder
            .write_binary(&mut writer)
            .context("Failed to write archive")?;
    } else {
        builder
            .write_loader(name, &mut writer)
            .context("Failed to write loader")?;
    }
    writer.flush().context("Failed to flush output file")?;

    let vault = builder.vault();
    println!("Vault created successfully!");
    println!("  Name: {}", name);
    println!("  Files: {}", vault.file_count());
    println!("  Size: {} bytes", vault.total_size());
    println!("  Output: {}", out.display());

    Ok(())
}

fn load_archive(path: &Path) -> Result<MemoryVault> {
    let data = fs::read(path)
        .with_context(|| format!("Failed to read archive {}", path.display()))?;
    MemoryVault::from_archive(&data)
        .with_context(|| format!("Failed to decode archive {}", path.display()))
}

/// Open the vault named by the source flags.
fn open_source(source: &SourceArgs) -> Result<Box<dyn Vault>> {
    if let Some(config_path) = &source.select {
        let json = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read selector config {}", config_path.display()))?;
        let config = SelectorConfig::from_json(&json).context("Invalid selector config")?;

        let mut registry = BackendRegistry::new();
        if let Some(path) = &source.archive {
            registry.register("archive", Arc::new(load_archive(path)?))?;
        }
        if let Some(root) = &source.root {
            registry.register("filesystem", Arc::new(FilesystemVault::new(root)))?;
        }

        let selector = VaultSelector::select(&config, &registry, &Environment::capture())
            .context("Failed to select vault")?;
        return Ok(Box::new(selector));
    }

    if let Some(path) = &source.archive {
        return Ok(Box::new(load_archive(path)?));
    }

    if let Some(root) = &source.root {
        return Ok(Box::new(FilesystemVault::new(root)));
    }

    bail!("No vault source given. Use --archive, --root or --select");
}

/// List directory contents.
fn cmd_ls(source: &SourceArgs, dir: &str) -> Result<()> {
    let vault = open_source(source)?;
    info!("Listing {} in {}", dir, vault.display_name());

    let contents = vault.read_dir(dir).context("Failed to list directory")?;

    if contents.is_empty() {
        println!("Directory is empty.");
    } else {
        println!("Contents of {}:", dir);
        for entry in contents {
            if entry.is_dir {
                println!("  [DIR]  {}/", entry.name);
            } else {
                println!("  [FILE] {} ({} bytes)", entry.name, entry.size);
            }
        }
    }

    Ok(())
}

/// Print matching paths.
fn cmd_glob(source: &SourceArgs, pattern: &str) -> Result<()> {
    let vault = open_source(source)?;

    let matches = vault.glob(pattern).context("Failed to match pattern")?;
    for path in matches {
        println!("{}", path);
    }

    Ok(())
}

/// Write a file to stdout.
fn cmd_cat(source: &SourceArgs, path: &str) -> Result<()> {
    let vault = open_source(source)?;

    let content = vault
        .read_file(path)
        .with_context(|| format!("Failed to read {}", path))?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(&content)?;
    stdout.flush()?;

    Ok(())
}

/// Show file information.
fn cmd_stat(source: &SourceArgs, path: &str) -> Result<()> {
    let vault = open_source(source)?;

    let stat = vault
        .stat(path)
        .with_context(|| format!("Failed to stat {}", path))?;

    println!("Path: {}", path);
    println!("  Name: {}", stat.name);
    println!(
        "  Type: {}",
        if stat.is_dir { "directory" } else { "file" }
    );
    if !stat.is_dir {
        println!("  Size: {} bytes", stat.size);
    }
    println!("  Modified: {}", stat.modified.to_rfc3339());

    Ok(())
}
