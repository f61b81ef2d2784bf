//! scenepack CLI - export scene snapshots and inspect documents.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use scenepack::document::Strictness;
use scenepack::export::{ExportConfig, Exporter};
use scenepack::format;
use scenepack::scene::SnapshotAssetLocator;
use scenepack::{Document, Result, Scene};

#[derive(Parser)]
#[command(name = "scenepack")]
#[command(about = "Flatten scene snapshots into binary scene documents")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("SCENEPACK_BUILD_DATE"), ")"))]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scene snapshot (JSON) to a document
    Export {
        /// Input scene snapshot
        input: PathBuf,

        /// Output document (default: input with .spak extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export settings (JSON); flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory receiving Textures/ and Sounds/
        #[arg(short, long)]
        assets: Option<PathBuf>,

        /// Only export selected objects
        #[arg(long)]
        selection: bool,

        /// Emit tangent arrays
        #[arg(long)]
        tangents: bool,

        /// Keep one vertex per face corner
        #[arg(long)]
        keep_doubles: bool,

        /// Fail on dangling or malformed relations
        #[arg(long)]
        strict: bool,

        /// zlib level 0-9 for the document body
        #[arg(short = 'z', long)]
        compress: Option<i32>,

        /// Convert textures with this DDS writer
        #[arg(long)]
        dds_writer: Option<PathBuf>,
    },

    /// Show document summary
    Info {
        /// Input document
        input: PathBuf,
    },

    /// Print the document as JSON
    Dump {
        /// Input document
        input: PathBuf,
    },

    /// Check relation integrity and array invariants
    Check {
        /// Input document
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let result = match cli.command {
        Commands::Export {
            input,
            output,
            config,
            assets,
            selection,
            tangents,
            keep_doubles,
            strict,
            compress,
            dds_writer,
        } => {
            let overrides = Overrides {
                assets,
                selection,
                tangents,
                keep_doubles,
                strict,
                compress,
                dds_writer,
            };
            cmd_export(&input, output, config.as_deref(), overrides)
        }
        Commands::Info { input } => cmd_info(&input),
        Commands::Dump { input } => cmd_dump(&input),
        Commands::Check { input } => cmd_check(&input),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Command line flags layered over the config file.
struct Overrides {
    assets: Option<PathBuf>,
    selection: bool,
    tangents: bool,
    keep_doubles: bool,
    strict: bool,
    compress: Option<i32>,
    dds_writer: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, config: &mut ExportConfig) {
        if let Some(assets) = self.assets {
            config.assets_path = assets;
        }
        config.export_selection |= self.selection;
        config.export_tangents |= self.tangents;
        if self.keep_doubles {
            config.remove_doubles = false;
        }
        if self.strict {
            config.strictness = Strictness::Strict;
        }
        if let Some(level) = self.compress {
            config.compression_level = level.clamp(-1, 9);
        }
        if let Some(writer) = self.dds_writer {
            config.dds_writer = Some(writer);
            config.textures_to_dds = true;
        }
    }
}

fn cmd_export(input: &Path, output: Option<PathBuf>, config: Option<&Path>, overrides: Overrides) -> Result<ExitCode> {
    let mut config = match config {
        Some(path) => ExportConfig::load(path)?,
        None => ExportConfig::default(),
    };
    overrides.apply(&mut config);

    tracing::info!("Loading scene: {}", input.display());
    let scene = Scene::from_json_file(input)?;

    // Relative asset paths in the snapshot are relative to the snapshot itself
    let base_dir = input.parent().map(Path::to_path_buf).unwrap_or_default();
    let exporter = Exporter::new(config).with_asset_locator(SnapshotAssetLocator::new(base_dir));
    let outcome = exporter.export(&scene)?;

    let output = output.unwrap_or_else(|| input.with_extension("spak"));
    let size = format::write_document(&output, &outcome.document, exporter.config().compression_level)?;
    println!("Wrote {} ({} bytes)", output.display(), size);

    let report = &outcome.report;
    if report.assets_written > 0 {
        println!("Assets written: {}", report.assets_written);
    }
    if report.textures_converted > 0 || report.conversion_failures > 0 {
        println!(
            "Textures converted: {} ({} failed)",
            report.textures_converted, report.conversion_failures
        );
    }
    if !report.skipped.is_empty() {
        println!("Skipped {} entities:", report.skipped.len());
        for skipped in &report.skipped {
            println!("  {}: {}", skipped.entity, skipped.reason);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_info(input: &Path) -> Result<ExitCode> {
    let header = format::read_header(input)?;
    let doc = format::read_document(input)?;

    println!("Document: {}", input.display());
    println!("Version: {}", header.version);
    println!("Compressed: {}", if header.is_compressed() { "yes" } else { "no" });
    println!("Body: {} bytes", header.body_len);
    println!();
    print_counts(&doc);
    Ok(ExitCode::SUCCESS)
}

fn print_counts(doc: &Document) {
    let vertices: usize = doc.meshes.iter().map(|m| m.vertex_count()).sum();
    let triangles: usize = doc.meshes.iter().map(|m| m.triangle_count()).sum();
    let keyframes: usize = doc
        .animations
        .iter()
        .flat_map(|a| a.clips.iter())
        .map(|c| c.len())
        .sum();
    let bones: usize = doc.skeletons.iter().map(|s| s.bones.len()).sum();

    println!("Entities:");
    println!("  Objects:      {}", doc.objects.len());
    println!("  Meshes:       {} ({} vertices, {} triangles)", doc.meshes.len(), vertices, triangles);
    println!("  Materials:    {}", doc.materials.len());
    println!("  Lights:       {}", doc.lights.len());
    println!("  Skeletons:    {} ({} bones)", doc.skeletons.len(), bones);
    println!("  Animations:   {} ({} keyframes)", doc.animations.len(), keyframes);
    println!("  Rigid bodies: {}", doc.rigid_bodies.len());
    println!("  Constraints:  {}", doc.constraints.len());
    println!("  Speakers:     {}", doc.speakers.len());
    println!("  Parameters:   {}", doc.custom_params.len());
    println!("  Force fields: {}", doc.force_fields.len());
    println!("  Collision planes: {}", doc.collision_planes.len());
    println!();
    println!("Relations: {}", doc.relations.len());
    println!("Total entities: {}", doc.entity_count());
}

fn cmd_dump(input: &Path) -> Result<ExitCode> {
    let doc = format::read_document(input)?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(ExitCode::SUCCESS)
}

fn cmd_check(input: &Path) -> Result<ExitCode> {
    let doc = format::read_document(input)?;
    let defects = doc.defects();
    if defects.is_empty() {
        println!("{}: OK ({} entities, {} relations)", input.display(), doc.entity_count(), doc.relations.len());
        return Ok(ExitCode::SUCCESS);
    }
    for defect in &defects {
        println!("  {}", defect);
    }
    println!("{}: {} defect(s)", input.display(), defects.len());
    Ok(ExitCode::FAILURE)
}
