//! md5-export - skeletal mesh and animation exporter
//!
//! Converts skinned scenes (JSON scene documents, glTF, GLB) to idTech 4
//! .md5mesh / .md5anim text files

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use md5_export::export::SCALE_RANGE;
use md5_export::manifest::MANIFEST_FILE;
use md5_export::scene::list_scene;
use md5_export::{ExportManifest, ExportMode, ExportSettings, build_all, export_file};

#[derive(Parser)]
#[command(name = "md5-export")]
#[command(about = "MD5 skeletal mesh and animation exporter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every unit of a manifest file
    Build {
        /// Path to md5export.toml manifest
        #[arg(default_value = MANIFEST_FILE)]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate manifest without exporting
    Check {
        /// Path to md5export.toml manifest
        #[arg(default_value = MANIFEST_FILE)]
        manifest: PathBuf,
    },

    /// Export a single scene
    Export {
        /// Input scene file (JSON/glTF/GLB)
        scene: PathBuf,

        /// Output base path, extensions are appended (default: scene path without extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Armature name (default: first armature)
        #[arg(long)]
        armature: Option<String>,

        /// Mesh name, repeatable (default: every mesh bound to the armature)
        #[arg(long = "mesh")]
        meshes: Vec<String>,

        /// Action name (default: first action of the armature)
        #[arg(long)]
        action: Option<String>,

        /// Uniform scale for positions
        #[arg(long, default_value_t = 1.0)]
        scale: f32,

        /// Which files to write
        #[arg(long, value_enum, default_value_t = ExportMode::MeshAndAnim)]
        mode: ExportMode,

        /// Frame rate for sampling glTF animations (default: 24)
        #[arg(short, long)]
        frame_rate: Option<u32>,

        /// Value of the commandline header line
        #[arg(long, default_value = md5_common::DEFAULT_COMMANDLINE)]
        commandline: String,
    },

    /// List armatures, meshes and actions in a scene
    List {
        /// Input scene file (JSON/glTF/GLB)
        scene: PathBuf,

        /// Frame rate for sampling glTF animations (default: 24)
        #[arg(short, long)]
        frame_rate: Option<u32>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            manifest,
            output,
            verbose,
        } => {
            if verbose {
                tracing::info!("Building exports from {:?}", manifest);
            }
            let config = ExportManifest::load(&manifest)?;
            config.validate()?;
            let manifest_dir = manifest.parent().unwrap_or(Path::new("."));
            let report = build_all(&config, manifest_dir, output.as_deref());

            if verbose {
                for (name, unit) in &report.succeeded {
                    for diagnostic in unit.diagnostics.entries() {
                        tracing::info!("  {}: [{}] {}", name, diagnostic.kind, diagnostic.message);
                    }
                }
            }
            if !report.is_success() {
                anyhow::bail!(
                    "{} of {} exports failed",
                    report.failed.len(),
                    report.failed.len() + report.succeeded.len()
                );
            }
            tracing::info!("Build complete!");
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            let config = ExportManifest::load(&manifest)?;
            config.validate()?;
            tracing::info!("Manifest is valid!");
        }

        Commands::Export {
            scene,
            output,
            armature,
            meshes,
            action,
            scale,
            mode,
            frame_rate,
            commandline,
        } => {
            if !SCALE_RANGE.contains(&scale) {
                anyhow::bail!("Invalid scale {} (must be 0.001-1000)", scale);
            }
            let base = output.unwrap_or_else(|| scene.with_extension(""));
            let settings = ExportSettings {
                armature,
                meshes,
                action,
                mode,
                scale,
                commandline,
            };
            tracing::info!("Exporting {:?} -> {:?}", scene, base);
            let report = export_file(&scene, frame_rate, &settings, &base)
                .with_context(|| format!("Export of {:?} failed", scene))?;
            if !report.diagnostics.is_empty() {
                tracing::info!("{} warning(s)", report.diagnostics.len());
            }
            tracing::info!("Done!");
        }

        Commands::List { scene, frame_rate } => {
            list_scene(&scene, frame_rate)?;
        }
    }

    Ok(())
}
