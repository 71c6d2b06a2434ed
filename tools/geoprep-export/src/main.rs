//! geoprep-export - mesh preparation tool
//!
//! Welds, bounds and quantizes OBJ meshes into GPU-ready .gpmesh files

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use geoprep_common::plan_merge;
use geoprep_export::formats::EXTENSION;
use geoprep_export::{manifest, mesh, NormalEncoding, PrepSettings};

#[derive(Parser)]
#[command(name = "geoprep-export")]
#[command(about = "Mesh geometry preparation tool")]
#[command(version)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare a single OBJ mesh
    Mesh {
        /// Input OBJ file
        input: PathBuf,

        /// Output .gpmesh file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Build all meshes from a manifest file
    Build {
        /// Path to geoprep.toml manifest
        #[arg(default_value = "geoprep.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate manifest without building
    Check {
        /// Path to geoprep.toml manifest
        #[arg(default_value = "geoprep.toml")]
        manifest: PathBuf,
    },

    /// Print bounds and welding statistics of an OBJ mesh without writing anything
    Info {
        /// Input OBJ file
        input: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,
    },
}

#[derive(clap::Args)]
struct SettingsArgs {
    /// Welding distance (vertices strictly closer than this are merged)
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Weld vertices even when their normals differ
    #[arg(long)]
    ignore_normals: bool,

    /// Weld vertices even when their uv0 differs
    #[arg(long)]
    ignore_uvs: bool,

    /// Normal encoding: azimuthal_projection, sphere_mapping or none
    #[arg(long)]
    normal_encoding: Option<NormalEncoding>,

    /// Do not weld vertices
    #[arg(long)]
    no_merge: bool,
}

impl SettingsArgs {
    fn to_settings(&self) -> PrepSettings {
        let defaults = PrepSettings::default();
        PrepSettings {
            weld_threshold: self.threshold.unwrap_or(defaults.weld_threshold),
            match_normals: !self.ignore_normals,
            match_uvs: !self.ignore_uvs,
            normal_encoding: self.normal_encoding.unwrap_or(defaults.normal_encoding),
            skip_merge: self.no_merge,
            ..defaults
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match cli.command {
        Commands::Mesh {
            input,
            output,
            settings,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension(EXTENSION));
            tracing::info!("Converting {:?} -> {:?}", input, output);
            check_obj_extension(&input)?;
            mesh::convert_obj(&input, &output, &settings.to_settings())?;
            tracing::info!("Done!");
        }

        Commands::Build { manifest, output } => {
            tracing::info!("Building meshes from {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            manifest::build_all(&config, output.as_deref())?;
            tracing::info!("Build complete!");
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            config.validate()?;
            for entry in &config.meshes {
                let path = config.base_dir.join(&entry.path);
                if !path.exists() {
                    anyhow::bail!("Mesh '{}' not found: {:?}", entry.id, path);
                }
            }
            tracing::info!("Manifest is valid!");
        }

        Commands::Info { input, settings } => {
            check_obj_extension(&input)?;
            print_info(&input, &settings.to_settings())?;
        }
    }

    Ok(())
}

fn check_obj_extension(input: &Path) -> Result<()> {
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    if ext != "obj" {
        anyhow::bail!("Unsupported mesh format: {:?} (use .obj)", input);
    }
    Ok(())
}

fn print_info(input: &Path, settings: &PrepSettings) -> Result<()> {
    settings.validate()?;
    let mesh = mesh::load_obj(input)?;
    let aabb = geoprep_common::compute_aabb(&mesh)?;
    let sphere = geoprep_common::compute_bounding_sphere(&mesh)?;

    println!("Mesh '{}' ({:?})", mesh.name, input);
    if let Some(material) = &mesh.material {
        println!("  Material: {}", material);
    }
    println!(
        "  Vertices: {} (stride {} bytes), indices: {}",
        mesh.vertex_count(),
        mesh.vertex_stride(),
        mesh.index_count()
    );
    println!("  AABB: {:?} .. {:?}", aabb.min.to_array(), aabb.max.to_array());
    println!("  Sphere: center {:?}, radius {}", sphere.center.to_array(), sphere.radius);

    let plan = plan_merge(&mesh, settings.weld_threshold, settings.merge_flags())?;
    println!(
        "  Welding at {}: {} -> {} vertices ({} removed, {} grid insertions, {} candidate pairs)",
        settings.weld_threshold,
        plan.stats.vertices_before,
        plan.stats.vertices_after,
        plan.stats.removed(),
        plan.stats.grid_insertions,
        plan.stats.candidate_pairs
    );
    Ok(())
}
