//! geoprep.toml manifest parsing and manifest-driven builds
//!
//! ```toml
//! [output]
//! dir = "prepared"
//!
//! [defaults]
//! weld_threshold = 0.0001
//! normal_encoding = "azimuthal_projection"
//!
//! [[meshes]]
//! id = "crate"
//! path = "models/crate.obj"
//! match_uvs = false
//! ```

use anyhow::{Context, Result};
use geoprep_common::AttributeCompression;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::formats::EXTENSION;
use crate::mesh::convert_obj;
use crate::pipeline::{NormalEncoding, PrepSettings, PreparedMesh};

/// geoprep.toml manifest structure
#[derive(Debug, Deserialize)]
pub struct GeoprepManifest {
    #[serde(default)]
    pub output: OutputSection,
    /// Settings applied to every mesh unless overridden
    #[serde(default)]
    pub defaults: PrepSettings,
    #[serde(default)]
    pub meshes: Vec<MeshEntry>,

    /// Directory relative paths are resolved against (the manifest's directory)
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Output configuration section
#[derive(Debug, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("prepared")
}

/// Single mesh entry
#[derive(Debug, Deserialize)]
pub struct MeshEntry {
    pub id: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub overrides: SettingsOverride,
}

/// Per-mesh overrides of [`PrepSettings`]
#[derive(Debug, Default, Deserialize)]
pub struct SettingsOverride {
    pub weld_threshold: Option<f32>,
    pub match_normals: Option<bool>,
    pub match_uvs: Option<bool>,
    pub normal_encoding: Option<NormalEncoding>,
    pub position_compression: Option<AttributeCompression>,
    pub normal_compression: Option<AttributeCompression>,
    pub uv_compression: Option<AttributeCompression>,
    pub color_compression: Option<AttributeCompression>,
    pub skip_merge: Option<bool>,
}

impl SettingsOverride {
    /// `defaults` with every field this override sets replaced
    pub fn apply(&self, defaults: &PrepSettings) -> PrepSettings {
        PrepSettings {
            weld_threshold: self.weld_threshold.unwrap_or(defaults.weld_threshold),
            match_normals: self.match_normals.unwrap_or(defaults.match_normals),
            match_uvs: self.match_uvs.unwrap_or(defaults.match_uvs),
            normal_encoding: self.normal_encoding.unwrap_or(defaults.normal_encoding),
            position_compression: self
                .position_compression
                .unwrap_or(defaults.position_compression),
            normal_compression: self.normal_compression.or(defaults.normal_compression),
            uv_compression: self.uv_compression.unwrap_or(defaults.uv_compression),
            color_compression: self.color_compression.unwrap_or(defaults.color_compression),
            skip_merge: self.skip_merge.unwrap_or(defaults.skip_merge),
        }
    }
}

/// Outcome of preparing one manifest entry
#[derive(Debug)]
pub struct BuildReport {
    pub id: String,
    pub output: PathBuf,
    pub mesh: PreparedMesh,
}

/// Load manifest from file
pub fn load_manifest(path: &Path) -> Result<GeoprepManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    let mut manifest = GeoprepManifest::parse(&content)
        .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;
    manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(manifest)
}

impl GeoprepManifest {
    /// Parse manifest from string (paths resolve against the current directory)
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse geoprep.toml")
    }

    /// Effective settings of one entry
    pub fn settings_for(&self, entry: &MeshEntry) -> PrepSettings {
        entry.overrides.apply(&self.defaults)
    }

    /// Validate manifest fields
    pub fn validate(&self) -> Result<()> {
        self.defaults
            .validate()
            .context("Invalid [defaults] in geoprep.toml")?;

        let mut ids = HashSet::new();
        for entry in &self.meshes {
            if entry.id.is_empty() {
                anyhow::bail!("Mesh entry with path {:?} has an empty id", entry.path);
            }
            if !ids.insert(entry.id.as_str()) {
                anyhow::bail!("Duplicate mesh id '{}' in geoprep.toml", entry.id);
            }
            if entry.path.as_os_str().is_empty() {
                anyhow::bail!("Mesh '{}' has an empty path", entry.id);
            }
            self.settings_for(entry)
                .validate()
                .with_context(|| format!("Invalid settings for mesh '{}'", entry.id))?;
        }

        if self.meshes.is_empty() {
            tracing::warn!("geoprep.toml declares no meshes");
        }
        Ok(())
    }

    /// Output directory, with an optional command-line override
    pub fn output_dir(&self, output_override: Option<&Path>) -> PathBuf {
        match output_override {
            Some(dir) => dir.to_path_buf(),
            None => self.base_dir.join(&self.output.dir),
        }
    }
}

/// Prepare every mesh of the manifest (in parallel)
pub fn build_all(
    manifest: &GeoprepManifest,
    output_override: Option<&Path>,
) -> Result<Vec<BuildReport>> {
    use rayon::prelude::*;

    manifest.validate()?;
    let output_dir = manifest.output_dir(output_override);

    let reports: Result<Vec<_>> = manifest
        .meshes
        .par_iter()
        .map(|entry| {
            let input = manifest.base_dir.join(&entry.path);
            let output = output_dir.join(format!("{}.{EXTENSION}", entry.id));
            let mesh = convert_obj(&input, &output, &manifest.settings_for(entry))
                .with_context(|| format!("Failed to build mesh '{}'", entry.id))?;
            Ok(BuildReport {
                id: entry.id.clone(),
                output,
                mesh,
            })
        })
        .collect();
    let reports = reports?;

    tracing::info!("Built {} mesh(es) into {:?}", reports.len(), output_dir);
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_minimal() {
        let manifest = GeoprepManifest::parse("").unwrap();
        assert_eq!(manifest.output.dir, PathBuf::from("prepared"));
        assert_eq!(manifest.defaults, PrepSettings::default());
        assert!(manifest.meshes.is_empty());
        manifest.validate().unwrap();
    }

    #[test]
    fn test_manifest_with_overrides() {
        let manifest = GeoprepManifest::parse(
            r#"
[output]
dir = "out/meshes"

[defaults]
weld_threshold = 0.01
normal_encoding = "sphere_mapping"
position_compression = "u_float_to_u8_norm_with_scale_and_bias"

[[meshes]]
id = "crate"
path = "models/crate.obj"

[[meshes]]
id = "rock"
path = "models/rock.obj"
match_uvs = false
normal_encoding = "none"
normal_compression = "s_float_norm_to_u8_norm"
"#,
        )
        .unwrap();
        manifest.validate().unwrap();

        assert_eq!(manifest.output.dir, PathBuf::from("out/meshes"));
        let crate_settings = manifest.settings_for(&manifest.meshes[0]);
        assert_eq!(crate_settings.weld_threshold, 0.01);
        assert_eq!(crate_settings.normal_encoding, NormalEncoding::SphereMapping);
        assert_eq!(
            crate_settings.position_compression,
            AttributeCompression::UFloatToU8NormWithScaleAndBias
        );
        assert!(crate_settings.match_uvs);

        let rock = manifest.settings_for(&manifest.meshes[1]);
        assert!(!rock.match_uvs);
        assert_eq!(rock.normal_encoding, NormalEncoding::None);
        assert_eq!(rock.normal_compression, Some(AttributeCompression::SFloatNormToU8Norm));
        assert_eq!(rock.weld_threshold, 0.01);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let manifest = GeoprepManifest::parse(
            r#"
[[meshes]]
id = "a"
path = "a.obj"

[[meshes]]
id = "a"
path = "b.obj"
"#,
        )
        .unwrap();
        let err = manifest.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate mesh id 'a'"));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let manifest = GeoprepManifest::parse(
            r#"
[[meshes]]
id = "a"
path = "a.obj"
weld_threshold = -0.5
"#,
        )
        .unwrap();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_unknown_compression_rejected() {
        let result = GeoprepManifest::parse(
            r#"
[defaults]
uv_compression = "bc7"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_output_dir_override() {
        let mut manifest = GeoprepManifest::parse("").unwrap();
        manifest.base_dir = PathBuf::from("project");
        assert_eq!(manifest.output_dir(None), PathBuf::from("project/prepared"));
        assert_eq!(
            manifest.output_dir(Some(Path::new("elsewhere"))),
            PathBuf::from("elsewhere")
        );
    }
}
