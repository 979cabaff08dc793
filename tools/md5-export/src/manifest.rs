//! md5export.toml manifest parsing
//!
//! A manifest lists export units that share an output directory:
//!
//! ```toml
//! [output]
//! dir = "build/models"
//! commandline = "exported by md5-export"
//!
//! [[export]]
//! name = "hero"
//! scene = "scenes/hero.glb"
//! action = "walk"
//! scale = 39.37
//! ```
//!
//! Relative paths resolve against the manifest's directory.

use anyhow::{Context, Result, bail};
use hashbrown::HashSet;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::export::{BatchReport, ExportMode, ExportSettings, SCALE_RANGE, export_file};

/// Default manifest file name
pub const MANIFEST_FILE: &str = "md5export.toml";

/// md5export.toml manifest structure
#[derive(Debug, Deserialize)]
pub struct ExportManifest {
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default, rename = "export")]
    pub exports: Vec<ExportEntry>,
}

/// Output configuration section
#[derive(Debug, Deserialize)]
pub struct OutputSection {
    /// Directory receiving `<name>.md5mesh` / `<name>.md5anim`.
    /// Default: "."
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Value of the `commandline` header line.
    /// Default: "md5-export"
    #[serde(default = "default_commandline")]
    pub commandline: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            commandline: default_commandline(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_commandline() -> String {
    md5_common::DEFAULT_COMMANDLINE.to_string()
}

fn default_scale() -> f32 {
    1.0
}

/// Single export unit
#[derive(Debug, Deserialize)]
pub struct ExportEntry {
    /// Output base name
    pub name: String,
    /// Scene file (.json, .gltf, .glb)
    pub scene: PathBuf,

    /// Armature to export. If not specified, uses the first armature.
    #[serde(default)]
    pub armature: Option<String>,

    /// Meshes to include. If empty, every mesh bound to the armature.
    #[serde(default)]
    pub meshes: Vec<String>,

    /// Action to sample. If not specified, uses the armature's first action.
    #[serde(default)]
    pub action: Option<String>,

    #[serde(default)]
    pub mode: ExportMode,

    /// Uniform scale for positions (0.001 - 1000).
    /// Default: 1.0
    #[serde(default = "default_scale")]
    pub scale: f32,

    /// Sampling rate for glTF animations.
    /// Default: 24
    #[serde(default)]
    pub frame_rate: Option<u32>,
}

impl ExportEntry {
    /// Settings for this unit, inheriting the output section
    pub fn settings(&self, output: &OutputSection) -> ExportSettings {
        ExportSettings {
            armature: self.armature.clone(),
            meshes: self.meshes.clone(),
            action: self.action.clone(),
            mode: self.mode,
            scale: self.scale,
            commandline: output.commandline.clone(),
        }
    }
}

impl ExportManifest {
    /// Load manifest from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse manifest from string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse md5export.toml")
    }

    /// Validate manifest fields
    pub fn validate(&self) -> Result<()> {
        if self.exports.is_empty() {
            bail!("No [[export]] entries in md5export.toml");
        }

        let mut names = HashSet::new();
        for entry in &self.exports {
            if entry.name.trim().is_empty() {
                bail!("Export entry with scene {:?} has an empty name", entry.scene);
            }
            if entry.name.contains(['/', '\\']) {
                bail!("Export name '{}' must not contain path separators", entry.name);
            }
            if !names.insert(entry.name.as_str()) {
                bail!("Duplicate export name '{}' in md5export.toml", entry.name);
            }
            if entry.scene.as_os_str().is_empty() {
                bail!("Export '{}' has no scene path", entry.name);
            }
            if !SCALE_RANGE.contains(&entry.scale) {
                bail!(
                    "Invalid scale {} for export '{}' (must be {}-{})",
                    entry.scale,
                    entry.name,
                    SCALE_RANGE.start(),
                    SCALE_RANGE.end()
                );
            }
            if entry.frame_rate == Some(0) {
                bail!("Invalid frame_rate 0 for export '{}'", entry.name);
            }
        }

        Ok(())
    }
}

/// Export every unit of a manifest
///
/// `manifest_dir` anchors relative paths; `output_override` replaces
/// `[output] dir`. A failed unit is logged and the rest still run.
pub fn build_all(
    manifest: &ExportManifest,
    manifest_dir: &Path,
    output_override: Option<&Path>,
) -> BatchReport {
    let output_dir = match output_override {
        Some(dir) => dir.to_path_buf(),
        None => manifest_dir.join(&manifest.output.dir),
    };

    let mut report = BatchReport::default();
    for entry in &manifest.exports {
        let scene = manifest_dir.join(&entry.scene);
        let base = output_dir.join(&entry.name);
        tracing::info!("Exporting '{}' from {:?}", entry.name, scene);

        match export_file(&scene, entry.frame_rate, &entry.settings(&manifest.output), &base) {
            Ok(unit) => {
                if !unit.diagnostics.is_empty() {
                    tracing::info!("'{}': {} warning(s)", entry.name, unit.diagnostics.len());
                }
                report.succeeded.push((entry.name.clone(), unit));
            }
            Err(e) => {
                tracing::error!("Export '{}' failed: {}", entry.name, e.chain());
                report.failed.push((entry.name.clone(), e));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_minimal() {
        let manifest = ExportManifest::parse(
            r#"
[[export]]
name = "hero"
scene = "hero.glb"
"#,
        )
        .unwrap();

        assert_eq!(manifest.output.dir, PathBuf::from("."));
        assert_eq!(manifest.output.commandline, "md5-export");
        assert_eq!(manifest.exports.len(), 1);

        let entry = &manifest.exports[0];
        assert_eq!(entry.mode, ExportMode::MeshAndAnim);
        assert_eq!(entry.scale, 1.0);
        assert!(entry.armature.is_none());
        assert!(entry.meshes.is_empty());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_manifest_full_entry() {
        let manifest = ExportManifest::parse(
            r#"
[output]
dir = "build/models"
commandline = "exported by pipeline"

[[export]]
name = "hero_walk"
scene = "scenes/hero.json"
armature = "HeroRig"
meshes = ["Body", "Helmet"]
action = "walk"
mode = "anim-only"
scale = 39.37
frame_rate = 30
"#,
        )
        .unwrap();

        let entry = &manifest.exports[0];
        assert_eq!(entry.mode, ExportMode::AnimOnly);
        assert_eq!(entry.frame_rate, Some(30));
        assert_eq!(entry.meshes, vec!["Body", "Helmet"]);

        let settings = entry.settings(&manifest.output);
        assert_eq!(settings.commandline, "exported by pipeline");
        assert_eq!(settings.action.as_deref(), Some("walk"));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result = ExportManifest::parse(
            r#"
[[export]]
name = "hero"
scene = "hero.glb"
mode = "everything"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let manifest = ExportManifest::parse(
            r#"
[[export]]
name = "hero"
scene = "a.glb"

[[export]]
name = "hero"
scene = "b.glb"
"#,
        )
        .unwrap();
        let err = manifest.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate export name"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        for (field, value) in [("scale", "0.0"), ("scale", "5000.0"), ("frame_rate", "0")] {
            let manifest = ExportManifest::parse(&format!(
                "[[export]]\nname = \"hero\"\nscene = \"a.glb\"\n{} = {}\n",
                field, value
            ))
            .unwrap();
            assert!(manifest.validate().is_err(), "{} = {} should fail", field, value);
        }

        let manifest = ExportManifest::parse("[[export]]\nname = \"\"\nscene = \"a.glb\"\n").unwrap();
        assert!(manifest.validate().is_err());

        let empty = ExportManifest::parse("").unwrap();
        assert!(empty.validate().is_err());
    }
}
