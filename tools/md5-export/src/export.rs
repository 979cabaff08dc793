//! Export orchestration
//!
//! One export unit is an armature, the meshes it deforms, and at most one of
//! its actions. A unit is fully rendered to text before anything touches the
//! disk. Every file is first written to a temporary sibling and only renamed
//! into place once all of them are written, so a failed unit never leaves a
//! partial or mismatched pair behind.

use std::fs;
use std::path::{Path, PathBuf};

use md5_common::{
    DEFAULT_COMMANDLINE, MD5_ANIM_EXT, MD5_MESH_EXT, WriteOptions, md5anim_to_string,
    md5mesh_to_string,
};
use serde::Deserialize;

use crate::animation::sample_animation;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{ExportError, Result};
use crate::mesh::build_submeshes;
use crate::scene::{SceneAdapter, load_scene};
use crate::skeleton::build_skeleton;

/// Which files a unit produces
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExportMode {
    #[default]
    MeshAndAnim,
    MeshOnly,
    AnimOnly,
}

impl ExportMode {
    pub fn writes_mesh(self) -> bool {
        matches!(self, Self::MeshAndAnim | Self::MeshOnly)
    }

    pub fn writes_anim(self) -> bool {
        matches!(self, Self::MeshAndAnim | Self::AnimOnly)
    }
}

/// Accepted export scale range (inclusive)
pub const SCALE_RANGE: std::ops::RangeInclusive<f32> = 0.001..=1000.0;

/// What to export from a scene
#[derive(Clone, Debug)]
pub struct ExportSettings {
    /// Armature name, first armature when `None`
    pub armature: Option<String>,
    /// Mesh names, every mesh bound to the armature when empty
    pub meshes: Vec<String>,
    /// Action name, first action of the armature when `None`
    pub action: Option<String>,
    pub mode: ExportMode,
    pub scale: f32,
    pub commandline: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            armature: None,
            meshes: Vec::new(),
            action: None,
            mode: ExportMode::default(),
            scale: 1.0,
            commandline: DEFAULT_COMMANDLINE.to_string(),
        }
    }
}

/// Rendered file contents of one unit
#[derive(Debug, Default)]
pub struct RenderedUnit {
    pub mesh: Option<String>,
    pub anim: Option<String>,
    pub diagnostics: Diagnostics,
}

/// Outcome of a written unit
#[derive(Debug, Default)]
pub struct ExportReport {
    pub mesh_path: Option<PathBuf>,
    pub anim_path: Option<PathBuf>,
    pub diagnostics: Diagnostics,
}

/// Outcome of several units; failures never stop the remaining units
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<(String, ExportReport)>,
    pub failed: Vec<(String, ExportError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Build and render one unit without writing anything
pub fn render_unit<A: SceneAdapter + ?Sized>(scene: &A, settings: &ExportSettings) -> Result<RenderedUnit> {
    let mut diagnostics = scene.load_diagnostics();

    let armature = match &settings.armature {
        Some(name) => scene
            .find_armature(name)
            .ok_or_else(|| ExportError::UnknownArmature(name.clone()))?,
        None => *scene.armatures().first().ok_or(ExportError::NoArmature)?,
    };
    let armature_name = scene.armature_name(armature).to_string();
    let skeleton = build_skeleton(scene, armature, &mut diagnostics)?;

    let meshes = if settings.meshes.is_empty() {
        scene.meshes(armature)
    } else {
        settings
            .meshes
            .iter()
            .map(|name| {
                scene
                    .find_mesh(armature, name)
                    .ok_or_else(|| ExportError::UnknownMesh(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?
    };

    let action = match &settings.action {
        Some(name) => Some(
            scene
                .find_action(armature, name)
                .ok_or_else(|| ExportError::UnknownAction(name.clone()))?,
        ),
        None => scene.actions(armature).first().copied(),
    };

    let options = WriteOptions {
        commandline: &settings.commandline,
        scale: settings.scale,
    };

    let mesh = if settings.mode.writes_mesh() {
        if meshes.is_empty() {
            return Err(ExportError::NoMeshes(armature_name));
        }
        let mut submeshes = Vec::new();
        for &mesh in &meshes {
            submeshes.extend(build_submeshes(scene, &skeleton, mesh, &mut diagnostics)?);
        }
        Some(md5mesh_to_string(&options, skeleton.joints(), &submeshes))
    } else {
        None
    };

    let anim = match (settings.mode, action) {
        (mode, Some(action)) if mode.writes_anim() => {
            let track = sample_animation(scene, armature, action, &skeleton, &meshes, &mut diagnostics)?;
            Some(md5anim_to_string(&options, &track))
        }
        (ExportMode::AnimOnly, None) => return Err(ExportError::NoAction(armature_name)),
        (ExportMode::MeshAndAnim, None) => {
            diagnostics.warn(
                DiagnosticKind::NoAction,
                &armature_name,
                "armature has no action, skipping animation file",
            );
            None
        }
        _ => None,
    };

    Ok(RenderedUnit {
        mesh,
        anim,
        diagnostics,
    })
}

/// `<base>.<ext>`, keeping any dots already in the base name
pub fn output_path(base: &Path, ext: &str) -> PathBuf {
    let mut name = base.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(ext);
    base.with_file_name(name)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `contents` to a temporary sibling of `path`, returning the sibling
fn stage(path: &Path, contents: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let tmp = output_path(path, "tmp");
    if let Err(e) = fs::write(&tmp, contents) {
        let _ = fs::remove_file(&tmp);
        return Err(io_error(&tmp)(e));
    }
    Ok(tmp)
}

/// Write a rendered unit next to `base`
///
/// Every file is staged before any is renamed into place, so a failed write
/// leaves the previous outputs untouched.
pub fn write_unit(rendered: RenderedUnit, base: &Path) -> Result<ExportReport> {
    let outputs = [
        (MD5_MESH_EXT, rendered.mesh.as_ref()),
        (MD5_ANIM_EXT, rendered.anim.as_ref()),
    ];

    let mut staged: Vec<(&str, PathBuf, PathBuf)> = Vec::with_capacity(outputs.len());
    for (ext, text) in outputs {
        let Some(text) = text else {
            continue;
        };
        let path = output_path(base, ext);
        match stage(&path, text) {
            Ok(tmp) => staged.push((ext, tmp, path)),
            Err(e) => {
                for (_, tmp, _) in &staged {
                    let _ = fs::remove_file(tmp);
                }
                return Err(e);
            }
        }
    }

    let mut report = ExportReport::default();
    for (index, (ext, tmp, path)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(tmp, path) {
            for (_, tmp, _) in &staged[index..] {
                let _ = fs::remove_file(tmp);
            }
            return Err(io_error(path)(e));
        }
        tracing::info!("Wrote {:?}", path);
        if *ext == MD5_MESH_EXT {
            report.mesh_path = Some(path.clone());
        } else {
            report.anim_path = Some(path.clone());
        }
    }

    report.diagnostics = rendered.diagnostics;
    Ok(report)
}

/// Render and write one unit from an already loaded scene
pub fn export_scene<A: SceneAdapter + ?Sized>(
    scene: &A,
    settings: &ExportSettings,
    base: &Path,
) -> Result<ExportReport> {
    let rendered = render_unit(scene, settings)?;
    write_unit(rendered, base)
}

/// Load a scene file, then render and write one unit
pub fn export_file(
    scene_path: &Path,
    frame_rate: Option<u32>,
    settings: &ExportSettings,
    base: &Path,
) -> Result<ExportReport> {
    let scene = load_scene(scene_path, frame_rate).map_err(|source| ExportError::Scene {
        path: scene_path.to_path_buf(),
        source,
    })?;
    export_scene(scene.as_ref(), settings, base)
}
