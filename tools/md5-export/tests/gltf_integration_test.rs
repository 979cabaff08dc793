//! Integration tests for the glTF/GLB scene adapter.
//!
//! Tests the complete flow:
//! 1. Generate GLB programmatically
//! 2. Load it as a scene and export through md5-export
//! 3. Validate the emitted text


use tempfile::tempdir;

use md5_export::{DiagnosticKind, ExportSettings, SceneAdapter, export_file, load_scene, render_unit};

fn write_glb(dir: &std::path::Path) -> std::path::PathBuf {
    let glb_path = dir.join("rig.glb");
    std::fs::write(&glb_path, gltf_generator::generate_skinned_glb()).expect("Failed to write GLB");
    glb_path
}

#[test]
fn test_glb_scene_structure() {
    let dir = tempdir().expect("Failed to create temp dir");
    let scene = load_scene(&write_glb(dir.path()), None).expect("Failed to load GLB");

    let armatures = scene.armatures();
    assert_eq!(armatures.len(), 1);
    assert_eq!(scene.armature_name(armatures[0]), "Rig");
    assert_eq!(scene.list_bones(armatures[0]).len(), gltf_generator::BONE_COUNT);

    let meshes = scene.meshes(armatures[0]);
    assert_eq!(meshes.len(), 1);
    assert_eq!(scene.mesh_name(meshes[0]), "Body");
    assert_eq!(scene.mesh_materials(meshes[0]), vec!["cloth".to_string()]);
    assert_eq!(scene.mesh_polygons(meshes[0]).len(), 2);
    assert_eq!(scene.vertex_groups(meshes[0], 2), vec![("tip".to_string(), 1.0)]);

    let actions = scene.actions(armatures[0]);
    assert_eq!(actions.len(), 1);
    assert_eq!(scene.action_name(actions[0]), "Bend");
    // 1 second at the default 24 fps
    assert_eq!(scene.animation_frame_range(actions[0]), (0, 24));
}

#[test]
fn test_glb_frame_rate_override() {
    let dir = tempdir().expect("Failed to create temp dir");
    let scene = load_scene(&write_glb(dir.path()), Some(30)).expect("Failed to load GLB");
    let armature = scene.armatures()[0];
    let action = scene.actions(armature)[0];
    assert_eq!(scene.frame_rate(), 30);
    assert_eq!(scene.animation_frame_range(action), (0, 30));
}

#[test]
fn test_glb_mesh_export() {
    let dir = tempdir().expect("Failed to create temp dir");
    let scene = load_scene(&write_glb(dir.path()), None).expect("Failed to load GLB");
    let rendered = render_unit(scene.as_ref(), &ExportSettings::default()).expect("Export failed");
    let mesh = rendered.mesh.expect("mesh text");

    assert!(mesh.contains("numJoints 2\nnumMeshes 1\n"));
    assert!(mesh.contains("\t\"root\" -1 ( 0.000000 0.000000 0.000000 )"));
    assert!(mesh.contains("\t\"tip\" 0 ( 0.000000 1.000000 0.000000 )"));
    assert!(mesh.contains("\tshader \"cloth\"\n"));
    assert!(mesh.contains("\tnumverts 4\n"));
    assert!(mesh.contains("\ttri 0 0 2 1\n\ttri 1 0 3 2\n"));
    // Top-right vertex in the tip's bind space
    assert!(mesh.contains("\tweight 2 1 1.000000 ( 0.500000 0.000000 0.000000 )\n"));
}

#[test]
fn test_glb_animation_export() {
    let dir = tempdir().expect("Failed to create temp dir");
    let scene = load_scene(&write_glb(dir.path()), None).expect("Failed to load GLB");
    let rendered = render_unit(scene.as_ref(), &ExportSettings::default()).expect("Export failed");
    let anim = rendered.anim.expect("anim text");

    assert!(anim.contains("numFrames 25\nnumJoints 2\nframeRate 24\nnumAnimatedComponents 12\n"));
    let halfway = anim.split("frame 12 {\n").nth(1).unwrap();
    assert!(halfway.lines().nth(1).unwrap().starts_with("\t0.000000 1.500000 0.000000"));
    let last = anim.split("frame 24 {\n").nth(1).unwrap();
    assert!(last.lines().nth(1).unwrap().starts_with("\t0.000000 2.000000 0.000000"));
    // Top edge follows the tip up to y=2
    assert!(anim.contains("( 0.500000 2.000000 0.000000 )\n"));
}

#[test]
fn test_glb_export_to_disk() {
    let dir = tempdir().expect("Failed to create temp dir");
    let glb_path = write_glb(dir.path());
    let base = dir.path().join("out").join("rig");

    let report = export_file(&glb_path, None, &ExportSettings::default(), &base).expect("Export failed");
    assert!(report.mesh_path.unwrap().exists());
    assert!(report.anim_path.unwrap().exists());
}

#[test]
fn test_glb_skipped_primitive_reported() {
    let dir = tempdir().expect("Failed to create temp dir");
    let glb_path = dir.path().join("points.glb");
    std::fs::write(&glb_path, gltf_generator::generate_skinned_glb_with_points())
        .expect("Failed to write GLB");

    let scene = load_scene(&glb_path, None).expect("Failed to load GLB");
    let rendered = render_unit(scene.as_ref(), &ExportSettings::default()).expect("Export failed");

    assert_eq!(rendered.diagnostics.count(DiagnosticKind::UnsupportedPrimitive), 1);
    assert_eq!(rendered.diagnostics.entries()[0].context, "Body");
    // Triangles of the first primitive are still exported
    assert!(rendered.mesh.expect("mesh text").contains("\tnumtris 2\n"));
}
