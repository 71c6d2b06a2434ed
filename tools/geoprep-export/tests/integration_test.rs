//! Integration tests for geoprep-export
//!
//! Tests the full pipeline: write OBJ -> prepare -> verify .gpmesh output

use std::path::Path;
use std::process::{Command, Output};

use geoprep_export::formats::{expected_file_size, read_channel_records, read_prepared_header};
use geoprep_export::{convert_obj_to_memory, PrepSettings};
use tempfile::tempdir;

/// Cube with per-face normals: 6 quads -> 36 triangle corners, 24 unique (position, normal)
const CUBE_OBJ: &str = "\
o Cube
v -1 -1 -1
v  1 -1 -1
v  1  1 -1
v -1  1 -1
v -1 -1  1
v  1 -1  1
v  1  1  1
v -1  1  1
vn  0  0 -1
vn  0  0  1
vn  0 -1  0
vn  0  1  0
vn -1  0  0
vn  1  0  0
usemtl metal
f 1//1 4//1 3//1 2//1
f 5//2 6//2 7//2 8//2
f 1//3 2//3 6//3 5//3
f 4//4 8//4 7//4 3//4
f 1//5 5//5 8//5 4//5
f 2//6 3//6 7//6 6//6
";

fn write_cube(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, CUBE_OBJ).expect("Failed to write OBJ");
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_geoprep-export"))
        .args(args)
        .output()
        .expect("Failed to run geoprep-export")
}

/// Verify a .gpmesh file and return (vertex_count, index_count)
fn verify_prepared_mesh(path: &Path) -> (u32, u32) {
    let data = std::fs::read(path).expect("Failed to read prepared mesh");
    let header = read_prepared_header(&data).expect("Failed to parse header");
    let records = read_channel_records(&data, &header).expect("Failed to parse channel records");

    assert_eq!(
        data.len(),
        expected_file_size(&header, &records),
        "File size does not match header and channel records"
    );
    assert_eq!(header.aabb_min, [-1.0, -1.0, -1.0]);
    assert_eq!(header.aabb_max, [1.0, 1.0, 1.0]);
    (header.vertex_count, header.index_count)
}

#[test]
fn test_library_welds_cube_corners() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_cube(dir.path(), "cube.obj");

    let prepared = convert_obj_to_memory(&obj_path, &PrepSettings::default()).unwrap();
    assert_eq!(prepared.name, "Cube");
    assert_eq!(prepared.material.as_deref(), Some("metal"));
    assert_eq!(prepared.vertex_count, 24);
    assert_eq!(prepared.indices.len(), 36);

    let merge = prepared.merge.unwrap();
    assert_eq!(merge.vertices_before, 36);
    assert_eq!(merge.removed(), 12);

    assert_eq!(prepared.sphere.center.to_array(), [0.0, 0.0, 0.0]);
    assert!((prepared.sphere.radius - 3.0f32.sqrt()).abs() < 1e-6);
}

#[test]
fn test_mesh_command() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_cube(dir.path(), "cube.obj");
    let mesh_path = dir.path().join("cube.gpmesh");

    let output = run(&["mesh", obj_path.to_str().unwrap(), "-o", mesh_path.to_str().unwrap()]);
    assert!(output.status.success(), "mesh command failed: {output:?}");

    assert_eq!(verify_prepared_mesh(&mesh_path), (24, 36));

    let data = std::fs::read(&mesh_path).unwrap();
    let header = read_prepared_header(&data).unwrap();
    assert_eq!(header.channel_count, 2);
}

#[test]
fn test_mesh_command_ignoring_normals() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_cube(dir.path(), "cube.obj");

    let output = run(&["mesh", obj_path.to_str().unwrap(), "--ignore-normals"]);
    assert!(output.status.success(), "mesh command failed: {output:?}");

    // Default output path: input with the .gpmesh extension
    assert_eq!(verify_prepared_mesh(&dir.path().join("cube.gpmesh")), (8, 36));
}

#[test]
fn test_mesh_command_rejects_other_formats() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("cube.fbx");
    std::fs::write(&path, CUBE_OBJ).unwrap();

    let output = run(&["mesh", path.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn test_build_from_manifest() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::create_dir(dir.path().join("models")).unwrap();
    write_cube(&dir.path().join("models"), "a.obj");
    write_cube(&dir.path().join("models"), "b.obj");

    let manifest_path = dir.path().join("geoprep.toml");
    std::fs::write(
        &manifest_path,
        r#"
[output]
dir = "out"

[[meshes]]
id = "smooth"
path = "models/a.obj"
match_normals = false

[[meshes]]
id = "faceted"
path = "models/b.obj"
normal_encoding = "sphere_mapping"
"#,
    )
    .unwrap();

    let check = run(&["check", manifest_path.to_str().unwrap()]);
    assert!(check.status.success(), "check failed: {check:?}");

    let output = run(&["build", manifest_path.to_str().unwrap()]);
    assert!(output.status.success(), "build failed: {output:?}");

    let out_dir = dir.path().join("out");
    assert_eq!(verify_prepared_mesh(&out_dir.join("smooth.gpmesh")), (8, 36));
    assert_eq!(verify_prepared_mesh(&out_dir.join("faceted.gpmesh")), (24, 36));
}

#[test]
fn test_check_rejects_invalid_manifest() {
    let dir = tempdir().expect("Failed to create temp dir");
    write_cube(dir.path(), "cube.obj");
    let manifest_path = dir.path().join("geoprep.toml");
    std::fs::write(
        &manifest_path,
        r#"
[defaults]
weld_threshold = -1.0

[[meshes]]
id = "cube"
path = "cube.obj"
"#,
    )
    .unwrap();

    let output = run(&["check", manifest_path.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn test_info_reports_welding() {
    let dir = tempdir().expect("Failed to create temp dir");
    let obj_path = write_cube(dir.path(), "cube.obj");

    let output = run(&["info", obj_path.to_str().unwrap()]);
    assert!(output.status.success(), "info failed: {output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Mesh 'Cube'"), "{stdout}");
    assert!(stdout.contains("36 -> 24 vertices"), "{stdout}");
    assert!(!dir.path().join("cube.gpmesh").exists());
}
