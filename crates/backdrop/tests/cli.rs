use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn backdrop(config_dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_backdrop"));
    command
        .env("BACKDROP_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "warn");
    command
}

#[test]
fn presets_lists_every_preset() {
    let root = TempDir::new().unwrap();
    let output = backdrop(root.path())
        .arg("presets")
        .output()
        .expect("failed to run backdrop presets");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("blueprint    intensity=0.60 speed=0.80"));
    assert!(stdout.contains("active       intensity=1.20 speed=1.50"));
    assert!(stdout.contains("maintenance  intensity=0.40 speed=0.50"));
    assert!(stdout.contains("emergency    intensity=1.80 speed=2.50"));
}

#[test]
fn check_accepts_the_bundled_program() {
    let root = TempDir::new().unwrap();
    let output = backdrop(root.path())
        .arg("check")
        .output()
        .expect("failed to run backdrop check");

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tier: full"));
    assert!(stdout.contains("a_position"));
    assert!(stdout.contains("u_speed"));
    assert!(!stdout.contains("unused"));
}

#[test]
fn check_honours_the_requested_tier() {
    let root = TempDir::new().unwrap();
    let output = backdrop(root.path())
        .args(["check", "--tier", "reduced"])
        .output()
        .expect("failed to run backdrop check");

    assert!(output.status.success(), "{output:?}");
    assert!(String::from_utf8_lossy(&output.stdout).contains("tier: reduced"));
}

#[test]
fn check_reports_compile_errors() {
    let root = TempDir::new().unwrap();
    let shader = root.path().join("broken.frag");
    fs::write(
        &shader,
        "#version 450\nlayout(location = 0) out vec4 outColor;\nvoid main() { outColor = ; }\n",
    )
    .unwrap();

    let output = backdrop(root.path())
        .arg("check")
        .arg("--fragment")
        .arg(&shader)
        .output()
        .expect("failed to run backdrop check");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("fragment shader failed to compile"), "{stderr}");
}

#[test]
fn check_reports_unused_bindings_for_custom_programs() {
    let root = TempDir::new().unwrap();
    let shader = root.path().join("flat.frag");
    fs::write(
        &shader,
        "#version 450\n\
         layout(set = 0, binding = 0) uniform Params { float u_time; };\n\
         layout(location = 0) out vec4 outColor;\n\
         void main() { outColor = vec4(vec3(fract(u_time)), 1.0); }\n",
    )
    .unwrap();

    let output = backdrop(root.path())
        .arg("check")
        .arg("--fragment")
        .arg(&shader)
        .output()
        .expect("failed to run backdrop check");

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("u_time"));
    assert!(stdout.contains("offset 0"));
    assert!(stdout.contains("unused"));
}

#[test]
fn check_fails_for_missing_shader_file() {
    let root = TempDir::new().unwrap();
    let output = backdrop(root.path())
        .args(["check", "--fragment"])
        .arg(root.path().join("absent.frag"))
        .output()
        .expect("failed to run backdrop check");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.frag"));
}
