//! ---
//! hmon_section: "15-testing-qa-runbook"
//! hmon_subsection: "integration-tests"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Integration and validation tests for the HMON stack."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

fn repo_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..")
}

fn rust_sources(dir: &Path, out: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).unwrap_or_else(|err| panic!("{}: {}", dir.display(), err)) {
        let path = entry.unwrap().path();
        if path.is_dir() {
            rust_sources(&path, out);
        } else if path.extension().and_then(|ext| ext.to_str()) == Some("rs") {
            out.push(path);
        }
    }
}

#[test]
fn sources_carry_frontmatter() {
    let mut sources = Vec::new();
    for dir in ["crates", "bin", "tests"] {
        rust_sources(&repo_root().join(dir), &mut sources);
    }
    assert!(!sources.is_empty());
    for source in sources {
        let content = fs::read_to_string(&source).unwrap();
        assert!(
            content.starts_with("//! ---\n//! hmon_section:"),
            "{} must include frontmatter header",
            source.display()
        );
    }
}

#[test]
fn shipped_schemas_are_valid_json_documents() {
    for entry in fs::read_dir(repo_root().join("configs/schemas")).unwrap() {
        let path = entry.unwrap().path();
        let raw = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw)
            .unwrap_or_else(|err| panic!("{} is not JSON: {}", path.display(), err));
        assert!(value["measurements"].is_object(), "{}", path.display());
    }
}
