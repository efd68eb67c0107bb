//! Q&A stage over a published artifact tree.

mod common;

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use taskvault_renderer::TemplateEngine;
use taskvault_sync::QaMiner;

use common::FakeOracle;

const VALID: &str = r#"```json
{"valid": true, "question": "VPN drops - connection lost every hour", "answer": "Lower the MTU to 1400 on the client profile.", "category": "Network", "tags": ["VPN", "MTU"]}
```"#;

fn artifact(status: &str) -> String {
    format!(
        "---\ntype: task\ngid: 500\ntitle: \"VPN drops\"\nstatus: {status}\ncreated_date: 2025-01-01\n\
         modified_at: 2025-01-02T00:00:00.000000Z\nexpiry_date: \"2026-01-01\"\nsection: \"Resolved\"\n---\n\n\
         # ✅ VPN drops\n"
    )
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

struct Tree {
    _dir: TempDir,
    knowledge: std::path::PathBuf,
    qa: std::path::PathBuf,
}

fn tree() -> Tree {
    let dir = TempDir::new().unwrap();
    let knowledge = dir.path().join("knowledge");
    let qa = dir.path().join("qa");
    let project = knowledge.join("Support Desk");
    write(&project.join("Resolved/20250101_VPN drops.md"), &artifact("completed"));
    write(&project.join("Open/20250102_Still open.md"), &artifact("active"));
    write(&project.join("Resolved/notes.md"), "# no front matter\n");
    write(&project.join("attachments/readme.md"), &artifact("completed"));
    write(&knowledge.join("Other Project/Done/20250103_x.md"), &artifact("completed"));
    Tree {
        _dir: dir,
        knowledge,
        qa,
    }
}

#[test]
fn valid_pair_is_written_beside_its_relative_path() {
    let t = tree();
    let oracle = FakeOracle {
        qa_answer: VALID.into(),
        ..FakeOracle::default()
    };
    let templates = TemplateEngine::new(None).unwrap();
    let miner = QaMiner::new(&oracle, &templates, &t.knowledge, &t.qa);

    let report = miner.mine(Some("Support Desk")).unwrap();

    assert_eq!(report.scanned, 3, "attachments and other projects are not scanned");
    assert_eq!(report.skipped, 2);
    assert_eq!(report.written.len(), 1);
    let out = t.qa.join("Support Desk/Resolved/20250101_VPN drops.md");
    assert_eq!(report.written[0], out);

    let doc = fs::read_to_string(&out).unwrap();
    assert!(doc.starts_with("---\ntype: qa_pair\n"));
    assert!(doc.contains("source_gid: \"500\""));
    assert!(doc.contains(r#"expiry_date: "2026-01-01""#));
    assert!(doc.contains("category: \"Network\""));
    assert!(doc.contains("# ❓ VPN drops - connection lost every hour"));
    assert!(doc.contains("VPN, MTU"));
    assert!(doc.contains(
        "> [Source document](../../../knowledge/Support Desk/Resolved/20250101_VPN drops.md)"
    ));
}

#[test]
fn rejected_pairs_write_nothing() {
    let t = tree();
    let oracle = FakeOracle::default();
    let templates = TemplateEngine::new(None).unwrap();
    let miner = QaMiner::new(&oracle, &templates, &t.knowledge, &t.qa);

    let report = miner.mine(None).unwrap();

    assert_eq!(report.scanned, 4);
    assert_eq!(report.invalid, 2);
    assert!(report.written.is_empty());
    assert!(!t.qa.exists());
}

#[test]
fn missing_project_is_an_empty_report() {
    let t = tree();
    let oracle = FakeOracle::default();
    let templates = TemplateEngine::new(None).unwrap();
    let miner = QaMiner::new(&oracle, &templates, &t.knowledge, &t.qa);

    let report = miner.mine(Some("Nope")).unwrap();
    assert_eq!(report.scanned, 0);
}
