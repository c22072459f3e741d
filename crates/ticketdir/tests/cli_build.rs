use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}"))
}

struct Workspace {
    home_dir: PathBuf,
    cwd: PathBuf,
    source_root: PathBuf,
    out_dir: PathBuf,
}

impl Workspace {
    fn new(prefix: &str) -> Self {
        let temp = unique_temp_dir(prefix);
        let workspace = Self {
            home_dir: temp.join("home"),
            cwd: temp.join("cwd"),
            source_root: temp.join("exports"),
            out_dir: temp.join("tickets"),
        };
        for dir in [
            &workspace.home_dir,
            &workspace.cwd,
            &workspace.source_root,
        ] {
            std::fs::create_dir_all(dir).expect("workspace dir should be creatable");
        }
        workspace
    }

    fn write_incident(&self, relative: &str, record: &Value) -> PathBuf {
        let path = self.source_root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("export subdir should be creatable");
        }
        let raw = serde_json::to_string(record).expect("fixture should serialize");
        std::fs::write(&path, raw).expect("export should be writable");
        path
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_ticketdir"))
            .args(["--home-dir"])
            .arg(&self.home_dir)
            .args(["--cwd"])
            .arg(&self.cwd)
            .args(["--out-dir"])
            .arg(&self.out_dir)
            .args(args)
            .output()
            .expect("ticketdir should execute")
    }

    fn build(&self, extra: &[&str]) -> Output {
        let source_root = self.source_root.to_string_lossy().to_string();
        let mut args = vec!["build", "--source-root", source_root.as_str()];
        args.extend_from_slice(extra);
        self.run(&args)
    }
}

fn incident(number: &str, short_description: &str, state: Option<&str>) -> Value {
    let mut fields = json!({
        "short_description": short_description,
        "opened_at": "2023-11-05 14:00:00"
    });
    if let Some(state) = state {
        fields["state"] = json!(state);
    }
    json!({
        "metadata": {"incident_number": number},
        "incident_fields": fields,
        "discussions": {
            "customer_facing_comments": [
                {"created_by": "Pat User", "sys_created_on": "2023-11-05 14:00:00", "text": "Cannot log in."},
                {"created_by": "Jane Doe", "sys_created_on": "2023-11-05 15:00:00", "text": "Password reset sent."}
            ]
        }
    })
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn leftover_rotations(out_dir: &Path) -> Vec<String> {
    let parent = out_dir.parent().expect("out dir should have a parent");
    let prefix = format!(
        "{}.old-",
        out_dir
            .file_name()
            .and_then(|name| name.to_str())
            .expect("utf-8 out dir name")
    );
    std::fs::read_dir(parent)
        .expect("parent should be readable")
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| name.starts_with(&prefix))
        .collect()
}

#[test]
fn build_writes_archive_and_reports_stages() {
    let workspace = Workspace::new("ticketdir-cli-build");
    workspace.write_incident(
        "2023/INC0000001.json",
        &incident("INC0000001", "Login fails", Some("Resolved")),
    );
    workspace.write_incident(
        "INC0000002.json",
        &incident(
            "INC0000002",
            "Storage Quota Increase Request: m1234",
            Some("Closed"),
        ),
    );
    workspace.write_incident("notes.txt", &json!({"ignored": true}));

    let output = workspace.build(&["--jobs", "2"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let stdout = stdout(&output);
    assert!(stdout.contains("ticketdir: starting `build`"));
    assert!(stdout.contains("build: start"));
    assert!(stdout.contains("build: stage load_rules"));
    assert!(stdout.contains("build: checkpoint rules_loaded"));
    assert!(stdout.contains("build: stage process_tickets"));
    assert!(stdout.contains(
        "build: checkpoint tickets_processed total=2 written=1 skipped=1 failed=0"
    ));
    assert!(stdout.contains("build: skipped reason=storage_quota_increase count=1"));
    assert!(stdout.contains("build: complete"));
    assert!(stdout.contains("ticketdir: completed `build` (exit_code=0)"));
    assert!(stderr(&output).contains("Processed 2/2 tickets"));

    let ticket_dir = workspace.out_dir.join("2023").join("11").join("INC0000001");
    let markdown =
        std::fs::read_to_string(ticket_dir.join("ticket.md")).expect("ticket.md should exist");
    assert!(markdown.starts_with("# INC0000001 - Login fails\n"));
    assert!(!ticket_dir.with_file_name("INC0000002").exists());

    let agents = std::fs::read_to_string(workspace.out_dir.join("AGENTS.md"))
        .expect("AGENTS.md should exist");
    assert!(agents.contains(&workspace.out_dir.display().to_string()));
}

#[test]
fn rebuild_replaces_the_previous_output_tree() {
    let workspace = Workspace::new("ticketdir-cli-rotate");
    workspace.write_incident(
        "INC0000001.json",
        &incident("INC0000001", "Login fails", Some("Resolved")),
    );
    std::fs::create_dir_all(workspace.out_dir.join("stale"))
        .expect("stale dir should be creatable");
    std::fs::write(workspace.out_dir.join("stale").join("old.md"), "old")
        .expect("stale file should be writable");

    let output = workspace.build(&[]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    assert!(!workspace.out_dir.join("stale").exists());
    assert!(workspace.out_dir.join("AGENTS.md").is_file());
    assert!(
        leftover_rotations(&workspace.out_dir).is_empty(),
        "old output tree should be deleted before exit"
    );
}

#[test]
fn failed_tickets_exit_two_but_the_rest_are_written() {
    let workspace = Workspace::new("ticketdir-cli-failures");
    workspace.write_incident(
        "INC0000001.json",
        &incident("INC0000001", "Login fails", Some("Resolved")),
    );
    workspace.write_incident("INC0000003.json", &incident("INC0000003", "No state", None));

    let output = workspace.build(&[]);
    assert_eq!(output.status.code(), Some(2), "stdout: {}", stdout(&output));

    let stdout = stdout(&output);
    assert!(stdout.contains("written=1 skipped=0 failed=1"));
    let stderr = stderr(&output);
    assert!(stderr.contains("ticketdir: failed `build` (exit_code=2)"));
    assert!(stderr.contains("INC0000003.json [missing_field]: missing required value: status"));

    let ticket_md = workspace.out_dir.join("2023/11/INC0000001/ticket.md");
    assert!(ticket_md.is_file());
    assert!(workspace.out_dir.join("AGENTS.md").is_file());
}

#[test]
fn fail_fast_aborts_with_runtime_exit_code() {
    let workspace = Workspace::new("ticketdir-cli-fail-fast");
    workspace.write_incident("INC0000003.json", &incident("INC0000003", "No state", None));

    let output = workspace.build(&["--fail-fast"]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = stderr(&output);
    assert!(stderr.contains("aborting build"));
    assert!(stderr.contains("missing required value: status"));
    assert!(!workspace.out_dir.join("AGENTS.md").exists());
}

#[test]
fn missing_or_empty_source_root_is_a_runtime_failure() {
    let workspace = Workspace::new("ticketdir-cli-empty");

    let output = workspace.build(&[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("no JSON files found"));

    let output = workspace.run(&["build", "--source-root", "does/not/exist"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("source root not found"));
}

#[test]
fn usage_errors_exit_64() {
    let workspace = Workspace::new("ticketdir-cli-usage");

    let output = workspace.run(&["build"]);
    assert_eq!(output.status.code(), Some(64));

    let output = workspace.run(&["build", "--source-root", "x", "--jobs", "0"]);
    assert_eq!(output.status.code(), Some(64));

    let output = workspace.run(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn render_prints_only_markdown_on_stdout() {
    let workspace = Workspace::new("ticketdir-cli-render");
    let input = workspace
        .write_incident(
            "INC0000001.json",
            &incident("INC0000001", "Login fails", Some("Resolved")),
        )
        .to_string_lossy()
        .to_string();

    let output = workspace.run(&["render", input.as_str()]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let stdout = stdout(&output);
    assert!(stdout.starts_with("# INC0000001 - Login fails\n"));
    assert!(stdout.ends_with("## Jane Doe\n\nPassword reset sent.\n"));
    assert!(stderr(&output).contains("render: complete"));
    assert!(
        !workspace.out_dir.exists(),
        "render must not write the archive"
    );

    let output = workspace.run(&["render", "--json", input.as_str()]);
    assert_eq!(output.status.code(), Some(0));
    let value: Value =
        serde_json::from_slice(&output.stdout).expect("render --json should print json");
    assert_eq!(value["status"], "Resolved");
    assert_eq!(value["timeline"].as_array().map(Vec::len), Some(2));
}

#[test]
fn render_reports_skips_without_output() {
    let workspace = Workspace::new("ticketdir-cli-render-skip");
    let input = workspace
        .write_incident(
            "INC0000009.json",
            &incident(
                "INC0000009",
                "Ticket from IRIS: New PI Account Request",
                Some("Closed"),
            ),
        )
        .to_string_lossy()
        .to_string();

    let output = workspace.run(&["render", input.as_str()]);
    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
    assert!(stderr(&output).contains("render: skipped reason=iris_pi_account_request"));
}
