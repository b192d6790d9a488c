use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

struct Workspace {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    config_dir: PathBuf,
    src: PathBuf,
    dst: PathBuf,
}

impl Workspace {
    fn new(files: &[&str]) -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().to_path_buf();
        let config_dir = root.join("config");
        let src = root.join("upload");
        let dst = root.join("download");
        fs::create_dir_all(&config_dir).expect("config dir");
        fs::create_dir_all(&src).expect("source dir");
        for name in files {
            fs::write(src.join(name), format!("contents of {name}")).expect("write source");
        }
        Self {
            _tmp: tmp,
            root,
            config_dir,
            src,
            dst,
        }
    }

    fn write_job(&self, extra: &str) -> PathBuf {
        let job = format!(
            r#"
source_type = "local"
target_type = "local"
source_conn_id = "source_conn"
target_conn_id = "target_conn"
path = "{}"
target_path = "{}"
num_batches = 3
chunk_size = 4
{extra}
"#,
            self.src.display(),
            self.dst.display()
        );
        let path = self.root.join("job.toml");
        fs::write(&path, job).expect("write job");
        path
    }

    fn shuttle(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_shuttle"))
            .arg("--config-dir")
            .arg(&self.config_dir)
            .args(args)
            .output()
            .expect("run shuttle")
    }

    fn plan(&self, job: &Path) -> PathBuf {
        let plan = self.root.join("plan.json");
        let output = self.shuttle(&[
            "plan",
            "--job",
            path_str(job),
            "--output",
            path_str(&plan),
        ]);
        assert_success(&output, "plan");
        plan
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "shuttle {what} failed:\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn plan_writes_positional_batches() {
    let ws = Workspace::new(&["g", "c", "a", "e", "b", "f", "d"]);
    let plan = ws.plan(&ws.write_job(""));

    let planned: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(plan).expect("read plan")).expect("plan json");
    let batches = planned["batches"].as_array().expect("batches");
    let files: Vec<Vec<&str>> = batches
        .iter()
        .map(|b| {
            b["files"]
                .as_array()
                .expect("files")
                .iter()
                .map(|f| f.as_str().expect("name"))
                .collect()
        })
        .collect();
    assert_eq!(files, vec![vec!["a", "d", "g"], vec!["b", "e"], vec!["c", "f"]]);
    assert_eq!(planned["source_path"], path_str(&ws.src));
}

#[test]
fn run_all_transfers_every_batch_and_clears_checkpoints() {
    let ws = Workspace::new(&["a.txt", "b.txt", "c.txt", "d.txt"]);
    let plan = ws.plan(&ws.write_job(""));

    let output = ws.shuttle(&["run", "--job", path_str(&plan), "--run-id", "manual__1", "--all"]);
    assert_success(&output, "run --all");

    for name in ["a.txt", "b.txt", "c.txt", "d.txt"] {
        let copied = fs::read_to_string(ws.dst.join(name)).expect("copied file");
        assert_eq!(copied, format!("contents of {name}"));
        assert!(!ws.dst.join(format!("{name}.tmp")).exists());
    }
    let checkpoints = ws.config_dir.join("checkpoints");
    let leftover = fs::read_dir(&checkpoints)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0, "successful runs must clear their checkpoints");
}

#[test]
fn run_modulo_workers_without_plan() {
    let ws = Workspace::new(&["one.csv", "two.csv", "three.csv", "four.csv", "five.csv"]);
    let job = ws.write_job("");

    for modulo in ["0", "1", "2"] {
        let output = ws.shuttle(&[
            "run",
            "--job",
            path_str(&job),
            "--run-id",
            "scheduled__2025-12-13",
            "--modulo-id",
            modulo,
        ]);
        assert_success(&output, "run --modulo-id");
    }

    let mut copied: Vec<String> = fs::read_dir(&ws.dst)
        .expect("target dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    copied.sort();
    assert_eq!(copied, vec!["five.csv", "four.csv", "one.csv", "three.csv", "two.csv"]);
}

#[test]
fn transform_flag_uppercases_content() {
    let ws = Workspace::new(&["note.txt"]);
    let job = ws.write_job(
        r#"
[[batches]]
batch_id = 0
files = ["note.txt"]
"#,
    );

    let output = ws.shuttle(&[
        "run",
        "--job",
        path_str(&job),
        "--run-id",
        "r1",
        "--batch-id",
        "0",
        "--transform",
        "uppercase",
    ]);
    assert_success(&output, "run --transform");
    assert_eq!(
        fs::read_to_string(ws.dst.join("note.txt")).expect("copied"),
        "CONTENTS OF NOTE.TXT"
    );
}

#[test]
fn run_with_progress_reports_and_copies() {
    let ws = Workspace::new(&["big.bin", "small.bin"]);
    let job = ws.write_job(
        r#"
[[batches]]
batch_id = 0
files = ["big.bin", "small.bin"]
"#,
    );

    let output = ws.shuttle(&[
        "run",
        "--job",
        path_str(&job),
        "--run-id",
        "with-progress",
        "--progress",
    ]);
    assert_success(&output, "run --progress");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 synced, 0 skipped"), "unexpected summary:\n{stdout}");
    for name in ["big.bin", "small.bin"] {
        assert_eq!(
            fs::read_to_string(ws.dst.join(name)).expect("copied"),
            format!("contents of {name}")
        );
    }
}

#[test]
fn failed_batch_keeps_checkpoint_for_resume() {
    let ws = Workspace::new(&["a.txt", "c.txt"]);
    let job = ws.write_job(
        r#"
[[batches]]
batch_id = 0
files = ["a.txt", "b.txt", "c.txt"]
"#,
    );
    let run = |ws: &Workspace| {
        ws.shuttle(&[
            "run",
            "--job",
            path_str(&job),
            "--run-id",
            "retry-me",
            "--batch-id",
            "0",
        ])
    };

    let output = run(&ws);
    assert!(!output.status.success(), "missing b.txt must fail the batch");
    assert!(String::from_utf8_lossy(&output.stderr).contains("b.txt"));
    assert!(ws.dst.join("a.txt").exists());
    assert!(!ws.dst.join("c.txt").exists());

    let show = ws.shuttle(&[
        "checkpoint",
        "show",
        "--batch-id",
        "0",
        "--run-id",
        "retry-me",
        "--json",
    ]);
    assert_success(&show, "checkpoint show");
    let entries: serde_json::Value =
        serde_json::from_slice(&show.stdout).expect("checkpoint json");
    let committed: Vec<&String> = entries.as_object().expect("map").keys().collect();
    assert_eq!(committed, vec!["a.txt"]);

    fs::write(ws.src.join("b.txt"), "contents of b.txt").expect("restore b.txt");
    let output = run(&ws);
    assert_success(&output, "retry");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 synced, 1 skipped"), "unexpected summary:\n{stdout}");
    assert!(ws.dst.join("c.txt").exists());
}

#[test]
fn checkpoint_clear_on_missing_key_succeeds() {
    let ws = Workspace::new(&[]);
    let output = ws.shuttle(&["checkpoint", "clear", "--task-id", "nothing", "--run-id", "r"]);
    assert_success(&output, "checkpoint clear");
}

#[test]
fn unknown_adapter_type_is_reported() {
    let ws = Workspace::new(&["a"]);
    let job = ws.root.join("job.json");
    let body = serde_json::json!({
        "source_type": "s3",
        "target_type": "local",
        "source_conn_id": "bucket",
        "target_conn_id": "disk",
        "source_path": path_str(&ws.src),
        "target_path": path_str(&ws.dst),
        "num_batches": 1,
        "modulo_id": 0
    });
    fs::write(&job, body.to_string()).expect("write job");

    let output = ws.shuttle(&["run", "--job", path_str(&job), "--run-id", "r"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unsupported adapter type: s3"));
}
