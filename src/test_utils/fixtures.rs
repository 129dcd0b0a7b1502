use std::path::{Path, PathBuf};

/// Write a node configuration whose run and data directories live under
/// `root`, followed by `components` verbatim. Returns the config path.
pub fn write_node_config(root: &Path, components: &str) -> PathBuf {
    let run_dir = root.join("run");
    let data_dir = root.join("data");
    std::fs::create_dir_all(&run_dir).expect("Failed to create run dir");
    std::fs::create_dir_all(data_dir.join("bin")).expect("Failed to create data dir");

    let content = format!(
        r#"[paths]
run_dir = "{}"
data_dir = "{}"

[supervisor]
stop_timeout_secs = 1
respawn_delay_secs = 1

{components}
"#,
        run_dir.display(),
        data_dir.display(),
    );

    let config_path = root.join("supervisor.toml");
    std::fs::write(&config_path, content).expect("Failed to write config");
    config_path
}
