//! Smoke test for the rocq-mcp stdio server.
//!
//! Starts the built `rocq-mcp` binary as an MCP child process and walks a
//! whole proof session against a real `vsrocqtop`. Opt-in because it needs
//! the prover on PATH:
//!
//! ```bash
//! cargo build -p rocq-mcp
//! ROCQ_SMOKE_FILE=/abs/path/to/simple.v cargo run -p rocq-mcp --example stdio_smoke
//! ```

use rmcp::{
    model::CallToolRequestParam,
    service::ServiceExt,
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use std::path::PathBuf;
use tokio::process::Command;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    // `CARGO_MANIFEST_DIR` here is `<workspace>/mcp-server`; the binary is
    // built into the workspace `target/`.
    let workspace_root = root
        .parent()
        .expect("mcp-server should be nested under the workspace")
        .to_path_buf();
    let bin = workspace_root.join("target/debug/rocq-mcp");
    if !bin.exists() {
        anyhow::bail!(
            "missing server binary at {}\n\nBuild it with:\n  cargo build -p rocq-mcp",
            bin.display()
        );
    }

    let file = std::env::var("ROCQ_SMOKE_FILE").map_err(|_| {
        anyhow::anyhow!("ROCQ_SMOKE_FILE is required (set it to an absolute .v file path)")
    })?;

    eprintln!("spawning: {}", bin.display());
    let service = ()
        .serve(TokioChildProcess::new(
            Command::new(&bin).configure(|_cmd| {}),
        )?)
        .await?;

    let tools = service.list_tools(Default::default()).await?;
    let names: Vec<String> = tools.tools.iter().map(|t| t.name.to_string()).collect();
    eprintln!("tools: {names:?}");
    for required in [
        "rocq_open",
        "rocq_close",
        "rocq_sync",
        "rocq_check",
        "rocq_check_all",
        "rocq_step_forward",
        "rocq_step_backward",
        "rocq_get_proof_state",
    ] {
        anyhow::ensure!(
            names.iter().any(|n| n.as_str() == required),
            "missing tool: {required}"
        );
    }

    let calls: Vec<(&str, serde_json::Value)> = vec![
        ("rocq_open", serde_json::json!({"file": file})),
        // After "intros n." in the canonical simple.v.
        ("rocq_check", serde_json::json!({"file": file, "line": 3, "col": 0})),
        ("rocq_check_all", serde_json::json!({"file": file})),
        ("rocq_get_proof_state", serde_json::json!({"file": file})),
        ("rocq_about", serde_json::json!({"file": file, "pattern": "Nat.add"})),
        ("rocq_search", serde_json::json!({"file": file, "pattern": "0 + _ = _"})),
        ("rocq_close", serde_json::json!({"file": file})),
    ];
    for (name, args) in calls {
        let result = service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: args.as_object().cloned(),
            })
            .await?;
        println!("--- {name} ---\n{result:#?}\n");
    }

    service.cancel().await?;
    Ok(())
}
