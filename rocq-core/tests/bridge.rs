//! Bridge tests against a scripted in-process prover.
//!
//! The prover side of each test is a plain frame reader/writer on the far
//! end of a duplex pipe, playing back exactly the messages a `vsrocqtop`
//! would send. That keeps the full request/notification plumbing under
//! test without needing the real binary.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};

use rocq_core::codec::{FrameReader, FrameWriter, RawMessage};
use rocq_core::{Bridge, Error, ProverClient, QueryKind};

struct FakeProver {
    frames: FrameReader,
    writer: FrameWriter,
}

impl FakeProver {
    async fn recv(&mut self) -> RawMessage {
        self.frames
            .read_message()
            .await
            .expect("fake prover read")
            .expect("fake prover stream closed")
    }

    async fn send(&mut self, msg: RawMessage) {
        self.writer.write_message(&msg).await.expect("fake prover write");
    }

    async fn respond(&mut self, id: i64, result: Value) {
        self.send(RawMessage::response(id, result)).await;
    }

    async fn notify(&mut self, method: &str, params: Value) {
        self.send(RawMessage::notification(method, Some(params))).await;
    }
}

fn pair() -> (Arc<ProverClient>, FakeProver) {
    let (client_io, prover_io) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client_io);
    let client = ProverClient::connect(client_read, client_write);
    let (prover_read, prover_write) = tokio::io::split(prover_io);
    let prover = FakeProver {
        frames: FrameReader::new(prover_read),
        writer: FrameWriter::new(prover_write),
    };
    (client, prover)
}

async fn bridge_pair() -> (Arc<Bridge>, FakeProver) {
    let (client, prover) = pair();
    let bridge = Arc::new(Bridge::new(Vec::new()));
    bridge.attach_client(client).await;
    (bridge, prover)
}

fn temp_v_file(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("rocq-bridge-test-{}.v", uuid::Uuid::new_v4()));
    std::fs::write(&path, contents).expect("write temp file");
    path
}

const SIMPLE_V: &str = "Theorem plus_0_n : forall n : nat, 0 + n = n.\nProof.\n  intros n.\n  simpl.\n  reflexivity.\nQed.\n";

/// Open a document and consume the resulting didOpen, returning the path
/// and the URI the bridge chose.
async fn open(bridge: &Bridge, prover: &mut FakeProver, contents: &str) -> (String, String) {
    let path = temp_v_file(contents);
    let file = path.to_string_lossy().to_string();
    bridge.open_doc(&file).await.expect("open_doc");

    let msg = prover.recv().await;
    assert_eq!(msg.method.as_deref(), Some("textDocument/didOpen"));
    let td = &msg.params.as_ref().unwrap()["textDocument"];
    assert_eq!(td["version"], 1);
    assert_eq!(td["languageId"], "rocq");
    assert_eq!(td["text"], contents);
    let uri = td["uri"].as_str().unwrap().to_string();
    (file, uri)
}

fn proof_view_params(goals: Value, unfocused: Value, messages: Value) -> Value {
    json!({
        "proof": {
            "goals": goals,
            "shelvedGoals": [],
            "givenUpGoals": [],
            "unfocusedGoals": unfocused,
        },
        "messages": messages,
        "pp_messages": [],
    })
}

#[tokio::test]
async fn requests_correlate_out_of_order() {
    let (client, mut prover) = pair();

    let a = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.request("prover/about", Some(json!({}))).await }
    });
    let first = prover.recv().await;
    let b = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.request("prover/locate", Some(json!({}))).await }
    });
    let second = prover.recv().await;

    // First request id is 1, the next is 2.
    assert_eq!(first.id, Some(1));
    assert_eq!(second.id, Some(2));

    // Answer in reverse order; each waiter must still get its own reply.
    let by_method = |msg: &RawMessage| match msg.method.as_deref() {
        Some("prover/about") => json!("about-reply"),
        Some("prover/locate") => json!("locate-reply"),
        other => panic!("unexpected method {other:?}"),
    };
    prover.respond(second.id.unwrap(), by_method(&second)).await;
    prover.respond(first.id.unwrap(), by_method(&first)).await;

    assert_eq!(a.await.unwrap().unwrap(), json!("about-reply"));
    assert_eq!(b.await.unwrap().unwrap(), json!("locate-reply"));
}

#[tokio::test]
async fn error_response_surfaces_code_and_message() {
    let (client, mut prover) = pair();

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.request("prover/check", None).await }
    });
    let msg = prover.recv().await;
    prover
        .send(RawMessage {
            jsonrpc: Some("2.0".into()),
            id: msg.id,
            error: Some(rocq_core::codec::RpcError {
                code: -32603,
                message: "anomaly".into(),
                data: None,
            }),
            ..RawMessage::default()
        })
        .await;

    match call.await.unwrap() {
        Err(Error::Prover { code, message }) => {
            assert_eq!(code, -32603);
            assert_eq!(message, "anomaly");
        }
        other => panic!("expected prover error, got {other:?}"),
    }
}

#[tokio::test]
async fn pending_requests_fail_when_the_prover_dies() {
    let (client, mut prover) = pair();

    let call = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.request("shutdown", None).await }
    });
    // Wait for the request to land, then close the prover side without
    // answering.
    let msg = prover.recv().await;
    assert_eq!(msg.method.as_deref(), Some("shutdown"));
    drop(prover);

    match call.await.unwrap() {
        Err(Error::ProverDied) => {}
        other => panic!("expected ProverDied, got {other:?}"),
    }

    // New requests fail immediately once the reader is gone.
    match client.request("shutdown", None).await {
        Err(Error::ProverDied) => {}
        other => panic!("expected ProverDied, got {other:?}"),
    }
}

#[tokio::test]
async fn workspace_configuration_is_answered_per_item() {
    let (client, mut prover) = pair();
    let _keep_alive = client;

    prover
        .send(RawMessage {
            jsonrpc: Some("2.0".into()),
            id: Some(500),
            method: Some("workspace/configuration".into()),
            params: Some(json!({"items": [{"section": "vsrocq"}, {"section": "prover"}]})),
            ..RawMessage::default()
        })
        .await;

    let reply = prover.recv().await;
    assert_eq!(reply.id, Some(500));
    assert!(reply.error.is_none());
    let result = reply.result.expect("configuration result");
    let entries = result.as_array().expect("array result");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["proof"]["mode"], 0);
}

#[tokio::test]
async fn unknown_server_request_gets_a_null_result() {
    let (client, mut prover) = pair();
    let _keep_alive = client;

    prover
        .send(RawMessage {
            jsonrpc: Some("2.0".into()),
            id: Some(501),
            method: Some("client/unknownThing".into()),
            params: None,
            ..RawMessage::default()
        })
        .await;

    let reply = prover.recv().await;
    assert_eq!(reply.id, Some(501));
    assert!(reply.error.is_none());
    assert!(reply.result.is_none() || reply.result == Some(Value::Null));
}

#[tokio::test]
async fn initialize_claims_diagnostics_and_selects_manual_mode() {
    let (client, mut prover) = pair();

    let handshake = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.initialize("file:///work").await }
    });

    let init = prover.recv().await;
    assert_eq!(init.id, Some(1));
    assert_eq!(init.method.as_deref(), Some("initialize"));
    let params = init.params.as_ref().unwrap();
    assert_eq!(params["rootUri"], "file:///work");
    assert!(params["capabilities"]["textDocument"]["publishDiagnostics"].is_object());
    prover.respond(1, json!({"capabilities": {}})).await;

    let initialized = prover.recv().await;
    assert_eq!(initialized.method.as_deref(), Some("initialized"));
    assert!(initialized.id.is_none());

    let config = prover.recv().await;
    assert_eq!(
        config.method.as_deref(),
        Some("workspace/didChangeConfiguration")
    );
    assert_eq!(
        config.params.as_ref().unwrap()["settings"]["vsrocq"]["proof"]["mode"],
        0
    );

    handshake.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_sends_exit_after_the_response() {
    let (client, mut prover) = pair();

    let done = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.shutdown().await }
    });

    let shutdown = prover.recv().await;
    assert_eq!(shutdown.method.as_deref(), Some("shutdown"));
    prover.respond(shutdown.id.unwrap(), Value::Null).await;

    let exit = prover.recv().await;
    assert_eq!(exit.method.as_deref(), Some("exit"));
    assert!(exit.id.is_none());

    done.await.unwrap().unwrap();
}

#[tokio::test]
async fn check_formats_goals_and_clean_diagnostics() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    let reply = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.check(&file, 3, 0).await }
    });

    let msg = prover.recv().await;
    assert_eq!(msg.method.as_deref(), Some("prover/interpretToPoint"));
    let params = msg.params.as_ref().unwrap();
    assert_eq!(params["textDocument"]["uri"], uri.as_str());
    assert_eq!(params["textDocument"]["version"], 1);
    assert_eq!(params["position"], json!({"line": 3, "character": 0}));

    prover
        .notify(
            "prover/proofView",
            proof_view_params(
                json!([{
                    "id": 1,
                    "goal": ["Ppcmd_string", "0 + n = n"],
                    "hypotheses": [["Ppcmd_string", "n : nat"]],
                }]),
                json!([{}]),
                json!([]),
            ),
        )
        .await;
    prover
        .notify(
            "textDocument/publishDiagnostics",
            json!({"uri": uri, "diagnostics": []}),
        )
        .await;

    let text = reply.await.unwrap().unwrap();
    assert_eq!(text, "Goal:\n  n : nat\n  ────────────────────\n  0 + n = n\n");
    assert!(!text.contains("[error]"));
}

#[tokio::test]
async fn check_all_reports_error_diagnostics() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, uri) = open(&bridge, &mut prover, "Theorem broken : False.\nProof.\nQed.\n").await;

    let reply = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.check_all(&file).await }
    });

    let msg = prover.recv().await;
    assert_eq!(msg.method.as_deref(), Some("prover/interpretToEnd"));

    prover
        .notify(
            "prover/proofView",
            proof_view_params(json!([]), json!([]), json!([])),
        )
        .await;
    prover
        .notify(
            "textDocument/publishDiagnostics",
            json!({
                "uri": uri,
                "diagnostics": [{
                    "range": {"start": {"line": 2, "character": 0}, "end": {"line": 2, "character": 4}},
                    "severity": 1,
                    "message": "Attempt to save an incomplete proof",
                }],
            }),
        )
        .await;

    let text = reply.await.unwrap().unwrap();
    assert!(
        text.contains("[error] line 3:0–3:4: Attempt to save an incomplete proof"),
        "got:\n{text}"
    );
}

#[tokio::test]
async fn step_reports_sub_goal_completion() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    let reply = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.step(&file, true).await }
    });

    let msg = prover.recv().await;
    assert_eq!(msg.method.as_deref(), Some("prover/stepForward"));

    // No focused goals, two background subgoals left.
    prover
        .notify(
            "prover/proofView",
            proof_view_params(json!([]), json!([{}, {}]), json!([])),
        )
        .await;
    prover
        .notify(
            "textDocument/publishDiagnostics",
            json!({"uri": uri, "diagnostics": []}),
        )
        .await;

    let text = reply.await.unwrap().unwrap();
    assert_eq!(text, "Sub-goal complete! 2 unfocused remaining.\n");
}

#[tokio::test]
async fn step_backward_uses_its_own_method() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    let reply = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.step(&file, false).await }
    });

    let msg = prover.recv().await;
    assert_eq!(msg.method.as_deref(), Some("prover/stepBackward"));

    prover
        .notify(
            "prover/proofView",
            proof_view_params(
                json!([{"id": 1, "goal": ["Ppcmd_string", "True"], "hypotheses": []}]),
                json!([{}]),
                json!([]),
            ),
        )
        .await;
    prover
        .notify(
            "textDocument/publishDiagnostics",
            json!({"uri": uri, "diagnostics": []}),
        )
        .await;

    let text = reply.await.unwrap().unwrap();
    assert_eq!(text, "Goal:\n  ────────────────────\n  True\n");
}

#[tokio::test]
async fn qed_step_carries_the_defined_message() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    let reply = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.step(&file, true).await }
    });
    prover.recv().await;

    prover
        .notify(
            "prover/proofView",
            proof_view_params(
                json!([]),
                json!([]),
                json!([[0, ["Ppcmd_string", "plus_0_n is defined"]]]),
            ),
        )
        .await;
    prover
        .notify(
            "textDocument/publishDiagnostics",
            json!({"uri": uri, "diagnostics": []}),
        )
        .await;

    let text = reply.await.unwrap().unwrap();
    assert_eq!(text, "Proof complete!\n\n=== Messages ===\nplus_0_n is defined\n");
}

#[tokio::test(start_paused = true)]
async fn collector_returns_what_it_has_after_the_timeout() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, _uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    let reply = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.check(&file, 0, 0).await }
    });

    let msg = prover.recv().await;
    assert_eq!(msg.method.as_deref(), Some("prover/interpretToPoint"));
    // Send nothing: the 10 s ceiling elapses (virtual time) and the
    // formatter falls back.
    let text = reply.await.unwrap().unwrap();
    assert_eq!(text, "No goals or diagnostics.");
}

#[tokio::test]
async fn sync_increments_versions_and_reopen_resets_them() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    bridge.sync_doc(&file).await.unwrap();
    let first = prover.recv().await;
    assert_eq!(first.method.as_deref(), Some("textDocument/didChange"));
    assert_eq!(first.params.as_ref().unwrap()["textDocument"]["version"], 2);

    // Unchanged file contents still bump the version.
    bridge.sync_doc(&file).await.unwrap();
    let second = prover.recv().await;
    assert_eq!(second.params.as_ref().unwrap()["textDocument"]["version"], 3);
    assert_eq!(
        second.params.as_ref().unwrap()["contentChanges"][0]["text"],
        SIMPLE_V
    );

    bridge.close_doc(&file).await.unwrap();
    let closed = prover.recv().await;
    assert_eq!(closed.method.as_deref(), Some("textDocument/didClose"));
    assert_eq!(closed.params.as_ref().unwrap()["textDocument"]["uri"], uri.as_str());

    // Re-open: back to version 1.
    bridge.open_doc(&file).await.unwrap();
    let reopened = prover.recv().await;
    assert_eq!(
        reopened.params.as_ref().unwrap()["textDocument"]["version"],
        1
    );
}

#[tokio::test]
async fn open_twice_and_unopened_files_are_usage_errors() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, _uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    match bridge.open_doc(&file).await {
        Err(Error::AlreadyOpen(_)) => {}
        other => panic!("expected AlreadyOpen, got {other:?}"),
    }

    match bridge.check("/nonexistent/other.v", 0, 0).await {
        Err(Error::NotOpen(_)) => {}
        other => panic!("expected NotOpen, got {other:?}"),
    }
}

#[tokio::test]
async fn query_renders_the_reply_tree() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    let reply = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.query(&file, QueryKind::About, "Nat.add").await }
    });

    let msg = prover.recv().await;
    assert_eq!(msg.method.as_deref(), Some("prover/about"));
    let params = msg.params.as_ref().unwrap();
    assert_eq!(params["pattern"], "Nat.add");
    assert_eq!(params["position"], json!({"line": 0, "character": 0}));
    assert_eq!(params["textDocument"]["uri"], uri.as_str());

    prover
        .respond(
            msg.id.unwrap(),
            json!([
                "Ppcmd_glue",
                [
                    ["Ppcmd_string", "Nat.add :"],
                    ["Ppcmd_print_break", 1, 0],
                    ["Ppcmd_string", "nat -> nat -> nat"]
                ]
            ]),
        )
        .await;

    let text = reply.await.unwrap().unwrap();
    assert_eq!(text, "Nat.add : nat -> nat -> nat");
}

#[tokio::test]
async fn query_with_empty_render_reads_no_result() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, _uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    let reply = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.query(&file, QueryKind::Print, "nothing").await }
    });

    let msg = prover.recv().await;
    assert_eq!(msg.method.as_deref(), Some("prover/print"));
    prover
        .respond(msg.id.unwrap(), json!(["Ppcmd_unknown", []]))
        .await;

    assert_eq!(reply.await.unwrap().unwrap(), "No result.");
}

#[tokio::test(start_paused = true)]
async fn search_collects_pushed_results() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, _uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    let reply = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.search(&file, "0 + _ = _").await }
    });

    let msg = prover.recv().await;
    assert_eq!(msg.method.as_deref(), Some("prover/search"));
    let params = msg.params.as_ref().unwrap();
    assert_eq!(params["pattern"], "0 + _ = _");
    let search_id = params["id"].as_str().unwrap().to_string();
    assert!(search_id.starts_with("search-"));

    prover.respond(msg.id.unwrap(), Value::Null).await;
    prover
        .notify(
            "prover/searchResult",
            json!({
                "id": search_id,
                "name": ["Ppcmd_string", "plus_O_n"],
                "statement": ["Ppcmd_string", "forall n : nat, 0 + n = n"],
            }),
        )
        .await;
    prover
        .notify(
            "prover/searchResult",
            json!({
                "id": search_id,
                "name": ["Ppcmd_string", "plus_n_O"],
                "statement": ["Ppcmd_string", "forall n : nat, n = n + 0"],
            }),
        )
        .await;

    let text = reply.await.unwrap().unwrap();
    assert_eq!(
        text,
        "=== Search Results: 2 ===\nplus_O_n : forall n : nat, 0 + n = n\nplus_n_O : forall n : nat, n = n + 0\n"
    );
}

#[tokio::test(start_paused = true)]
async fn search_with_no_results_says_so() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, _uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    let reply = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.search(&file, "impossible_pattern").await }
    });

    let msg = prover.recv().await;
    prover.respond(msg.id.unwrap(), Value::Null).await;

    assert_eq!(reply.await.unwrap().unwrap(), "No results found.");
}

#[tokio::test]
async fn proof_state_is_cached_and_cleared_by_reset() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    // Nothing checked yet.
    assert_eq!(
        bridge.proof_state(&file).await.unwrap(),
        "No proof state available. Run rocq_check or rocq_step_forward first."
    );

    let reply = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.check(&file, 3, 0).await }
    });
    prover.recv().await;
    prover
        .notify(
            "prover/proofView",
            proof_view_params(
                json!([{"id": 1, "goal": ["Ppcmd_string", "0 + n = n"], "hypotheses": []}]),
                json!([{}]),
                json!([]),
            ),
        )
        .await;
    prover
        .notify(
            "textDocument/publishDiagnostics",
            json!({"uri": uri, "diagnostics": []}),
        )
        .await;
    reply.await.unwrap().unwrap();

    let cached = bridge.proof_state(&file).await.unwrap();
    assert!(cached.contains("0 + n = n"), "got:\n{cached}");

    // Reset clears the cache.
    let reset = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.reset(&file).await }
    });
    let msg = prover.recv().await;
    assert_eq!(msg.method.as_deref(), Some("prover/resetRocq"));
    prover.respond(msg.id.unwrap(), Value::Null).await;
    reset.await.unwrap().unwrap();

    assert_eq!(
        bridge.proof_state(&file).await.unwrap(),
        "No proof state available. Run rocq_check or rocq_step_forward first."
    );
}

#[tokio::test]
async fn document_proofs_summarizes_the_reply() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, _uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    let reply = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.document_proofs(&file).await }
    });

    let msg = prover.recv().await;
    assert_eq!(msg.method.as_deref(), Some("prover/documentProofs"));
    prover
        .respond(
            msg.id.unwrap(),
            json!({
                "proofs": [{
                    "statement": "Theorem plus_0_n : forall n : nat, 0 + n = n.",
                    "range": {"start": {"line": 0, "character": 0}, "end": {"line": 5, "character": 4}},
                    "steps": [
                        {"tactic": "intros n."},
                        {"tactic": "simpl."},
                        {"tactic": "reflexivity."},
                    ],
                }],
            }),
        )
        .await;

    let text = reply.await.unwrap().unwrap();
    assert!(text.starts_with("=== Proofs: 1 ==="), "got:\n{text}");
    assert!(text.contains("lines 1–6"), "got:\n{text}");
    assert!(text.contains("intros n. simpl. reflexivity."), "got:\n{text}");
}

#[tokio::test(start_paused = true)]
async fn trace_step_collects_the_cursor_too() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    let step = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.trace_step(&file).await }
    });

    let msg = prover.recv().await;
    assert_eq!(msg.method.as_deref(), Some("prover/stepForward"));

    prover
        .notify(
            "prover/moveCursor",
            json!({
                "uri": uri,
                "range": {"start": {"line": 0, "character": 0}, "end": {"line": 1, "character": 6}},
            }),
        )
        .await;
    prover
        .notify(
            "prover/proofView",
            proof_view_params(
                json!([{"id": 1, "goal": ["Ppcmd_string", "0 + n = n"], "hypotheses": []}]),
                json!([{}]),
                json!([]),
            ),
        )
        .await;
    prover
        .notify(
            "textDocument/publishDiagnostics",
            json!({"uri": uri, "diagnostics": []}),
        )
        .await;

    let trace = step.await.unwrap().unwrap();
    let cursor = trace.cursor.expect("cursor");
    assert_eq!((cursor.line, cursor.character), (1, 6));
    assert!(trace.proof_view.is_some());
    assert!(trace.diagnostics.is_empty());
}

#[tokio::test(start_paused = true)]
async fn trace_step_without_cursor_movement_times_out_empty() {
    let (bridge, mut prover) = bridge_pair().await;
    let (file, _uri) = open(&bridge, &mut prover, SIMPLE_V).await;

    let step = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        let file = file.clone();
        async move { bridge.trace_step(&file).await }
    });
    prover.recv().await;

    let trace = step.await.unwrap().unwrap();
    assert!(trace.cursor.is_none());
}
