//! proof-trace: step through every sentence of a `.v` file and print the
//! full proof state the prover reports after each one. A debugging aid for
//! watching what the bridge would see.
//!
//! Usage: `proof-trace <file.v> [-- vsrocqtop flags...]`

use lsp_types::Position;
use rocq_core::{format, Bridge};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(file) = args.first().cloned() else {
        eprintln!("Usage: proof-trace <file.v> [-- vsrocqtop flags...]");
        std::process::exit(1);
    };
    let prover_args = match args.iter().position(|a| a == "--") {
        Some(i) => args[i + 1..].to_vec(),
        None => Vec::new(),
    };

    let bridge = Bridge::new(prover_args);
    if let Err(e) = run(&bridge, &file).await {
        eprintln!("proof-trace: {e}");
        let _ = bridge.shutdown().await;
        std::process::exit(1);
    }
    if let Err(e) = bridge.shutdown().await {
        eprintln!("proof-trace: shutdown: {e}");
        std::process::exit(1);
    }
}

async fn run(bridge: &Bridge, file: &str) -> rocq_core::Result<()> {
    bridge.open_doc(file).await?;
    let content = bridge.document_text(file)?;

    let mut prev_offset = 0usize;
    let mut step = 0u32;

    loop {
        let trace = bridge.trace_step(file).await?;

        // No cursor movement means the prover didn't step: end of document.
        let Some(cursor) = trace.cursor else {
            break;
        };
        step += 1;

        let offset = position_to_offset(&content, cursor);
        let sentence = if offset > prev_offset {
            content[prev_offset..offset].trim()
        } else {
            ""
        };
        prev_offset = offset;

        println!("=== Step {step} ===");
        if !sentence.is_empty() {
            println!("> {sentence}");
        }
        println!();

        if let Some(view) = &trace.proof_view {
            if view.goals.is_empty() {
                println!("Focused Goals (0)");
            } else {
                println!("Focused Goals ({}):", view.goals.len());
                for (i, goal) in view.goals.iter().enumerate() {
                    if view.goals.len() > 1 {
                        println!("Goal {}:", i + 1);
                    }
                    print!("{}", goal.text);
                }
            }
            println!("Unfocused: {}", view.unfocused_count);

            if !view.messages.is_empty() {
                println!("\nMessages ({}):", view.messages.len());
                for m in &view.messages {
                    println!("  {m}");
                }
            }
        }

        if !trace.diagnostics.is_empty() {
            println!("\nDiagnostics ({}):", trace.diagnostics.len());
            for d in &trace.diagnostics {
                println!("  {}", format::diagnostic_line(d));
            }
        }

        println!();
    }

    bridge.close_doc(file).await?;
    println!("--- Done: {step} steps ---");
    Ok(())
}

/// Byte offset of an LSP position in the document text.
fn position_to_offset(content: &str, pos: Position) -> usize {
    let mut line = 0u32;
    for (i, ch) in content.char_indices() {
        if line == pos.line {
            return (i + pos.character as usize).min(content.len());
        }
        if ch == '\n' {
            line += 1;
        }
    }
    content.len()
}
