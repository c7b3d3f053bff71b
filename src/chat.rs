// Interactive terminal chat with Eliza, backed by the direct assistant.

use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use tracing::{info, warn};

use crate::assistant::ElizaAssistant;
use crate::context::{ChatMessage, ConversationContext};

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "/bye"];

/// Reads lines from `input` until EOF or an exit word, answering each one.
/// The running conversation is appended to `context.conversation_history`.
/// Returns the number of answered turns.
pub async fn run_chat<R: BufRead, W: Write>(
    assistant: &ElizaAssistant,
    context: &mut ConversationContext,
    mut input: R,
    mut output: W,
) -> Result<usize> {
    info!("Starting Eliza chat session");
    writeln!(output, "Eliza is listening. Type 'exit' to leave.")?;

    let mut turns = 0;
    loop {
        write!(output, "> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).context("Failed to read chat input")? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&line.to_lowercase().as_str()) {
            break;
        }

        match assistant.generate_response(line, context).await {
            Ok(reply) => {
                writeln!(output, "Eliza: {}", reply)?;
                context.conversation_history.push(ChatMessage::user(line));
                context.conversation_history.push(ChatMessage::assistant(reply));
                turns += 1;
            }
            Err(e) => {
                // Shown to the user; they decide whether to retry.
                warn!(error = %e, "Chat turn failed");
                writeln!(output, "Eliza could not answer: {}", e)?;
            }
        }
    }

    writeln!(output, "Goodbye!")?;
    Ok(turns)
}
