//! Line-oriented chat loop for terminals and pipes.

use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::{Conversation, Phase, Update, render_block};

/// Submits every input line as a prompt and prints each block as it lands.
///
/// When the input ends, exchanges still in flight are awaited and printed
/// before the session is closed.
pub async fn run_terminal<R, W>(
    conversation: &mut Conversation,
    input: R,
    out: &mut W,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(text) => {
                    conversation.submit(text);
                    if let Some(message) = conversation.transcript().last() {
                        writeln!(out, "{}", render_block(message))?;
                    }
                }
                None => break,
            },
            Some(update) = conversation.next_reply(), if conversation.phase() != Phase::Idle => {
                print_update(out, update)?;
            }
        }
    }

    while let Some(update) = conversation.next_reply().await {
        print_update(out, update)?;
    }
    conversation.close();
    Ok(())
}

// Failures are already logged by the conversation.
fn print_update<W: Write>(out: &mut W, update: Update) -> io::Result<()> {
    if let Update::Appended(message) = update {
        writeln!(out, "{}", render_block(&message))?;
    }
    Ok(())
}
