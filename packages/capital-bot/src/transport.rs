//! Chat transports.
//!
//! A transport delivers incoming text messages and sends replies to them.
//! The shipped one reads lines from stdin and writes replies to stdout.

use anyhow::{Context, Result};
use async_trait::async_trait;
use country_knowledge::QueryHandler;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tracing::{debug, info};

/// One incoming text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub id: u64,
    pub text: String,
}

#[async_trait]
pub trait ChatTransport: Send {
    /// Next text message, or `None` when the conversation is over.
    async fn next_message(&mut self) -> Result<Option<IncomingMessage>>;

    /// Reply to a previously received message.
    async fn reply(&mut self, message_id: u64, text: &str) -> Result<()>;

    fn name(&self) -> &str;
}

/// Line-oriented transport: each non-empty input line is a message.
pub struct LineTransport<R, W> {
    lines: Lines<R>,
    output: W,
    next_id: u64,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            lines: input.lines(),
            output,
            next_id: 1,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

/// Console transport over the process's stdin and stdout.
pub type StdioTransport = LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdioTransport {
    pub fn stdio() -> Self {
        LineTransport::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

#[async_trait]
impl<R, W> ChatTransport for LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn next_message(&mut self) -> Result<Option<IncomingMessage>> {
        while let Some(line) = self.lines.next_line().await.context("failed to read input")? {
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            return Ok(Some(IncomingMessage {
                id,
                text: text.to_string(),
            }));
        }
        Ok(None)
    }

    async fn reply(&mut self, message_id: u64, text: &str) -> Result<()> {
        debug!(message_id, "Sending reply");
        self.output
            .write_all(format!("{}\n\n", text).as_bytes())
            .await
            .context("failed to write reply")?;
        self.output.flush().await.context("failed to flush reply")?;
        Ok(())
    }

    fn name(&self) -> &str {
        "lines"
    }
}

/// Answer messages until the transport runs dry.
pub async fn run(transport: &mut dyn ChatTransport, handler: &QueryHandler) -> Result<u64> {
    info!(transport = %transport.name(), "Waiting for messages");

    let mut answered = 0;
    while let Some(message) = transport.next_message().await? {
        let reply = handler.handle_query(&message.text).await;
        transport.reply(message.id, &reply).await?;
        answered += 1;
    }

    info!(answered, "Transport closed");
    Ok(answered)
}
