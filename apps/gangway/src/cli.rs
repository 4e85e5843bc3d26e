use anyhow::Result;
use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "gangway")]
#[command(about = "Serial console to network bridge")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Attach to a running bridge as a terminal viewer
    Attach {
        /// Bridge viewer endpoint
        #[arg(short, long, default_value = "ws://localhost:8080/ws")]
        url: String,
    },
}

/// Interactive viewer: binary frames (replay first, then live serial
/// output) stream to stdout, stdin lines go back as text frames.
pub async fn run_attach(url: String) -> Result<()> {
    debug!("connecting to {}", url);
    let (ws_stream, _) = match timeout(Duration::from_secs(5), connect_async(&url)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            return Err(anyhow::anyhow!("connection failed: {}", e));
        }
        Err(_) => {
            return Err(anyhow::anyhow!(
                "connection timeout - is the bridge running?"
            ));
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Binary(data))) => {
                    stdout.write_all(&data).await?;
                    stdout.flush().await?;
                }
                Some(Ok(Message::Close(close))) => {
                    if let Some(close) = close {
                        eprintln!("bridge closed the session: {}", close.reason);
                    }
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(anyhow::anyhow!("socket error: {}", e)),
                None => break,
            },
            line = lines.next_line() => match line? {
                Some(mut line) => {
                    line.push('\n');
                    write.send(Message::Text(line.into())).await?;
                }
                None => break,
            },
        }
    }
    Ok(())
}
