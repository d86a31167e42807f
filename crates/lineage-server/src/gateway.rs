//! Client gateway: newline-delimited JSON over TCP.
//!
//! Each line from a client is one [`ClientMessage`]; each line to a client is
//! one serialized server event. Connections only forward messages to the
//! simulation, which owns all game state.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::simulation::SimCommand;

const CONNECTION_ID_LEN: usize = 20;
/// Longest accepted input line, in bytes.
const MAX_LINE: usize = 16 * 1024;

/// Messages a client may send, as `{"type": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    Move { dx: f32, dy: f32 },
    Eat,
    PickUp,
    Drop,
    DropBackpack,
    AddToBackpack,
    TakeFromBackpack,
    Use,
    Shoot { angle: f32 },
    Chat(String),
    NameBaby { baby_id: String, name: String },
    RequestBirth,
    RequestReconnect { session_token: Option<String> },
}

/// Outgoing lines for one connection.
pub type Outbox = mpsc::UnboundedSender<Arc<str>>;

fn connection_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CONNECTION_ID_LEN)
        .map(char::from)
        .collect()
}

/// Accept clients until the simulation goes away.
pub async fn run(listener: TcpListener, commands: mpsc::Sender<SimCommand>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let id = connection_id();
                debug!(%peer, %id, "client connected");
                let commands = commands.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &id, &commands).await {
                        debug!(%id, "connection closed: {e}");
                    }
                    let _ = commands.send(SimCommand::Disconnect { id }).await;
                });
            }
            Err(e) => {
                warn!("accept error: {e}");
            }
        }
        if commands.is_closed() {
            info!("gateway stopped");
            return;
        }
    }
}

/// Read one newline-terminated line into `buf`, reading at most
/// [`MAX_LINE`] bytes plus the terminator. `Ok(false)` at end of stream.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let n = (&mut *reader).take(MAX_LINE as u64 + 1).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(false);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    } else if n > MAX_LINE {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "line too long"));
    }
    Ok(true)
}

async fn handle_connection(
    stream: TcpStream,
    id: &str,
    commands: &mpsc::Sender<SimCommand>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (read, mut write) = stream.into_split();
    let (outbox, mut lines_out) = mpsc::unbounded_channel::<Arc<str>>();

    commands
        .send(SimCommand::Connect {
            id: id.to_string(),
            outbox,
        })
        .await?;

    tokio::spawn(async move {
        while let Some(line) = lines_out.recv().await {
            if write.write_all(line.as_bytes()).await.is_err() || write.write_all(b"\n").await.is_err() {
                break;
            }
        }
        let _ = write.shutdown().await;
    });

    let mut reader = BufReader::new(read);
    let mut buf = Vec::new();
    while read_line(&mut reader, &mut buf).await? {
        let line = std::str::from_utf8(&buf)?.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ClientMessage>(line) {
            Ok(message) => {
                commands
                    .send(SimCommand::Client {
                        id: id.to_string(),
                        message,
                    })
                    .await?;
            }
            Err(e) => debug!(%id, "ignoring malformed message: {e}"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> ClientMessage {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn unit_messages_need_no_data() {
        assert_eq!(parse(r#"{"type":"eat"}"#), ClientMessage::Eat);
        assert_eq!(parse(r#"{"type":"pickUp"}"#), ClientMessage::PickUp);
        assert_eq!(parse(r#"{"type":"requestBirth"}"#), ClientMessage::RequestBirth);
    }

    #[test]
    fn payload_messages() {
        assert_eq!(
            parse(r#"{"type":"move","data":{"dx":1.5,"dy":-2}}"#),
            ClientMessage::Move { dx: 1.5, dy: -2.0 }
        );
        assert_eq!(
            parse(r#"{"type":"chat","data":"hello"}"#),
            ClientMessage::Chat("hello".into())
        );
        assert_eq!(
            parse(r#"{"type":"nameBaby","data":{"babyId":"b1","name":"ada"}}"#),
            ClientMessage::NameBaby {
                baby_id: "b1".into(),
                name: "ada".into()
            }
        );
        assert_eq!(
            parse(r#"{"type":"requestReconnect","data":{"sessionToken":"session_1_x"}}"#),
            ClientMessage::RequestReconnect {
                session_token: Some("session_1_x".into())
            }
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"fly"}"#).is_err());
    }

    #[tokio::test]
    async fn lines_are_bounded() {
        let mut buf = Vec::new();
        let mut reader = BufReader::new(&b"first\r\n\nlast"[..]);
        assert!(read_line(&mut reader, &mut buf).await.unwrap());
        assert_eq!(buf, b"first\r");
        assert!(read_line(&mut reader, &mut buf).await.unwrap());
        assert!(buf.is_empty());
        assert!(read_line(&mut reader, &mut buf).await.unwrap());
        assert_eq!(buf, b"last");
        assert!(!read_line(&mut reader, &mut buf).await.unwrap());

        let mut exact = vec![b'a'; MAX_LINE];
        exact.push(b'\n');
        let mut reader = BufReader::new(&exact[..]);
        assert!(read_line(&mut reader, &mut buf).await.unwrap());
        assert_eq!(buf.len(), MAX_LINE);

        let long = vec![b'a'; MAX_LINE + 1];
        let mut reader = BufReader::new(&long[..]);
        let err = read_line(&mut reader, &mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn oversized_line_drops_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        tokio::spawn(run(listener, tx));

        let mut client = TcpStream::connect(addr).await.unwrap();
        let Some(SimCommand::Connect { outbox, .. }) = rx.recv().await else {
            panic!("expected a connect");
        };
        drop(outbox);

        let _ = client.write_all(&vec![b'x'; MAX_LINE * 2]).await;
        let next = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert!(matches!(next, Some(SimCommand::Disconnect { .. })));
    }

    #[test]
    fn connection_ids_are_alphanumeric() {
        let id = connection_id();
        assert_eq!(id.len(), CONNECTION_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
