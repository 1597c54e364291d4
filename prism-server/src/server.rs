use crate::router;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use prism_core::ipc::{PrismRequest, PrismResponse};
use prism_core::{PrismConfig, Store};
use std::path::Path;
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

/// Frames are a 4-byte little-endian length prefix followed by a MessagePack payload.
fn le_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder().little_endian().new_codec()
}

pub async fn run_unix_server(
    socket_path: &str,
    store: Arc<dyn Store>,
    config: PrismConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)?;
    tracing::info!("IPC server listening on {}", socket_path);

    let config = Arc::new(config);
    loop {
        tokio::select! {
            res = listener.accept() => {
                let (stream, _) = res?;
                let store = store.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    serve_connection(stream, store, config).await;
                });
            }
            _ = shutdown.recv() => {
                tracing::info!("Shutting down IPC server...");
                break;
            }
        }
    }

    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }

    Ok(())
}

async fn serve_connection(stream: UnixStream, store: Arc<dyn Store>, config: Arc<PrismConfig>) {
    let (read, write) = stream.into_split();
    let mut framed_read = FramedRead::new(read, le_codec());
    let mut framed_write = FramedWrite::new(write, le_codec());

    while let Some(frame) = framed_read.next().await {
        let bytes_mut = match frame {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("Frame error: {}", e);
                break;
            }
        };

        let response = match rmp_serde::from_slice::<PrismRequest>(&bytes_mut) {
            Ok(request) => router::handle_request(request, store.as_ref(), &config).await,
            Err(e) => PrismResponse::err_kind(
                prism_core::ipc::ErrorKind::InvalidArgument,
                format!("Deserialization error: {}", e),
            ),
        };

        match rmp_serde::to_vec_named(&response) {
            Ok(resp_bytes) => {
                if let Err(e) = framed_write.send(Bytes::from(resp_bytes)).await {
                    tracing::error!("Failed to send response: {}", e);
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize response: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::MemoryStore;

    async fn roundtrip<T: serde::Serialize>(socket_path: &str, request: &T) -> PrismResponse {
        let stream = UnixStream::connect(socket_path).await.unwrap();
        let (read, write) = stream.into_split();
        let mut framed_read = FramedRead::new(read, le_codec());
        let mut framed_write = FramedWrite::new(write, le_codec());

        let payload = rmp_serde::to_vec_named(request).unwrap();
        framed_write.send(Bytes::from(payload)).await.unwrap();
        let frame = framed_read.next().await.unwrap().unwrap();
        rmp_serde::from_slice(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_socket_ping_and_bad_payload() {
        let socket_path = format!("/tmp/prism-test-{}.sock", std::process::id());
        let (tx, _rx) = broadcast::channel(1);
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());

        let server_path = socket_path.clone();
        let shutdown = tx.subscribe();
        let handle = tokio::spawn(async move {
            run_unix_server(&server_path, store, PrismConfig::in_memory(), shutdown).await
        });

        // wait for bind
        for _ in 0..50 {
            if Path::new(&socket_path).exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let pong = roundtrip(&socket_path, &PrismRequest::Ping).await;
        assert!(pong.is_ok());

        let bad = roundtrip(&socket_path, &serde_json::json!({"action": "teleport"})).await;
        assert!(!bad.is_ok());
        assert!(bad.error.unwrap().contains("Deserialization error"));

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert!(!Path::new(&socket_path).exists());
    }
}
