//! End-to-end uploads over loopback TCP.

use file_sync::client::TransferSession;
use file_sync::server::path::today;
use file_sync::server::Server;
use file_sync::verify::{checksum_file, Verifier};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

async fn start_server(root: &Path) -> anyhow::Result<String> {
    let server = Server::bind_addr(
        "127.0.0.1:0",
        root.to_path_buf(),
        Verifier::new(Duration::from_millis(10)),
    )
    .await?;
    let addr = server.local_addr()?.to_string();
    tokio::spawn(server.run());
    Ok(addr)
}

fn dated(dir: &Path, ext: &str) -> PathBuf {
    dir.join(format!("{}{}", today().format("%Y-%m-%d"), ext))
}

/// The client returns once its bytes are sent; the server may still be
/// writing. Poll until the file holds `expected`.
async fn wait_for_contents(path: &Path, expected: &[u8]) -> anyhow::Result<()> {
    for _ in 0..200 {
        if let Ok(data) = fs::read(path) {
            if data == expected {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    anyhow::bail!("{} never held the expected contents", path.display())
}

#[tokio::test]
async fn test_round_trip() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let root = tmp.path().join("root");
    fs::create_dir_all(root.join("sub"))?;
    let addr = start_server(&root).await?;

    let source = tmp.path().join("a.txt");
    fs::write(&source, "hello")?;

    let sent = TransferSession::new(&source, "sub").upload(&addr).await?;
    assert_eq!(sent, 5);

    let saved = dated(&root.join("sub"), ".txt");
    wait_for_contents(&saved, b"hello").await?;

    let digest = checksum_file(&saved).await?;
    assert_eq!(digest, blake3::hash(b"hello").to_hex().to_string());

    Ok(())
}

#[tokio::test]
async fn test_same_day_upload_overwrites() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let root = tmp.path().join("root");
    fs::create_dir_all(root.join("daily"))?;
    let addr = start_server(&root).await?;

    let first = tmp.path().join("first.csv");
    let second = tmp.path().join("second.csv");
    fs::write(&first, "a,b,c\n1,2,3\n4,5,6\n")?;
    fs::write(&second, "x,y\n")?;

    let saved = dated(&root.join("daily"), ".csv");

    TransferSession::new(&first, "daily").upload(&addr).await?;
    wait_for_contents(&saved, b"a,b,c\n1,2,3\n4,5,6\n").await?;

    TransferSession::new(&second, "daily").upload(&addr).await?;
    wait_for_contents(&saved, b"x,y\n").await?;

    assert_eq!(fs::read_dir(root.join("daily"))?.count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_traversal_rejected_and_server_keeps_serving() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let root = tmp.path().join("a").join("root");
    fs::create_dir_all(&root)?;
    let addr = start_server(&root).await?;

    let source = tmp.path().join("evil.txt");
    fs::write(&source, "owned")?;

    // The client cannot tell; the server drops the connection
    TransferSession::new(&source, "../../etc").upload(&addr).await.ok();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!tmp.path().join("etc").exists());
    assert_eq!(fs::read_dir(&root)?.count(), 0);

    TransferSession::new(&source, "").upload(&addr).await?;
    wait_for_contents(&dated(&root, ".txt"), b"owned").await?;

    Ok(())
}

#[tokio::test]
async fn test_concurrent_uploads() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let root = tmp.path().join("root");
    let addr = start_server(&root).await?;

    const CLIENTS: usize = 8;
    let mut tasks = Vec::new();
    for i in 0..CLIENTS {
        fs::create_dir_all(root.join(format!("client-{}", i)))?;

        let source = tmp.path().join(format!("upload-{}.bin", i));
        let body: Vec<u8> = (0..(64 * 1024 + i)).map(|b| (b * (i + 1)) as u8).collect();
        fs::write(&source, &body)?;

        let addr = addr.clone();
        tasks.push(tokio::spawn(async move {
            TransferSession::new(&source, format!("client-{}", i))
                .upload(&addr)
                .await
                .map(|_| body)
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let body = task.await??;
        let saved = dated(&root.join(format!("client-{}", i)), ".bin");
        wait_for_contents(&saved, &body).await?;
    }

    Ok(())
}

#[tokio::test]
async fn test_missing_destination_dir_saves_nothing() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let root = tmp.path().join("root");
    let addr = start_server(&root).await?;

    let source = tmp.path().join("a.txt");
    fs::write(&source, "data")?;

    TransferSession::new(&source, "not-created").upload(&addr).await.ok();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!root.join("not-created").exists());
    Ok(())
}
