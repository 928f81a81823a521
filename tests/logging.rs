//! Log sink installation. Kept in its own test binary since the
//! subscriber is process-global.

use std::time::Duration;

use hybi::Server;

#[tokio::test]
async fn test_log_file_receives_server_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hybi.log");

    let config = hybi::Config::new("127.0.0.1", "0")
        .unwrap()
        .with_log_file(&path);
    let mut server = Server::with_config(config);
    server.init_logging().unwrap();
    // A second install is a no-op.
    hybi::logging::init(None).unwrap();

    server.log("custom log line");
    let addr = server.run().await.unwrap().local_addr();
    assert!(server.shutdown().await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("custom log line"), "log was: {contents}");
    assert!(contents.contains("listening"), "log was: {contents}");
    assert!(contents.contains(&addr.to_string()), "log was: {contents}");
}

#[test]
fn test_unwritable_log_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("hybi.log");
    assert!(matches!(
        hybi::logging::init(Some(&path)),
        Err(hybi::Error::Io(_))
    ));
}
