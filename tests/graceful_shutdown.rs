use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use live_match_back::{
    config::AppConfig,
    dao::{match_store::MemoryMatchStore, models::MatchEntity},
    server,
    state::AppState,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::oneshot,
    time::timeout,
};
use uuid::Uuid;

#[tokio::test]
async fn shutdown_completes_while_a_viewer_is_streaming() {
    let store = MemoryMatchStore::new();
    let record = MatchEntity::scheduled(
        "Riverside vs Hilltop",
        Uuid::new_v4(),
        Uuid::new_v4(),
        None,
        SystemTime::now(),
        90,
    );
    let match_id = record.id;
    store.insert_match(record).await;
    let state = AppState::with_store(AppConfig::default(), Arc::new(store));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(server::serve(listener, state, async move {
        let _ = stopped.await;
    }));

    let mut viewer = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET /matches/{match_id}/stream HTTP/1.1\r\n\
         Host: localhost\r\n\
         Accept: text/event-stream\r\n\r\n"
    );
    viewer.write_all(request.as_bytes()).await.unwrap();

    let mut received = Vec::new();
    let mut chunk = [0u8; 1024];
    while !String::from_utf8_lossy(&received).contains("event: connected") {
        let read = timeout(Duration::from_secs(3), viewer.read(&mut chunk))
            .await
            .expect("stream opened")
            .unwrap();
        assert!(read > 0, "stream closed before the connected event");
        received.extend_from_slice(&chunk[..read]);
    }
    assert!(String::from_utf8_lossy(&received).starts_with("HTTP/1.1 200 OK"));

    stop.send(()).unwrap();
    let finished = timeout(Duration::from_secs(3), server).await;
    assert!(matches!(finished, Ok(Ok(Ok(())))), "server did not drain");
    drop(viewer);
}
