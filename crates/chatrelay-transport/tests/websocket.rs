//! Integration tests for the WebSocket transport.
//!
//! These spin up a real WebSocket listener and client to verify that
//! records flow over the network as text frames.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use chatrelay_transport::{Connection, Transport, WebSocketTransport};
    use tokio::net::TcpStream;
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: &str) -> ClientWs {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        // "127.0.0.1:0" lets the OS pick a free port; local_addr tells us which.
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("addr").to_string();

        let server_handle = tokio::spawn(async move {
            let conn = transport.accept().await.expect("should accept");
            conn.handshake().await.expect("handshake should succeed");
            conn
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("task should complete");

        assert!(server_conn.id().into_inner() > 0);
        assert!(server_conn.peer_addr().ip().is_loopback());

        // --- Server sends, client receives a text frame ---
        server_conn
            .send(b"(12:00) Steve : hello")
            .await
            .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_text().unwrap().as_str(), "(12:00) Steve : hello");

        // --- Client sends, server receives ---
        client_ws
            .send(Message::Text("/connect Steve".into()))
            .await
            .unwrap();

        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"/connect Steve");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("addr").to_string();

        let server_handle = tokio::spawn(async move {
            let conn = transport.accept().await.expect("should accept");
            conn.handshake().await.expect("handshake should succeed");
            conn
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_pending_does_not_block() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("addr").to_string();

        let server_handle = tokio::spawn(async move {
            let conn = transport.accept().await.expect("should accept");
            conn.handshake().await.expect("handshake should succeed");
            conn
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn =
            std::sync::Arc::new(server_handle.await.unwrap());

        // Park a reader on the connection, then write from another task.
        let reader = std::sync::Arc::clone(&server_conn);
        let pending = tokio::spawn(async move { reader.recv().await });

        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            server_conn.send(b"ping"),
        )
        .await
        .expect("send must not wait for the pending recv")
        .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "ping");

        pending.abort();
    }

    #[tokio::test]
    async fn test_websocket_stalled_handshake_does_not_block_accept() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("addr").to_string();

        // Opens the socket but never sends the upgrade request.
        let _silent = TcpStream::connect(&addr).await.expect("should connect");
        let stalled = tokio::time::timeout(Duration::from_secs(2), transport.accept())
            .await
            .expect("accept must not wait for the upgrade")
            .expect("should accept");

        let server_handle = tokio::spawn(async move {
            let conn = transport.accept().await.expect("should accept");
            conn.handshake().await.expect("handshake should succeed");
            conn
        });
        let mut client_ws = tokio::time::timeout(Duration::from_secs(2), connect_client(&addr))
            .await
            .expect("second client must not wait behind the stalled one");
        let server_conn = server_handle.await.unwrap();

        server_conn.send(b"welcome").await.unwrap();
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "welcome");
        assert_ne!(stalled.id(), server_conn.id());

        stalled.close().await.expect("closing an unupgraded connection");
    }

    #[tokio::test]
    async fn test_websocket_recv_upgrades_on_first_use() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("addr").to_string();

        let server_handle = tokio::spawn(async move {
            let conn = transport.accept().await.expect("should accept");
            conn.recv().await.expect("recv should upgrade then read")
        });

        let mut client_ws = connect_client(&addr).await;
        client_ws
            .send(Message::Text("/cmdlist".into()))
            .await
            .unwrap();

        let received = server_handle.await.unwrap();
        assert_eq!(received.as_deref(), Some(&b"/cmdlist"[..]));
    }
}
