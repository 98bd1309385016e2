use std::time::Duration;

use smtp_fixture::{ServerConfig, SmtpServer};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Client {
    stream: BufReader<TcpStream>,
}

impl Client {
    async fn connect(server: &SmtpServer) -> Self {
        let stream = TcpStream::connect(server.local_addr())
            .await
            .expect("connect to server");
        let mut client = Self {
            stream: BufReader::new(stream),
        };
        let greeting = client.read_reply().await;
        assert!(greeting.starts_with("220 "), "greeting: {:?}", greeting);
        client
    }

    async fn read_reply(&mut self) -> String {
        let mut line = String::new();
        tokio::time::timeout(TIMEOUT, self.stream.read_line(&mut line))
            .await
            .expect("reply timeout")
            .expect("read reply");
        line
    }

    async fn send(&mut self, line: &str) {
        self.stream
            .get_mut()
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .expect("send line");
    }

    /// Send a command and return its reply
    async fn command(&mut self, line: &str) -> String {
        self.send(line).await;
        self.read_reply().await
    }

    async fn send_mail(&mut self, subject: &str, body: &[&str]) {
        assert_eq!(self.command("EHLO client.test").await, "250 OK\r\n");
        assert_eq!(self.command("MAIL FROM:<a@example.com>").await, "250 OK\r\n");
        assert_eq!(self.command("RCPT TO:<b@example.com>").await, "250 OK\r\n");
        assert!(self.command("DATA").await.starts_with("354 "));

        self.send(&format!("Subject: {}", subject)).await;
        self.send("").await;
        for line in body {
            self.send(line).await;
        }
        assert_eq!(self.command(".").await, "250 OK\r\n");
        assert_eq!(self.command("QUIT").await, "250 OK\r\n");
    }
}

async fn start() -> SmtpServer {
    SmtpServer::start(ServerConfig::new(0))
        .await
        .expect("start server")
}

async fn stop(server: &mut SmtpServer) {
    tokio::time::timeout(TIMEOUT, server.stop())
        .await
        .expect("stop timeout")
        .expect("stop server");
}

#[tokio::test]
async fn start_then_stop_without_clients() {
    let mut server = start().await;
    assert!(server.is_running());
    assert!(!server.is_stopped());

    stop(&mut server).await;

    assert!(server.is_stopped());
    assert!(!server.is_running());
    assert_eq!(server.received_message_count(), 0);
    assert!(server.received_messages().is_empty());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let mut server = start().await;
    stop(&mut server).await;
    stop(&mut server).await;
    assert!(server.is_stopped());
}

#[tokio::test]
async fn receives_single_message() {
    let mut server = start().await;

    let mut client = Client::connect(&server).await;
    client.send_mail("hi", &["body text"]).await;

    stop(&mut server).await;

    let messages = server.received_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].lines, ["Subject: hi", "body text"]);
    assert_eq!(messages[0].header("Subject"), Some("hi"));
    assert_eq!(messages[0].body(), "body text");
}

#[tokio::test]
async fn keeps_messages_in_arrival_order() {
    let mut server = start().await;

    for subject in ["first", "second", "third"] {
        let mut client = Client::connect(&server).await;
        client.send_mail(subject, &["line one", "line two"]).await;
    }

    stop(&mut server).await;

    let subjects: Vec<_> = server
        .received_messages()
        .iter()
        .map(|message| message.header("subject").unwrap_or_default().to_string())
        .collect();
    assert_eq!(subjects, ["first", "second", "third"]);
}

#[tokio::test]
async fn protocol_errors_do_not_drop_the_connection() {
    let mut server = start().await;

    let mut client = Client::connect(&server).await;
    assert_eq!(
        client.command("DATA").await,
        "503 Bad sequence of commands: DATA\r\n"
    );
    assert_eq!(client.command("FOO").await, "500 Command not recognized\r\n");
    assert_eq!(client.command("VRFY someone").await, "252 Not supported\r\n");
    assert_eq!(client.command("HELP").await, "211 No help available\r\n");
    assert_eq!(client.command("NOOP").await, "250 OK\r\n");
    client.send_mail("after errors", &["ok"]).await;

    stop(&mut server).await;

    let messages = server.received_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].header("Subject"), Some("after errors"));
}

#[tokio::test]
async fn disconnect_keeps_partial_message() {
    let mut server = start().await;

    let mut client = Client::connect(&server).await;
    assert_eq!(client.command("HELO client.test").await, "250 OK\r\n");
    assert_eq!(client.command("MAIL FROM:<a@example.com>").await, "250 OK\r\n");
    assert_eq!(client.command("RCPT TO:<b@example.com>").await, "250 OK\r\n");
    assert!(client.command("DATA").await.starts_with("354 "));
    client.send("Subject: interrupted").await;
    drop(client);

    stop(&mut server).await;

    let messages = server.received_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].lines, ["Subject: interrupted"]);
}

#[tokio::test]
async fn stop_waits_for_session_in_progress() {
    let server = start().await;
    let mut client = Client::connect(&server).await;

    let stopping = tokio::spawn(async move {
        let mut server = server;
        stop(&mut server).await;
        server
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!stopping.is_finished());

    client.send_mail("late", &["still accepted"]).await;
    drop(client);

    let server = tokio::time::timeout(TIMEOUT, stopping)
        .await
        .expect("stop timeout")
        .expect("stop task");

    assert!(server.is_stopped());
    assert_eq!(server.received_message_count(), 1);
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").expect("bind port");
    let addr = taken.local_addr().expect("local addr");

    let result = SmtpServer::start(ServerConfig::with_bind(addr)).await;
    assert!(result.is_err());
}
