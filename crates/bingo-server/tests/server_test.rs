//! TCP round trip through a live coordinator.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use bingo_proto::{Message, frame, frame::FrameBuffer};
use bingo_server::{Server, ServerRuntimeConfig};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

struct Client {
    stream: TcpStream,
    frames: FrameBuffer,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        Self { stream: TcpStream::connect(addr).await.unwrap(), frames: FrameBuffer::new() }
    }

    async fn send(&mut self, message: &Message) {
        let mut buf = Vec::new();
        frame::encode(message, &mut buf).unwrap();
        self.stream.write_all(&buf).await.unwrap();
    }

    async fn recv(&mut self) -> Message {
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(message) = self.frames.next_message().unwrap() {
                return message;
            }
            let n = timeout(Duration::from_secs(5), self.stream.read(&mut chunk))
                .await
                .unwrap()
                .unwrap();
            assert!(n > 0, "server closed the connection");
            self.frames.extend(&chunk[..n]);
        }
    }

    /// Receive until a message of the same kind as `like` arrives.
    async fn recv_kind(&mut self, like: &Message) -> Message {
        loop {
            let message = self.recv().await;
            if message.kind() == like.kind() {
                return message;
            }
        }
    }
}

async fn spawn_server() -> std::net::SocketAddr {
    let config =
        ServerRuntimeConfig { bind_address: "127.0.0.1:0".to_string(), ..Default::default() };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

#[tokio::test]
async fn two_clients_start_and_relay() {
    let addr = spawn_server().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;

    alice.send(&Message::Join { participant: "alice".into(), session: "t".into() }).await;
    let members = alice.recv().await;
    assert_eq!(members, Message::Members { session: "t".into(), participants: vec!["alice".into()] });

    bob.send(&Message::Join { participant: "bob".into(), session: "t".into() }).await;
    let both =
        Message::Members { session: "t".into(), participants: vec!["alice".into(), "bob".into()] };
    assert_eq!(alice.recv().await, both);
    assert_eq!(bob.recv().await, both);

    alice.send(&Message::Ready { participant: "alice".into(), session: "t".into() }).await;
    bob.send(&Message::Ready { participant: "bob".into(), session: "t".into() }).await;

    let probe = Message::Start { session: "t".into(), first_turn: "alice".into() };
    let a_start = alice.recv_kind(&probe).await;
    let b_start = bob.recv_kind(&probe).await;
    assert_eq!(a_start, b_start);

    let Message::Start { first_turn, .. } = a_start else { unreachable!() };
    let (caller, other) = if first_turn.as_str() == "alice" {
        (&mut alice, &mut bob)
    } else {
        (&mut bob, &mut alice)
    };

    let call = Message::Call { participant: first_turn, session: "t".into(), number: 13, lines: 0 };
    caller.send(&call).await;
    assert_eq!(other.recv().await, call);
    assert_eq!(caller.recv().await, call);
}

#[tokio::test]
async fn disconnect_is_announced() {
    let addr = spawn_server().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;

    alice.send(&Message::Join { participant: "alice".into(), session: "u".into() }).await;
    alice.recv().await;
    bob.send(&Message::Join { participant: "bob".into(), session: "u".into() }).await;
    alice.recv().await;
    bob.recv().await;

    drop(bob);

    assert_eq!(
        alice.recv().await,
        Message::Left { session: "u".into(), participant: "bob".into() }
    );
}

#[tokio::test]
async fn full_room_closes_connection() {
    let addr = spawn_server().await;
    let mut clients = Vec::new();
    for name in ["alice", "bob"] {
        let mut client = Client::connect(addr).await;
        client.send(&Message::Join { participant: name.into(), session: "v".into() }).await;
        client.recv().await;
        clients.push(client);
    }

    let mut carol = Client::connect(addr).await;
    carol.send(&Message::Join { participant: "carol".into(), session: "v".into() }).await;

    let mut chunk = [0u8; 64];
    let n = timeout(Duration::from_secs(5), carol.stream.read(&mut chunk)).await.unwrap().unwrap();
    assert_eq!(n, 0);
}
