//! End-to-end tests over real TCP sockets on the loopback interface.
//!
//! Each test binds a server on an ephemeral port, drives it with one or more
//! clients speaking length-prefixed frames, and bounds every step with a
//! timeout so a hung server fails the test instead of stalling it.

use std::{net::SocketAddr, time::Duration};

use bytes::Bytes;
use frontier_core::SystemEnv;
use frontier_proto::{
    AckEnvelope, Frame, Opcode, Payload,
    payloads::{CreateSemaphore, SetStageBinary, StageBinaryRequest, StageTransfer},
};
use frontier_server::{
    Server, ServerConfig,
    transport::{read_message, write_message},
};
use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};

const STEP: Duration = Duration::from_secs(5);
const MAX_FRAME: usize = 1024;

async fn spawn_server() -> SocketAddr {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        max_frame_bytes: MAX_FRAME,
        ..ServerConfig::default()
    };
    let server = Server::bind(config, SystemEnv).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

struct Client {
    stream: TcpStream,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = timeout(STEP, TcpStream::connect(addr)).await.unwrap().unwrap();
        Self { stream }
    }

    async fn send(&mut self, payload: Payload) {
        let frame = payload.into_frame().unwrap();
        timeout(STEP, write_message(&mut self.stream, &frame.encode())).await.unwrap().unwrap();
    }

    async fn recv(&mut self) -> Option<Payload> {
        let message = timeout(STEP, read_message(&mut self.stream, usize::MAX)).await.unwrap().unwrap()?;
        Some(Payload::decode(&message).unwrap())
    }

    async fn request(&mut self, payload: Payload) -> AckEnvelope {
        self.send(payload).await;
        match self.recv().await {
            Some(Payload::Ack(ack)) => ack,
            other => panic!("expected ACK, got {other:?}"),
        }
    }
}

fn create_acquire(ack_handle: u32, id: &str) -> Payload {
    Payload::CreateAcquireSemaphore(CreateSemaphore {
        ack_handle,
        unk0: 0,
        max_holders: 1,
        id: id.to_owned(),
    })
}

fn enter(ack_handle: u32, id: &str) -> Payload {
    Payload::EnterStage(StageTransfer { ack_handle, unk0: 0, stage_id: id.to_owned() })
}

#[tokio::test]
async fn enter_stage_and_acquire() {
    let addr = spawn_server().await;
    let mut client = Client::connect(addr).await;

    let entered = client.request(enter(3, "sl1Ns200p0a0u0")).await;
    assert_eq!(entered, AckEnvelope::simple_succeed(3, &[0; 4]));

    let granted = client.request(create_acquire(4, "hs_party")).await;
    assert!(granted.is_success());
    assert_eq!(granted.handle, 4);
    assert_ne!(&granted.payload[..], &[0; 4]);
}

#[tokio::test]
async fn disconnect_releases_semaphore() {
    let addr = spawn_server().await;

    let mut first = Client::connect(addr).await;
    assert!(first.request(create_acquire(1, "hs_party")).await.is_success());

    let mut second = Client::connect(addr).await;
    assert!(!second.request(create_acquire(2, "hs_party")).await.is_success());

    drop(first);

    // Cleanup runs on the server's connection task; poll until it lands.
    let released = timeout(STEP, async {
        let mut handle = 3;
        loop {
            if second.request(create_acquire(handle, "hs_party")).await.is_success() {
                break;
            }
            handle += 1;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "semaphore never released after disconnect");
}

#[tokio::test]
async fn stage_binary_wait_across_clients() {
    let addr = spawn_server().await;
    let mut host = Client::connect(addr).await;
    let mut guest = Client::connect(addr).await;

    assert!(host.request(enter(1, "sl2Qs1")).await.is_success());
    assert!(guest.request(enter(1, "sl2Qs1")).await.is_success());

    guest
        .send(Payload::WaitStageBinary(StageBinaryRequest {
            ack_handle: 7,
            binary_type0: 1,
            binary_type1: 2,
            stage_id: "sl2Qs1".to_owned(),
        }))
        .await;

    host.send(Payload::SetStageBinary(SetStageBinary {
        binary_type0: 1,
        binary_type1: 2,
        stage_id: "sl2Qs1".to_owned(),
        data: Bytes::from_static(b"party"),
    }))
    .await;

    match guest.recv().await {
        Some(Payload::Ack(ack)) => {
            assert_eq!(ack, AckEnvelope::buffer_succeed(7, Bytes::from_static(b"party")));
        },
        other => panic!("expected stage binary, got {other:?}"),
    }
}

#[tokio::test]
async fn oversize_frame_closes_connection() {
    let addr = spawn_server().await;
    let mut client = Client::connect(addr).await;

    let size = u32::try_from(MAX_FRAME + 1).unwrap();
    client.stream.write_all(&size.to_be_bytes()).await.unwrap();
    client.stream.flush().await.unwrap();

    assert_eq!(client.recv().await, None);
}

#[tokio::test]
async fn malformed_body_closes_connection() {
    let addr = spawn_server().await;
    let mut client = Client::connect(addr).await;

    // ACQUIRE_SEMAPHORE with half a handle
    let frame = Frame::new(Opcode::AcquireSemaphore, Bytes::from_static(&[0, 0]));
    write_message(&mut client.stream, &frame.encode()).await.unwrap();

    assert_eq!(client.recv().await, None);
}
