//! Full-round tests over turmoil's simulated network.
//!
//! The server host runs the production device handler; client hosts speak
//! the binary protocol. Moderator commands are scheduled on the server's
//! virtual clock.

use std::time::Duration;

use buzzer_core::{ControlCommand, ControllerConfig};
use buzzer_harness::SimServer;
use buzzer_proto::AnswerCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use turmoil::net::TcpStream;

const ADDR: &str = "0.0.0.0:8091";
const SERVER: &str = "server:8091";

fn config() -> ControllerConfig {
    ControllerConfig { countdown_ms: 200, open_ms: 500, ..Default::default() }
}

fn sim() -> turmoil::Sim<'static> {
    turmoil::Builder::new()
        .min_message_latency(Duration::from_millis(1))
        .max_message_latency(Duration::from_millis(1))
        .build()
}

/// Server host that starts the round at `start_after`.
fn host_server(sim: &mut turmoil::Sim<'static>, start_after: Duration) {
    sim.host("server", move || async move {
        let server = SimServer::bind(ADDR, config()).await?;
        server.schedule_command(start_after, ControlCommand::Start);
        server.serve().await?;
        Ok(())
    });
}

async fn register(stream: &mut TcpStream) -> std::io::Result<u32> {
    stream.write_all(&[1]).await?;
    let mut reply = [0u8; 5];
    stream.read_exact(&mut reply).await?;
    assert_eq!(reply[0], 1);
    Ok(u32::from_be_bytes([reply[1], reply[2], reply[3], reply[4]]))
}

async fn query_clock(stream: &mut TcpStream) -> std::io::Result<u32> {
    stream.write_all(&[0]).await?;
    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await?;
    Ok(u32::from_be_bytes(reply))
}

async fn answer(stream: &mut TcpStream, id: u32, elapsed: u32) -> std::io::Result<AnswerCode> {
    let mut frame = vec![3];
    frame.extend_from_slice(&id.to_be_bytes());
    frame.extend_from_slice(&elapsed.to_be_bytes());
    stream.write_all(&frame).await?;

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await?;
    assert_eq!(reply[0], 3);
    Ok(AnswerCode::from_u8(reply[1]).expect("known answer code"))
}

#[test]
fn synced_device_answers_in_open_window() {
    let mut sim = sim();
    host_server(&mut sim, Duration::from_millis(100));

    sim.client("device", async {
        let mut stream = TcpStream::connect(SERVER).await?;
        let id = register(&mut stream).await?;
        assert_eq!(id, 0);

        // Countdown ends 300ms after the epoch; answer well inside the window
        tokio::time::sleep(Duration::from_millis(400)).await;
        let now = query_clock(&mut stream).await?;
        assert_eq!(answer(&mut stream, id, now).await?, AnswerCode::Accepted);
        assert_eq!(answer(&mut stream, id, now).await?, AnswerCode::Rejected);
        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn skewed_device_is_adjusted() {
    let mut sim = sim();
    host_server(&mut sim, Duration::from_millis(100));

    sim.client("device", async {
        let mut stream = TcpStream::connect(SERVER).await?;
        let id = register(&mut stream).await?;

        tokio::time::sleep(Duration::from_millis(400)).await;
        let now = query_clock(&mut stream).await?;
        let code = answer(&mut stream, id, now + 5_000).await?;
        assert_eq!(code, AnswerCode::AcceptedClockAdjusted);
        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn late_answers_and_registrations_are_refused() {
    let mut sim = sim();
    host_server(&mut sim, Duration::from_millis(50));

    sim.client("device", async {
        let mut stream = TcpStream::connect(SERVER).await?;
        let id = register(&mut stream).await?;

        // Round closes at 50 + 200 + 500 = 750ms
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let now = query_clock(&mut stream).await?;
        assert_eq!(answer(&mut stream, id, now).await?, AnswerCode::Rejected);

        // Refused registration is silent; the clock reply comes next
        stream.write_all(&[1, 0]).await?;
        let mut reply = [0u8; 4];
        stream.read_exact(&mut reply).await?;
        assert!(u32::from_be_bytes(reply) >= 1_000);
        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn several_devices_get_dense_ids() {
    let mut sim = sim();
    host_server(&mut sim, Duration::from_secs(5));

    for i in 0..3u64 {
        sim.client(format!("device{i}"), async move {
            // Stagger connections so ids follow host order
            tokio::time::sleep(Duration::from_millis(10 * i)).await;
            let mut stream = TcpStream::connect(SERVER).await?;
            let id = register(&mut stream).await?;
            assert_eq!(u64::from(id), i);
            Ok(())
        });
    }

    sim.run().expect("simulation failed");
}
