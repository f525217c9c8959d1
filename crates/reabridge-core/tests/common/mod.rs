#![allow(dead_code)]
//! Test harness utilities for reabridge-core integration tests.

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use reabridge_core::osc::codec::{decode, encode};
use reabridge_core::osc::{OscMessage, OscType};
use reabridge_core::{ControlConfig, ControlEngine};

pub const TIMEOUT: Duration = Duration::from_secs(2);

/// A UDP socket standing in for REAPER's OSC control surface.
pub struct FakeDaw {
    socket: UdpSocket,
}

impl FakeDaw {
    pub fn bind() -> Self {
        init_logging();
        let socket = UdpSocket::bind("127.0.0.1:0").expect("bind fake daw");
        socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .expect("set read timeout");
        Self { socket }
    }

    pub fn port(&self) -> u16 {
        self.socket.local_addr().expect("local addr").port()
    }

    /// Engine config pointing at this fake, listening on an ephemeral port.
    pub fn engine_config(&self) -> ControlConfig {
        ControlConfig {
            host: "127.0.0.1".to_string(),
            port: self.port(),
            listen_port: 0,
        }
    }

    /// Collect messages until `count` arrived or the timeout passed.
    pub fn recv_messages(&self, count: usize, timeout: Duration) -> Vec<OscMessage> {
        let start = Instant::now();
        let mut buf = [0u8; 4096];
        let mut out = Vec::new();
        while out.len() < count && start.elapsed() < timeout {
            if let Ok((n, _)) = self.socket.recv_from(&mut buf) {
                out.extend(decode(&buf[..n]).expect("decode outbound datagram"));
            }
        }
        out
    }

    /// Send a feedback message to the engine's listen socket.
    pub fn send_feedback(&self, engine: &ControlEngine, addr: &str, args: Vec<OscType>) {
        let bytes = encode(addr, args).expect("encode feedback");
        self.socket
            .send_to(&bytes, loopback_addr(engine))
            .expect("send feedback");
    }

    pub fn send_raw(&self, engine: &ControlEngine, bytes: &[u8]) {
        self.socket
            .send_to(bytes, loopback_addr(engine))
            .expect("send raw");
    }
}

/// Route `log` output through the test harness (`RUST_LOG=debug` to see it).
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The engine binds the wildcard address; reach it over loopback.
pub fn loopback_addr(engine: &ControlEngine) -> SocketAddr {
    let port = engine.local_addr().expect("engine connected").port();
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Poll `cond` until it holds or the timeout passes.
pub fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
