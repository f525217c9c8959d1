//! Socket lifecycle: bind with timeout, receive thread, shutdown.

use crate::config::ControlConfig;
use crate::error::{Error, Result};
use crate::osc::codec::MAX_DATAGRAM;
use crossbeam_channel::RecvTimeoutError;
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the receive loop wakes up to check for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Resolve the DAW's command endpoint.
pub(crate) fn resolve(config: &ControlConfig) -> Result<SocketAddr> {
    (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|e| Error::transport(&format!("cannot resolve {}:{}", config.host, config.port), e))?
        .next()
        .ok_or_else(|| {
            Error::Transport(format!("{}:{} resolved to no address", config.host, config.port))
        })
}

/// Resolves the target and binds the listen socket.
pub(crate) type Binder = fn(&ControlConfig) -> Result<(UdpSocket, SocketAddr)>;

pub(crate) fn bind(config: &ControlConfig) -> Result<(UdpSocket, SocketAddr)> {
    let target = resolve(config)?;
    let bind_addr = if target.is_ipv6() {
        format!("[::]:{}", config.listen_port)
    } else {
        format!("0.0.0.0:{}", config.listen_port)
    };
    let socket = UdpSocket::bind(&bind_addr)
        .map_err(|e| Error::transport(&format!("cannot bind {}", bind_addr), e))?;
    socket.set_read_timeout(Some(POLL_INTERVAL))?;
    Ok((socket, target))
}

/// A bound socket plus the thread draining it.
pub(crate) struct Connection {
    pub(crate) socket: Arc<UdpSocket>,
    pub(crate) target: SocketAddr,
    pub(crate) local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Connection {
    /// Bind and resolve on a helper thread, giving up after `timeout`.
    pub(crate) fn open<F>(
        config: &ControlConfig,
        timeout: Duration,
        binder: Binder,
        on_datagram: F,
    ) -> Result<Self>
    where
        F: Fn(&[u8]) -> bool + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let config = config.clone();
        thread::Builder::new()
            .name("reabridge-connect".to_string())
            .spawn(move || {
                // The receiver is gone if connect already timed out.
                let _ = tx.send(binder(&config));
            })?;

        let (socket, target) = match rx.recv_timeout(timeout) {
            Ok(result) => result?,
            Err(RecvTimeoutError::Timeout) => {
                return Err(Error::Transport(format!(
                    "connect timed out after {} ms",
                    timeout.as_millis()
                )))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::Transport("connect helper exited".to_string()))
            }
        };

        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = {
            let socket = socket.clone();
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name("reabridge-osc-recv".to_string())
                .spawn(move || receive_loop(&socket, &shutdown, on_datagram))?
        };

        log::info!("[OSC] listening on {}, sending to {}", local_addr, target);
        Ok(Self {
            socket,
            target,
            local_addr,
            shutdown,
            handle: Some(handle),
        })
    }

    /// Stop the receive thread and release the socket.
    pub(crate) fn close(self) {
        drop(self);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            // Closing from a listener runs on the receive thread itself.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        log::info!("[OSC] closed {}", self.local_addr);
    }
}

fn receive_loop<F>(socket: &UdpSocket, shutdown: &AtomicBool, on_datagram: F)
where
    F: Fn(&[u8]) -> bool,
{
    let mut buf = vec![0u8; MAX_DATAGRAM];
    while !shutdown.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                log::trace!("[OSC] {} bytes from {}", n, from);
                if !on_datagram(&buf[..n]) {
                    break;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => {
                log::debug!("[OSC] receive error: {}", e);
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
    log::debug!("[OSC] receive thread exiting");
}
