//! Control engine: socket lifecycle, canonical state, commands and fan-out.
//!
//! Inbound datagrams are handled one at a time under a single lock:
//! decode, merge into the snapshot, then notify listeners. The snapshot's
//! write lock is released before listeners run, so [`ControlEngine::get_state`]
//! never waits on a slow listener. A datagram fed in by a listener while it
//! is being notified is queued and handled right after the current one.
//!
//! Connection setup is serialized on its own lock; the socket slot is only
//! locked briefly, so commands and status queries never wait on a connect.
//!
//! Outbound commands are validated locally before anything touches the
//! network. When the engine is not connected, sends go out through a
//! one-shot socket unless [`SendPolicy::RequireConnection`] is set.

mod connection;
mod listeners;
mod sink;

pub use listeners::{Listener, Subscription};
pub use sink::{DatagramSink, OneShotSink};

use crate::config::{ConfigUpdate, ControlConfig};
use crate::error::{Error, Result};
use crate::osc::codec::{decode, encode_message};
use crate::osc::Command;
use crate::state::{ReaperState, StateManager};
use connection::{Binder, Connection};
use crossbeam_channel::{Receiver, TrySendError};
use listeners::ListenerRegistry;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// What to do with a command while no socket is bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SendPolicy {
    /// Send through a throwaway ephemeral socket.
    #[default]
    OneShotFallback,
    /// Reject the command with a transport error.
    RequireConnection,
}

struct Inner {
    config: RwLock<ControlConfig>,
    state: StateManager,
    listeners: Arc<ListenerRegistry>,
    connection: Mutex<Option<Connection>>,
    connecting: Mutex<()>,
    inbound: Mutex<()>,
    dispatcher: Mutex<Option<ThreadId>>,
    deferred: Mutex<VecDeque<Vec<u8>>>,
    sink: Option<Arc<dyn DatagramSink>>,
    policy: SendPolicy,
    binder: Binder,
}

impl Inner {
    fn handle_datagram(&self, datagram: &[u8]) -> bool {
        let me = thread::current().id();
        {
            let dispatcher = self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner);
            if *dispatcher == Some(me) {
                // Re-entered from a listener: runs after the current datagram.
                self.deferred
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_back(datagram.to_vec());
                return false;
            }
        }

        let _serial = self.inbound.lock().unwrap_or_else(PoisonError::into_inner);
        *self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(me);
        let mut changed = self.process(datagram);
        loop {
            let next = self
                .deferred
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            match next {
                Some(queued) => changed |= self.process(&queued),
                None => break,
            }
        }
        *self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner) = None;
        changed
    }

    fn process(&self, datagram: &[u8]) -> bool {
        let messages = match decode(datagram) {
            Ok(messages) => messages,
            Err(e) => {
                log::debug!("[ENGINE] dropping datagram: {}", e);
                return false;
            }
        };

        let mut changed = false;
        for msg in &messages {
            if let Some(snapshot) = self.state.apply(msg) {
                changed = true;
                log::trace!("[ENGINE] {} changed state", msg.addr);
                self.listeners.notify(&snapshot);
            }
        }
        changed
    }

    fn take_connection(&self) -> Option<Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(conn) = self.take_connection() {
            conn.close();
        }
    }
}

/// Builder for a [`ControlEngine`] with a custom sink or send policy.
pub struct ControlEngineBuilder {
    config: ControlConfig,
    sink: Option<Arc<dyn DatagramSink>>,
    policy: SendPolicy,
    binder: Binder,
}

impl ControlEngineBuilder {
    /// Route every outbound datagram through `sink` instead of a UDP socket.
    pub fn sink(mut self, sink: Arc<dyn DatagramSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn send_policy(mut self, policy: SendPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[cfg(test)]
    pub(crate) fn binder(mut self, binder: Binder) -> Self {
        self.binder = binder;
        self
    }

    pub fn build(self) -> Result<ControlEngine> {
        self.config.validate()?;
        Ok(ControlEngine {
            inner: Arc::new(Inner {
                config: RwLock::new(self.config),
                state: StateManager::new(),
                listeners: Arc::new(ListenerRegistry::default()),
                connection: Mutex::new(None),
                connecting: Mutex::new(()),
                inbound: Mutex::new(()),
                dispatcher: Mutex::new(None),
                deferred: Mutex::new(VecDeque::new()),
                sink: self.sink,
                policy: self.policy,
                binder: self.binder,
            }),
        })
    }
}

/// Owner of the DAW connection and the canonical [`ReaperState`].
///
/// Cheap to clone; clones share the same socket, state and listeners.
#[derive(Clone)]
pub struct ControlEngine {
    inner: Arc<Inner>,
}

impl ControlEngine {
    /// Engine for `config` with default send policy.
    pub fn new(config: ControlConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: ControlConfig) -> ControlEngineBuilder {
        ControlEngineBuilder {
            config,
            sink: None,
            policy: SendPolicy::default(),
            binder: connection::bind,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Bind the listen port and resolve the DAW endpoint.
    ///
    /// Fails with a transport error on bind/resolve failure or when `timeout`
    /// elapses first. Connecting an already connected engine is a no-op.
    /// Concurrent connects wait for each other; sends do not wait at all.
    pub fn connect(&self, timeout: Duration) -> Result<SocketAddr> {
        let _connecting = self
            .inner
            .connecting
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(local) = self.local_addr() {
            log::debug!("[ENGINE] already connected on {}", local);
            return Ok(local);
        }

        let config = self.config();
        let weak = Arc::downgrade(&self.inner);
        let conn = Connection::open(&config, timeout, self.inner.binder, move |datagram| {
            match weak.upgrade() {
                Some(inner) => {
                    inner.handle_datagram(datagram);
                    true
                }
                None => false,
            }
        })?;
        let local = conn.local_addr;
        *self
            .inner
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(conn);
        Ok(local)
    }

    /// Release the socket. Returns whether a connection was open.
    pub fn disconnect(&self) -> bool {
        match self.inner.take_connection() {
            Some(conn) => {
                conn.close();
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Local address of the bound socket, if connected.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.local_addr)
    }

    pub fn config(&self) -> ControlConfig {
        self.inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Merge a partial config update.
    ///
    /// An invalid result is rejected and the old config kept. A live
    /// connection is closed; call [`connect`](Self::connect) again to use the
    /// new endpoints.
    pub fn update_config(&self, update: ConfigUpdate) -> Result<ControlConfig> {
        let _connecting = self
            .inner
            .connecting
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut merged = self.config();
        merged.merge(update);
        merged.validate()?;

        if self.disconnect() {
            log::info!("[ENGINE] config changed, connection closed");
        }
        *self
            .inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner) = merged.clone();
        Ok(merged)
    }

    pub fn send_policy(&self) -> SendPolicy {
        self.inner.policy
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Independent copy of the current snapshot.
    pub fn get_state(&self) -> ReaperState {
        self.inner.state.snapshot()
    }

    /// Register a listener for changed snapshots.
    ///
    /// Listeners run on the receive thread, in registration order. They
    /// should return quickly; use [`subscribe_channel`](Self::subscribe_channel)
    /// for consumers that may fall behind.
    pub fn on_state_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ReaperState) + Send + Sync + 'static,
    {
        let id = self.inner.listeners.add(Arc::new(listener));
        Subscription::new(id, &self.inner.listeners)
    }

    /// Subscribe through a bounded channel. Snapshots arriving while the
    /// channel is full are dropped for this subscriber.
    pub fn subscribe_channel(&self, capacity: usize) -> (Subscription, Receiver<ReaperState>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let sub = self.on_state_change(move |state| match tx.try_send(state.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::debug!("[ENGINE] subscriber channel full, snapshot dropped")
            }
            Err(TrySendError::Disconnected(_)) => {
                log::trace!("[ENGINE] subscriber channel closed")
            }
        });
        (sub, rx)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Process one inbound datagram as if it arrived on the socket.
    /// Returns whether the snapshot changed. Malformed input is dropped.
    ///
    /// Called from inside a listener, the datagram is queued behind the one
    /// being dispatched and `false` is returned.
    pub fn handle_datagram(&self, datagram: &[u8]) -> bool {
        self.inner.handle_datagram(datagram)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Validate, encode and send one command.
    pub fn send(&self, command: &Command) -> Result<()> {
        let msg = command.to_message()?;
        let bytes = encode_message(&msg)?;

        let connected = self
            .inner
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| (c.socket.clone(), c.target));

        let target = match &connected {
            Some((_, target)) => *target,
            None if self.inner.policy == SendPolicy::RequireConnection => {
                return Err(Error::Transport(format!(
                    "not connected, {} not sent",
                    command.name()
                )))
            }
            None => connection::resolve(&self.config())?,
        };

        match (&self.inner.sink, &connected) {
            (Some(sink), _) => sink.send_datagram(&bytes, target)?,
            (None, Some((socket, _))) => socket.as_ref().send_datagram(&bytes, target)?,
            (None, None) => OneShotSink.send_datagram(&bytes, target)?,
        }
        log::debug!("[OSC] -> {} {:?}", msg.addr, msg.args);
        Ok(())
    }

    pub fn play(&self) -> Result<()> {
        self.send(&Command::Play)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(&Command::Stop)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(&Command::Pause)
    }

    pub fn record(&self) -> Result<()> {
        self.send(&Command::Record)
    }

    pub fn toggle_repeat(&self) -> Result<()> {
        self.send(&Command::ToggleRepeat)
    }

    pub fn toggle_metronome(&self) -> Result<()> {
        self.send(&Command::ToggleMetronome)
    }

    pub fn go_to_start(&self) -> Result<()> {
        self.send(&Command::GoToStart)
    }

    pub fn rewind(&self) -> Result<()> {
        self.send(&Command::Rewind)
    }

    pub fn forward(&self) -> Result<()> {
        self.send(&Command::Forward)
    }

    pub fn go_to_marker(&self, marker: u32) -> Result<()> {
        self.send(&Command::GoToMarker(marker))
    }

    /// Set tempo in BPM (20-400).
    pub fn set_tempo(&self, bpm: f32) -> Result<()> {
        self.send(&Command::SetTempo(bpm))
    }

    /// Trigger a REAPER action by command id.
    pub fn trigger_action(&self, id: u32) -> Result<()> {
        self.send(&Command::TriggerAction(id))
    }

    pub fn set_track_volume(&self, track: u32, volume: f32) -> Result<()> {
        self.send(&Command::TrackVolume { track, volume })
    }

    pub fn set_track_pan(&self, track: u32, pan: f32) -> Result<()> {
        self.send(&Command::TrackPan { track, pan })
    }

    pub fn set_track_mute(&self, track: u32, muted: bool) -> Result<()> {
        self.send(&Command::TrackMute { track, muted })
    }

    pub fn set_track_solo(&self, track: u32, soloed: bool) -> Result<()> {
        self.send(&Command::TrackSolo { track, soloed })
    }

    pub fn arm_track(&self, track: u32, armed: bool) -> Result<()> {
        self.send(&Command::TrackRecordArm { track, armed })
    }

    pub fn select_track(&self, track: u32, selected: bool) -> Result<()> {
        self.send(&Command::TrackSelect { track, selected })
    }

    /// Trigger looper track `track` (1-8): record, play or overdub depending
    /// on the looper's own state.
    pub fn loop_track(&self, track: u32) -> Result<()> {
        self.send(&Command::LoopTrack(track))
    }

    pub fn loop_stop_all(&self) -> Result<()> {
        self.send(&Command::LoopStopAll)
    }

    pub fn loop_clear_all(&self) -> Result<()> {
        self.send(&Command::LoopClearAll)
    }
}

impl std::fmt::Debug for ControlEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlEngine")
            .field("config", &self.config())
            .field("connected", &self.is_connected())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::codec::{encode, message};
    use crate::state::LoopState;
    use rosc::{OscMessage, OscType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    }

    impl RecordingSink {
        fn messages(&self) -> Vec<OscMessage> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .flat_map(|(bytes, _)| decode(bytes).unwrap())
                .collect()
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl DatagramSink for RecordingSink {
        fn send_datagram(&self, bytes: &[u8], target: SocketAddr) -> Result<()> {
            self.sent.lock().unwrap().push((bytes.to_vec(), target));
            Ok(())
        }
    }

    fn engine_with_sink() -> (ControlEngine, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let engine = ControlEngine::builder(ControlConfig::default())
            .sink(sink.clone())
            .build()
            .unwrap();
        (engine, sink)
    }

    fn datagram(addr: &str, args: Vec<OscType>) -> Vec<u8> {
        encode(addr, args).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected_at_build() {
        let config = ControlConfig {
            host: String::new(),
            ..Default::default()
        };
        assert!(matches!(ControlEngine::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_loop_track_sends_one_note() {
        let (engine, sink) = engine_with_sink();
        engine.loop_track(5).unwrap();

        let sent = sink.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "127.0.0.1:8000".parse().unwrap());
        let msgs = decode(&sent[0].0).unwrap();
        assert_eq!(msgs[0].addr, "/vkb_midi/0/40/127");
    }

    #[test]
    fn test_rejected_commands_send_nothing() {
        let (engine, sink) = engine_with_sink();
        assert!(engine.loop_track(0).unwrap_err().is_validation());
        assert!(engine.loop_track(9).unwrap_err().is_validation());
        assert!(engine.arm_track(9, true).unwrap_err().is_validation());
        assert!(engine.set_track_mute(0, true).unwrap_err().is_validation());
        assert!(engine.set_tempo(10.0).unwrap_err().is_validation());
        assert!(engine.go_to_marker(0).unwrap_err().is_validation());
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_command_helpers_hit_expected_addresses() {
        let (engine, sink) = engine_with_sink();
        engine.play().unwrap();
        engine.set_tempo(128.0).unwrap();
        engine.trigger_action(40157).unwrap();
        engine.set_track_volume(2, 0.5).unwrap();
        engine.loop_stop_all().unwrap();

        let addrs: Vec<String> = sink.messages().into_iter().map(|m| m.addr).collect();
        assert_eq!(
            addrs,
            vec!["/play", "/tempo/raw", "/action/40157", "/track/2/volume", "/vkb_midi/0/44/127"]
        );
    }

    #[test]
    fn test_require_connection_policy() {
        let sink = Arc::new(RecordingSink::default());
        let engine = ControlEngine::builder(ControlConfig::default())
            .sink(sink.clone())
            .send_policy(SendPolicy::RequireConnection)
            .build()
            .unwrap();
        let err = engine.play().unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_tempo_feedback_notifies_once() {
        let (engine, _) = engine_with_sink();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        engine.on_state_change(move |state| s.lock().unwrap().push(state.tempo));

        let bytes = datagram("/tempo/raw", vec![OscType::Float(140.04)]);
        assert!(engine.handle_datagram(&bytes));
        assert!(!engine.handle_datagram(&bytes));

        assert_eq!(*seen.lock().unwrap(), vec![140.0]);
        assert_eq!(engine.get_state().tempo, 140.0);
    }

    #[test]
    fn test_record_arm_feedback() {
        let (engine, _) = engine_with_sink();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        engine.on_state_change(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let bytes = datagram("/track/3/recarm", vec![OscType::Int(1)]);
        assert!(engine.handle_datagram(&bytes));
        assert!(!engine.handle_datagram(&bytes));

        let track = engine.get_state().looper_tracks[2].clone();
        assert_eq!(track.state, LoopState::Recording);
        assert!(track.has_content);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let (engine, _) = engine_with_sink();
        engine.on_state_change(|_| panic!("listener failure"));
        let (_sub, rx) = engine.subscribe_channel(4);

        assert!(engine.handle_datagram(&datagram("/play", vec![OscType::Int(1)])));
        let state = rx.try_recv().unwrap();
        assert!(state.is_playing);
    }

    #[test]
    fn test_garbage_datagram_is_dropped() {
        let (engine, _) = engine_with_sink();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        engine.on_state_change(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let before = engine.get_state();
        assert!(!engine.handle_datagram(&[0xde, 0xad, 0xbe]));
        assert_eq!(engine.get_state(), before);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let (engine, _) = engine_with_sink();
        let (sub, rx) = engine.subscribe_channel(8);
        engine.handle_datagram(&datagram("/play", vec![OscType::Int(1)]));
        assert!(sub.unsubscribe());
        engine.handle_datagram(&datagram("/play", vec![OscType::Int(0)]));

        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(engine.listener_count(), 0);
    }

    #[test]
    fn test_full_channel_drops_without_blocking() {
        let (engine, _) = engine_with_sink();
        let (_sub, rx) = engine.subscribe_channel(1);
        engine.handle_datagram(&datagram("/play", vec![OscType::Int(1)]));
        engine.handle_datagram(&datagram("/record", vec![OscType::Int(1)]));
        let only = rx.try_recv().unwrap();
        assert!(only.is_playing);
        assert!(!only.is_recording);
        assert!(rx.try_recv().is_err());
        assert!(engine.get_state().is_recording);
    }

    #[test]
    fn test_snapshots_are_timestamp_ordered() {
        let (engine, _) = engine_with_sink();
        let (_sub, rx) = engine.subscribe_channel(16);
        for (i, addr) in ["/play", "/record", "/repeat"].iter().enumerate() {
            engine.handle_datagram(&datagram(addr, vec![OscType::Int(1)]));
            engine.handle_datagram(&datagram("/tempo", vec![OscType::Float(100.0 + i as f32)]));
        }
        let stamps: Vec<u64> = rx.try_iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps.len(), 6);
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_update_config_merges_and_validates() {
        let (engine, _) = engine_with_sink();
        let updated = engine
            .update_config(ConfigUpdate {
                port: Some(8100),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.port, 8100);
        assert_eq!(engine.config().host, "127.0.0.1");

        let err = engine
            .update_config(ConfigUpdate {
                port: Some(0),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(engine.config().port, 8100);
    }

    #[test]
    fn test_sends_follow_updated_config() {
        let (engine, sink) = engine_with_sink();
        engine
            .update_config(ConfigUpdate {
                port: Some(8123),
                ..Default::default()
            })
            .unwrap();
        engine.stop().unwrap();
        let target = sink.sent.lock().unwrap()[0].1;
        assert_eq!(target.port(), 8123);
    }

    #[test]
    fn test_listener_can_subscribe_during_dispatch() {
        let (engine, _) = engine_with_sink();
        let inner = engine.clone();
        let added = Arc::new(AtomicUsize::new(0));
        let a = added.clone();
        engine.on_state_change(move |_| {
            if a.fetch_add(1, Ordering::SeqCst) == 0 {
                inner.on_state_change(|_| {});
            }
        });
        engine.handle_datagram(&datagram("/play", vec![OscType::Int(1)]));
        assert_eq!(engine.listener_count(), 2);
    }

    #[test]
    fn test_bundle_applies_each_message() {
        let (engine, _) = engine_with_sink();
        let (_sub, rx) = engine.subscribe_channel(8);
        let bundle = rosc::OscPacket::Bundle(rosc::OscBundle {
            timetag: rosc::OscTime::from((0, 1)),
            content: vec![
                rosc::OscPacket::Message(message("/play", vec![OscType::Int(1)])),
                rosc::OscPacket::Message(message("/tempo/raw", vec![OscType::Float(90.0)])),
            ],
        });
        let bytes = rosc::encoder::encode(&bundle).unwrap();
        assert!(engine.handle_datagram(&bytes));
        assert_eq!(rx.try_iter().count(), 2);
    }

    fn slow_bind(config: &ControlConfig) -> Result<(std::net::UdpSocket, SocketAddr)> {
        std::thread::sleep(Duration::from_millis(600));
        connection::bind(config)
    }

    #[test]
    fn test_commands_do_not_wait_for_pending_connect() {
        let sink = Arc::new(RecordingSink::default());
        let config = ControlConfig {
            listen_port: 0,
            ..Default::default()
        };
        let engine = ControlEngine::builder(config)
            .sink(sink.clone())
            .binder(slow_bind)
            .build()
            .unwrap();

        let connecting = engine.clone();
        let pending = std::thread::spawn(move || connecting.connect(Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(100));

        let start = std::time::Instant::now();
        assert!(!engine.is_connected());
        engine.play().unwrap();
        assert!(engine.local_addr().is_none());
        assert!(start.elapsed() < Duration::from_millis(300));
        assert_eq!(sink.count(), 1);

        pending.join().unwrap().unwrap();
        assert!(engine.is_connected());
        engine.disconnect();
    }

    #[test]
    fn test_listener_feeding_datagram_is_queued() {
        let (engine, _) = engine_with_sink();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let feeder = engine.clone();
        let s = seen.clone();
        engine.on_state_change(move |state| {
            s.lock().unwrap().push((state.is_playing, state.is_recording));
            if !state.is_recording {
                feeder.handle_datagram(&datagram("/record", vec![OscType::Int(1)]));
            }
        });

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let outer = engine.clone();
        std::thread::spawn(move || {
            let changed = outer.handle_datagram(&datagram("/play", vec![OscType::Int(1)]));
            let _ = done_tx.send(changed);
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).unwrap());

        assert!(engine.get_state().is_recording);
        assert_eq!(*seen.lock().unwrap(), vec![(true, false), (true, true)]);
    }
}
