//! Gateway (WebSocket) connection to Discord.
//!
//! One call to [`DiscordGateway::start`] is one session:
//!   - connect → receive HELLO → send IDENTIFY
//!   - heartbeat task (a pending task) with zombie detection
//!   - read loop: READY and MESSAGE_CREATE are handed to subscribers and the
//!     command registry, each on its own pending task
//!
//! The session ends on logout (`Ok`) or on any transport-level problem
//! (`Err`). Reconnecting is the supervisor's job, not this module's.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{FutureExt, Sink, SinkExt, Stream, StreamExt};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::commands::{CommandRegistry, Invocation};
use crate::config::Credential;
use crate::error::{CommandError, GatewayError};
use crate::events::GatewayEvent;
use crate::http::Messenger;
use crate::subscribers::{panic_message, SubscriberSet};
use crate::supervisor::{Connection, StatusReporter};
use crate::tasks::PendingTasks;
use crate::types::{GatewayPayload, Message, ReadyEvent};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Discord allows at most 120 gateway sends per 60 seconds.
const SEND_BUDGET_MAX: usize = 120;
const SEND_BUDGET_WINDOW: Duration = Duration::from_secs(60);

const HELLO_TIMEOUT: Duration = Duration::from_secs(30);

/// Write half of a gateway socket.
trait WsSink: Sink<WsMessage, Error = WsError> + Unpin + Send + 'static {}
impl<T> WsSink for T where T: Sink<WsMessage, Error = WsError> + Unpin + Send + 'static {}

/// Read half of a gateway socket.
trait WsStream: Stream<Item = Result<WsMessage, WsError>> + Unpin {}
impl<T> WsStream for T where T: Stream<Item = Result<WsMessage, WsError>> + Unpin {}

// ---------------------------------------------------------------------------
// Outbound send budget
// ---------------------------------------------------------------------------

/// Sliding-window budget for outbound gateway messages.
struct SendBudget {
    sent: VecDeque<Instant>,
    max: usize,
    window: Duration,
}

impl SendBudget {
    fn new(max: usize, window: Duration) -> Self {
        Self {
            sent: VecDeque::with_capacity(max),
            max,
            window,
        }
    }

    /// Claim a slot at `now`, or return how long until one frees up.
    fn reserve(&mut self, now: Instant) -> Option<Duration> {
        while self
            .sent
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            self.sent.pop_front();
        }

        if self.sent.len() < self.max {
            self.sent.push_back(now);
            return None;
        }
        self.sent
            .front()
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
    }
}

/// Write half of the socket plus its send budget.
struct Outbound<S> {
    inner: Mutex<(S, SendBudget)>,
}

impl<S: WsSink> Outbound<S> {
    fn new(sink: S) -> Self {
        Self {
            inner: Mutex::new((sink, SendBudget::new(SEND_BUDGET_MAX, SEND_BUDGET_WINDOW))),
        }
    }

    async fn send(&self, payload: &serde_json::Value) -> Result<(), GatewayError> {
        let mut guard = self.inner.lock().await;
        let (sink, budget) = &mut *guard;
        while let Some(delay) = budget.reserve(Instant::now()) {
            debug!(
                delay_ms = delay.as_millis() as u64,
                "gateway send rate-limited, waiting"
            );
            tokio::time::sleep(delay).await;
        }
        sink.send(WsMessage::Text(payload.to_string()))
            .await
            .map_err(|e| GatewayError::Transport(format!("send: {e}")))
    }

    async fn close(&self) {
        let mut guard = self.inner.lock().await;
        if let Err(e) = guard.0.send(WsMessage::Close(None)).await {
            debug!(error = %e, "close frame not delivered");
        }
    }
}

// ---------------------------------------------------------------------------
// Per-session shared state
// ---------------------------------------------------------------------------

struct Session<S> {
    out: Outbound<S>,
    /// Last sequence number seen, echoed in heartbeats.
    sequence: StdMutex<Option<u64>>,
    /// Set on HEARTBEAT_ACK, cleared when a heartbeat goes out.
    acked: AtomicBool,
    /// Cancelled by the heartbeat task when ACKs stop.
    zombie: CancellationToken,
    interval: Duration,
}

impl<S: WsSink> Session<S> {
    fn sequence(&self) -> Option<u64> {
        *self.sequence.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn heartbeat(&self) -> Result<(), GatewayError> {
        let seq = self.sequence();
        self.out.send(&json!({ "op": 1, "d": seq })).await?;
        debug!(?seq, "sent heartbeat");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DiscordGateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    /// Gateway intents bitmask.
    pub intents: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GATEWAY_URL.to_string(),
            intents: crate::config::DEFAULT_INTENTS,
        }
    }
}

/// The bot's connection to Discord. Constructed once in `main` and reused
/// for every session the supervisor starts.
pub struct DiscordGateway {
    config: GatewayConfig,
    messenger: Arc<dyn Messenger>,
    commands: Arc<CommandRegistry>,
    subscribers: Arc<SubscriberSet>,
    pending: PendingTasks,
    /// Cancelled by `logout`; `None` between sessions.
    active: StdMutex<Option<CancellationToken>>,
}

impl DiscordGateway {
    pub fn new(
        config: GatewayConfig,
        messenger: Arc<dyn Messenger>,
        commands: CommandRegistry,
        subscribers: SubscriberSet,
    ) -> Self {
        Self {
            config,
            messenger,
            commands: Arc::new(commands),
            subscribers: Arc::new(subscribers),
            pending: PendingTasks::new(),
            active: StdMutex::new(None),
        }
    }

    fn active(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn serve(
        &self,
        credential: &Credential,
        status: &StatusReporter,
        logout: &CancellationToken,
    ) -> Result<(), GatewayError> {
        info!(url = %self.config.url, "connecting to Discord gateway");
        let (ws, _) = tokio_tungstenite::connect_async(self.config.url.as_str())
            .await
            .map_err(|e| GatewayError::Transport(format!("connect: {e}")))?;
        let (sink, stream) = ws.split();
        self.run_session(sink, stream, credential, status, logout).await
    }

    /// One session over an already-open socket: HELLO, IDENTIFY, heartbeat,
    /// then the read loop until logout or failure.
    async fn run_session<S: WsSink>(
        &self,
        sink: S,
        mut stream: impl WsStream,
        credential: &Credential,
        status: &StatusReporter,
        logout: &CancellationToken,
    ) -> Result<(), GatewayError> {
        let heartbeat_interval = read_hello(&mut stream).await?;
        info!(interval_ms = heartbeat_interval.as_millis() as u64, "received HELLO");

        let session = Arc::new(Session {
            out: Outbound::new(sink),
            sequence: StdMutex::new(None),
            acked: AtomicBool::new(true),
            zombie: CancellationToken::new(),
            interval: heartbeat_interval,
        });

        session
            .out
            .send(&json!({
                "op": 2,
                "d": {
                    "token": credential.expose(),
                    "properties": {
                        "os": std::env::consts::OS,
                        "browser": "ffr-bot",
                        "device": "ffr-bot"
                    },
                    "intents": self.config.intents,
                }
            }))
            .await
            .map_err(|e| GatewayError::Handshake(format!("IDENTIFY: {e}")))?;
        info!("sent IDENTIFY");

        let heartbeat = self.pending.spawn("heartbeat", {
            let session = Arc::clone(&session);
            move |token| heartbeat_loop(session, token)
        });

        let result = self.read_loop(&mut stream, &session, status, logout).await;
        heartbeat.cancel();
        if result.is_ok() {
            session.out.close().await;
            info!("logged out");
        }
        result
    }

    async fn read_loop<S: WsSink>(
        &self,
        stream: &mut impl WsStream,
        session: &Arc<Session<S>>,
        status: &StatusReporter,
        logout: &CancellationToken,
    ) -> Result<(), GatewayError> {
        loop {
            let msg = tokio::select! {
                biased;
                _ = logout.cancelled() => return Ok(()),
                _ = session.zombie.cancelled() => {
                    return Err(GatewayError::Zombied { interval: session.interval })
                }
                msg = stream.next() => msg,
            };

            let text = match msg {
                Some(Ok(WsMessage::Text(text))) => text,
                Some(Ok(WsMessage::Close(frame))) => {
                    let code = frame.map(|f| u16::from(f.code));
                    warn!(close_code = ?code, "WebSocket closed by server");
                    return Err(GatewayError::Closed { code });
                }
                // Ping/Pong/Binary — ignore.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(GatewayError::Transport(format!("read: {e}"))),
                None => return Err(GatewayError::Closed { code: None }),
            };

            let payload: GatewayPayload = match serde_json::from_str(&text) {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "failed to parse gateway payload");
                    continue;
                }
            };
            if let Some(s) = payload.s {
                *session.sequence.lock().unwrap_or_else(|e| e.into_inner()) = Some(s);
            }

            match GatewayEvent::from_payload(payload) {
                GatewayEvent::Ready(ready) => {
                    status.connected();
                    self.on_ready(ready);
                }
                GatewayEvent::MessageCreate(message) => self.on_message(&message),
                GatewayEvent::HeartbeatAck => {
                    trace!("heartbeat acknowledged");
                    session.acked.store(true, Ordering::SeqCst);
                }
                GatewayEvent::HeartbeatRequest => session.heartbeat().await?,
                GatewayEvent::Reconnect => return Err(GatewayError::ReconnectRequested),
                GatewayEvent::InvalidSession(resumable) => {
                    return Err(GatewayError::InvalidSession { resumable })
                }
                GatewayEvent::Hello { .. } => warn!("unexpected HELLO mid-session"),
                GatewayEvent::Unknown { event_name, op } => {
                    trace!(event = ?event_name, op, "unhandled gateway event");
                }
            }
        }
    }

    fn on_ready(&self, ready: ReadyEvent) {
        let subs = Arc::clone(&self.subscribers);
        self.pending.spawn("on_ready", move |_| async move {
            subs.ready(&ready).await;
            Ok(())
        });
    }

    fn on_message(&self, message: &Message) {
        let Some(invocation) = self
            .commands
            .invocation(message, Arc::clone(&self.messenger))
        else {
            return;
        };
        debug!(
            command = %invocation.ctx.invoked_with,
            message_id = %message.id,
            "dispatching command"
        );
        let subs = Arc::clone(&self.subscribers);
        self.pending.spawn(
            format!("command {}", invocation.ctx.invoked_with),
            move |token| run_command(invocation, subs, token),
        );
    }
}

#[async_trait]
impl Connection for DiscordGateway {
    async fn start(
        &self,
        credential: &Credential,
        status: &StatusReporter,
    ) -> Result<(), GatewayError> {
        let logout = CancellationToken::new();
        *self.active() = Some(logout.clone());
        let result = self.serve(credential, status, &logout).await;
        self.active().take();
        result
    }

    async fn logout(&self) {
        if let Some(token) = self.active().take() {
            token.cancel();
        }
    }

    fn pending(&self) -> &PendingTasks {
        &self.pending
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Run one command and report the outcome. Cancellation reports nothing.
async fn run_command(
    invocation: Invocation,
    subs: Arc<SubscriberSet>,
    token: CancellationToken,
) -> Result<(), crate::tasks::TaskFault> {
    let outcome = tokio::select! {
        _ = token.cancelled() => return Ok(()),
        res = AssertUnwindSafe(invocation.run()).catch_unwind() => res,
    };

    match outcome {
        Ok(Ok(())) => subs.command_completed(&invocation.ctx).await,
        Ok(Err(e)) => subs.command_error(&invocation.ctx, &e).await,
        Err(panic) => {
            let e = CommandError::Panicked(panic_message(&*panic));
            subs.command_error(&invocation.ctx, &e).await;
        }
    }
    Ok(())
}

async fn heartbeat_loop<S: WsSink>(
    session: Arc<Session<S>>,
    token: CancellationToken,
) -> Result<(), crate::tasks::TaskFault> {
    let interval = session.interval;
    // First beat after `interval * jitter`, jitter ∈ [0, 1).
    let first = interval.mul_f64(rand::random::<f64>());
    tokio::select! {
        _ = tokio::time::sleep(first) => {}
        _ = token.cancelled() => return Ok(()),
    }

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = token.cancelled() => return Ok(()),
        }
        if !session.acked.swap(false, Ordering::SeqCst) {
            warn!(interval_ms = interval.as_millis() as u64, "heartbeat not acknowledged");
            session.zombie.cancel();
            return Err(GatewayError::Zombied { interval }.into());
        }
        session.heartbeat().await?;
    }
}

/// Read the HELLO frame and return the heartbeat interval.
async fn read_hello(stream: &mut impl WsStream) -> Result<Duration, GatewayError> {
    let msg = tokio::time::timeout(HELLO_TIMEOUT, stream.next())
        .await
        .map_err(|_| GatewayError::Handshake("timed out waiting for HELLO".into()))?
        .ok_or_else(|| GatewayError::Handshake("stream ended before HELLO".into()))?
        .map_err(|e| GatewayError::Transport(format!("reading HELLO: {e}")))?;

    let text = match msg {
        WsMessage::Text(text) => text,
        other => {
            return Err(GatewayError::Handshake(format!(
                "expected text frame for HELLO, got {other:?}"
            )))
        }
    };
    let payload: GatewayPayload = serde_json::from_str(&text)
        .map_err(|e| GatewayError::Handshake(format!("failed to parse HELLO: {e}")))?;

    match GatewayEvent::from_payload(payload) {
        GatewayEvent::Hello { heartbeat_interval } => Ok(Duration::from_millis(heartbeat_interval)),
        other => Err(GatewayError::Handshake(format!(
            "expected HELLO, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::builtin::Ping;
    use crate::subscribers::{ReactionAcknowledger, Subscribe, FAILURE_MARKER, SUCCESS_MARKER};
    use crate::supervisor::RunState;
    use crate::test_support::{message, RecordingMessenger};
    use futures_util::stream::BoxStream;
    use std::pin::Pin;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    type FakeSink = Pin<Box<dyn Sink<WsMessage, Error = WsError> + Send>>;
    type FakeStream = BoxStream<'static, Result<WsMessage, WsError>>;

    /// Discord's end of an in-memory socket.
    struct FakeServer {
        to_bot: mpsc::UnboundedSender<Result<WsMessage, WsError>>,
        from_bot: mpsc::UnboundedReceiver<WsMessage>,
    }

    impl FakeServer {
        fn push(&self, frame: WsMessage) {
            self.to_bot.send(Ok(frame)).unwrap();
        }

        fn json(&self, payload: serde_json::Value) {
            self.push(WsMessage::Text(payload.to_string()));
        }

        fn hello(&self, interval_ms: u64) {
            self.json(json!({ "op": 10, "d": { "heartbeat_interval": interval_ms } }));
        }

        /// Frames the bot has sent so far.
        fn received(&mut self) -> Vec<WsMessage> {
            let mut frames = Vec::new();
            while let Ok(frame) = self.from_bot.try_recv() {
                frames.push(frame);
            }
            frames
        }
    }

    fn socket() -> (FakeServer, FakeSink, FakeStream) {
        let (to_bot, from_server) = mpsc::unbounded_channel();
        let (to_server, from_bot) = mpsc::unbounded_channel();

        let sink = futures_util::sink::unfold(
            to_server,
            |tx: mpsc::UnboundedSender<WsMessage>, frame: WsMessage| async move {
                tx.send(frame).map_err(|_| WsError::ConnectionClosed)?;
                Ok::<_, WsError>(tx)
            },
        );
        let stream = futures_util::stream::unfold(
            from_server,
            |mut rx: mpsc::UnboundedReceiver<Result<WsMessage, WsError>>| async move {
                rx.recv().await.map(|frame| (frame, rx))
            },
        );

        let sink: FakeSink = Box::pin(sink);
        (FakeServer { to_bot, from_bot }, sink, stream.boxed())
    }

    fn body(frame: &WsMessage) -> serde_json::Value {
        match frame {
            WsMessage::Text(text) => serde_json::from_str(text).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    async fn serve_fake(
        gw: &DiscordGateway,
        sink: FakeSink,
        stream: FakeStream,
    ) -> Result<(), GatewayError> {
        let cred = Credential::new("t");
        let status = StatusReporter::default();
        let logout = CancellationToken::new();
        gw.run_session(sink, stream, &cred, &status, &logout).await
    }

    #[test]
    fn budget_allows_max_then_waits_for_oldest() {
        let start = Instant::now();
        let mut budget = SendBudget::new(2, Duration::from_secs(60));
        assert!(budget.reserve(start).is_none());
        assert!(budget.reserve(start + Duration::from_secs(10)).is_none());

        let wait = budget.reserve(start + Duration::from_secs(20)).unwrap();
        assert_eq!(wait, Duration::from_secs(40));

        // Oldest has aged out.
        assert!(budget.reserve(start + Duration::from_secs(60)).is_none());
    }

    fn gateway(messenger: Arc<RecordingMessenger>) -> DiscordGateway {
        let mut commands = CommandRegistry::new("?", true);
        commands.register(Ping);
        let ack: Arc<dyn Subscribe> = Arc::new(ReactionAcknowledger::new(messenger.clone()));
        let subs = SubscriberSet::new(vec![ack]);
        DiscordGateway::new(GatewayConfig::default(), messenger, commands, subs)
    }

    #[tokio::test]
    async fn commands_are_acknowledged() {
        let messenger = Arc::new(RecordingMessenger::default());
        let gw = gateway(messenger.clone());

        gw.on_message(&message("1", "?ping"));
        gw.on_message(&message("2", "?nope"));
        gw.on_message(&message("3", "not a command"));
        for _ in 0..16 {
            if messenger.reactions().len() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        let report = gw.pending().drain(Duration::from_secs(5)).await;

        assert_eq!(report.total(), 2);
        let mut reactions = messenger.reactions();
        reactions.sort();
        assert_eq!(
            reactions,
            vec![
                ("1".to_string(), SUCCESS_MARKER.to_string()),
                ("2".to_string(), FAILURE_MARKER.to_string()),
            ]
        );
        assert_eq!(messenger.sent(), vec![("chan".to_string(), "pong".to_string())]);
    }

    #[tokio::test]
    async fn logout_without_session_is_a_noop() {
        let gw = gateway(Arc::new(RecordingMessenger::default()));
        gw.logout().await;
        gw.logout().await;
        assert!(gw.active().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_command_reports_nothing() {
        struct Slow;

        #[async_trait]
        impl crate::commands::Command for Slow {
            fn name(&self) -> &'static str {
                "slow"
            }

            async fn run(&self, _ctx: &crate::commands::CommandContext) -> Result<(), CommandError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }

        let messenger = Arc::new(RecordingMessenger::default());
        let mut commands = CommandRegistry::new("?", true);
        commands.register(Slow);
        let ack: Arc<dyn Subscribe> = Arc::new(ReactionAcknowledger::new(messenger.clone()));
        let subs = SubscriberSet::new(vec![ack]);
        let gw = DiscordGateway::new(GatewayConfig::default(), messenger.clone(), commands, subs);

        gw.on_message(&message("1", "?slow"));
        tokio::task::yield_now().await;
        let report = gw.pending().drain(Duration::from_secs(5)).await;

        assert_eq!(report.cancelled, 1);
        assert!(messenger.reactions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_ack_ends_session_as_zombied() {
        let gw = gateway(Arc::new(RecordingMessenger::default()));
        let (mut server, sink, stream) = socket();
        server.hello(1_000);

        let res = serve_fake(&gw, sink, stream).await;

        assert!(
            matches!(res, Err(GatewayError::Zombied { interval }) if interval == Duration::from_secs(1)),
            "{res:?}"
        );
        let ops: Vec<_> = server.received().iter().map(|f| body(f)["op"].clone()).collect();
        assert_eq!(ops, vec![json!(2), json!(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_request_is_answered_at_once() {
        let gw = gateway(Arc::new(RecordingMessenger::default()));
        let (mut server, sink, stream) = socket();
        server.hello(41_250);
        server.json(json!({ "op": 0, "t": "GUILD_CREATE", "s": 5, "d": {} }));
        server.json(json!({ "op": 1, "d": null }));
        server.json(json!({ "op": 7, "d": null }));
        let started = Instant::now();

        let res = serve_fake(&gw, sink, stream).await;

        assert!(matches!(res, Err(GatewayError::ReconnectRequested)), "{res:?}");
        assert_eq!(started.elapsed(), Duration::ZERO);
        let frames = server.received();
        assert_eq!(frames.len(), 2);
        assert_eq!(body(&frames[0])["op"], 2);
        assert_eq!(body(&frames[1]), json!({ "op": 1, "d": 5 }));
    }

    #[tokio::test(start_paused = true)]
    async fn server_close_frame_ends_session_with_its_code() {
        let gw = gateway(Arc::new(RecordingMessenger::default()));
        let (server, sink, stream) = socket();
        server.hello(41_250);
        server.push(WsMessage::Close(Some(CloseFrame {
            code: CloseCode::from(4004),
            reason: "Authentication failed.".into(),
        })));

        let res = serve_fake(&gw, sink, stream).await;

        match res {
            Err(e @ GatewayError::Closed { code: Some(4004) }) => assert!(e.is_fatal()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_session_ends_session() {
        let gw = gateway(Arc::new(RecordingMessenger::default()));
        let (server, sink, stream) = socket();
        server.hello(41_250);
        server.json(json!({ "op": 9, "d": false }));

        let res = serve_fake(&gw, sink, stream).await;

        assert!(
            matches!(res, Err(GatewayError::InvalidSession { resumable: false })),
            "{res:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_stream_is_a_close_without_code() {
        let gw = gateway(Arc::new(RecordingMessenger::default()));
        let (server, sink, stream) = socket();
        server.hello(41_250);
        // Hang up the read side only; IDENTIFY still has somewhere to go.
        let FakeServer { to_bot, from_bot: _from_bot } = server;
        drop(to_bot);

        let res = serve_fake(&gw, sink, stream).await;

        assert!(matches!(res, Err(GatewayError::Closed { code: None })), "{res:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn ready_then_logout_closes_cleanly() {
        let gw = gateway(Arc::new(RecordingMessenger::default()));
        let (mut server, sink, stream) = socket();
        server.hello(41_250);
        server.json(json!({
            "op": 0,
            "t": "READY",
            "s": 1,
            "d": {
                "v": 10,
                "user": { "id": "1", "username": "ffr", "bot": true },
                "session_id": "abc",
                "guilds": []
            }
        }));

        let cred = Credential::new("t");
        let status = StatusReporter::default();
        let logout = CancellationToken::new();
        let mut states = status.subscribe();
        let (res, _) = tokio::join!(
            gw.run_session(sink, stream, &cred, &status, &logout),
            async {
                while !matches!(states.recv().await, Ok(RunState::Connected)) {}
                logout.cancel();
            },
        );

        assert!(res.is_ok(), "{res:?}");
        assert_eq!(status.current(), RunState::Connected);
        let frames = server.received();
        assert!(matches!(frames.last(), Some(WsMessage::Close(None))), "{frames:?}");
    }
}
