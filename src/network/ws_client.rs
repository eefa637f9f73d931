//! Per-user live channel over `web_sys::WebSocket`.
//!
//! Incoming frames are decoded into [`WsMessage`] and fanned out to callback
//! sets kept in [`Subscribers`]. Chat frames pass through the
//! [`MessageDeduplicator`] first. After an unexpected close the channel
//! reconnects with a fixed delay until the attempt budget is spent.

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::future::TimeoutFuture;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, MessageEvent, WebSocket};

use super::config::api_config;
use super::dedup::MessageDeduplicator;
use super::messages::{decode_frame, encode_frame, AgentThought, ChatMessage, WsMessage};
use crate::constants::{MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY_MS};
use crate::error::{js_message, ConsoleError, Result};
use crate::models::ExecutionRecord;
use crate::utils::now_ms;

/// Represents the current state of the WebSocket connection
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WsConfig {
    pub reconnect_delay_ms: u32,
    /// `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: RECONNECT_DELAY_MS,
            max_reconnect_attempts: Some(MAX_RECONNECT_ATTEMPTS),
        }
    }
}

pub type SubscriptionId = u64;

type Handler<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct HandlerSet<T> {
    entries: Vec<(SubscriptionId, Handler<T>)>,
}

impl<T> Default for HandlerSet<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> HandlerSet<T> {
    fn snapshot(&self) -> Vec<Handler<T>> {
        self.entries.iter().map(|(_, h)| Rc::clone(h)).collect()
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(sid, _)| *sid != id);
        before != self.entries.len()
    }
}

/// Callback registry of the live channel. Callbacks are invoked in
/// registration order.
#[derive(Default)]
pub struct Subscribers {
    next_id: SubscriptionId,
    execution_update: HandlerSet<ExecutionRecord>,
    agent_thought: HandlerSet<AgentThought>,
    chat_message: HandlerSet<ChatMessage>,
    connect: HandlerSet<()>,
    disconnect: HandlerSet<()>,
    error: HandlerSet<String>,
}

impl Subscribers {
    fn next_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        self.next_id
    }

    fn add<T>(
        id: SubscriptionId,
        set: &mut HandlerSet<T>,
        handler: Handler<T>,
    ) -> SubscriptionId {
        set.entries.push((id, handler));
        id
    }

    pub fn subscribe_execution_update(
        &mut self,
        f: impl FnMut(&ExecutionRecord) + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        Self::add(id, &mut self.execution_update, Rc::new(RefCell::new(f)))
    }

    pub fn subscribe_agent_thought(&mut self, f: impl FnMut(&AgentThought) + 'static) -> SubscriptionId {
        let id = self.next_id();
        Self::add(id, &mut self.agent_thought, Rc::new(RefCell::new(f)))
    }

    pub fn subscribe_chat_message(&mut self, f: impl FnMut(&ChatMessage) + 'static) -> SubscriptionId {
        let id = self.next_id();
        Self::add(id, &mut self.chat_message, Rc::new(RefCell::new(f)))
    }

    pub fn subscribe_connect(&mut self, mut f: impl FnMut() + 'static) -> SubscriptionId {
        let id = self.next_id();
        Self::add(id, &mut self.connect, Rc::new(RefCell::new(move |_: &()| f())))
    }

    pub fn subscribe_disconnect(&mut self, mut f: impl FnMut() + 'static) -> SubscriptionId {
        let id = self.next_id();
        Self::add(id, &mut self.disconnect, Rc::new(RefCell::new(move |_: &()| f())))
    }

    pub fn subscribe_error(&mut self, f: impl FnMut(&String) + 'static) -> SubscriptionId {
        let id = self.next_id();
        Self::add(id, &mut self.error, Rc::new(RefCell::new(f)))
    }

    /// Remove a callback from whichever set holds it.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.execution_update.remove(id)
            | self.agent_thought.remove(id)
            | self.chat_message.remove(id)
            | self.connect.remove(id)
            | self.disconnect.remove(id)
            | self.error.remove(id)
    }

    pub fn len(&self) -> usize {
        self.execution_update.entries.len()
            + self.agent_thought.entries.len()
            + self.chat_message.entries.len()
            + self.connect.entries.len()
            + self.disconnect.entries.len()
            + self.error.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Handlers are cloned out before being called so a callback may subscribe or
// unsubscribe without a double borrow.
fn fire<T>(subscribers: &Rc<RefCell<Subscribers>>, pick: fn(&Subscribers) -> &HandlerSet<T>, value: &T) {
    let handlers = pick(&subscribers.borrow()).snapshot();
    for handler in handlers {
        (handler.borrow_mut())(value);
    }
}

pub fn notify_connect(subscribers: &Rc<RefCell<Subscribers>>) {
    fire(subscribers, |s| &s.connect, &());
}

pub fn notify_disconnect(subscribers: &Rc<RefCell<Subscribers>>) {
    fire(subscribers, |s| &s.disconnect, &());
}

pub fn notify_error(subscribers: &Rc<RefCell<Subscribers>>, message: &str) {
    fire(subscribers, |s| &s.error, &message.to_string());
}

/// Route one decoded frame. Returns the frame to send back, if any (a pong
/// for a server ping).
pub fn dispatch_frame(
    subscribers: &Rc<RefCell<Subscribers>>,
    dedup: &RefCell<MessageDeduplicator>,
    frame: WsMessage,
) -> Option<WsMessage> {
    match frame {
        WsMessage::ChatMessage(mut message) => {
            if message.timestamp == 0 {
                message.timestamp = now_ms();
            }
            if dedup.borrow_mut().accept(&message) {
                fire(subscribers, |s| &s.chat_message, &message);
            }
            None
        }
        WsMessage::ExecutionUpdate(record) => {
            fire(subscribers, |s| &s.execution_update, &record);
            None
        }
        WsMessage::AgentThought(mut thought) => {
            if thought.timestamp == 0 {
                thought.timestamp = now_ms();
            }
            fire(subscribers, |s| &s.agent_thought, &thought);
            None
        }
        WsMessage::ConnectionEstablished { user_id } => {
            log::info!("Live channel established for user {:?}", user_id);
            None
        }
        WsMessage::Error { message } => {
            log::warn!("Live channel error frame: {}", message);
            notify_error(subscribers, &message);
            None
        }
        WsMessage::Ping { timestamp } => Some(WsMessage::Pong { timestamp }),
        WsMessage::Pong { .. } => None,
        WsMessage::Unknown => {
            log::debug!("Ignoring live frame of unknown type");
            None
        }
    }
}

struct ChannelInner {
    config: WsConfig,
    user_id: Option<String>,
    socket: Option<WebSocket>,
    state: ConnectionState,
    reconnect_attempts: u32,
    // Bumped on every new socket so handlers of a replaced socket go quiet.
    generation: u64,
}

/// One WebSocket per logged-in user id.
#[derive(Clone)]
pub struct LiveChannel {
    inner: Rc<RefCell<ChannelInner>>,
    subscribers: Rc<RefCell<Subscribers>>,
    dedup: Rc<RefCell<MessageDeduplicator>>,
}

impl Default for LiveChannel {
    fn default() -> Self {
        Self::new(WsConfig::default())
    }
}

impl LiveChannel {
    pub fn new(config: WsConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ChannelInner {
                config,
                user_id: None,
                socket: None,
                state: ConnectionState::Disconnected,
                reconnect_attempts: 0,
                generation: 0,
            })),
            subscribers: Rc::new(RefCell::new(Subscribers::default())),
            dedup: Rc::new(RefCell::new(MessageDeduplicator::default())),
        }
    }

    pub fn subscribers(&self) -> Rc<RefCell<Subscribers>> {
        Rc::clone(&self.subscribers)
    }

    /// Open the channel for `user_id`. A no-op when already open or opening
    /// for the same user; a different user replaces the current socket.
    pub fn connect(&self, user_id: &str) -> Result<()> {
        if self.is_open_for(user_id) {
            return Ok(());
        }
        self.close();
        {
            let mut inner = self.inner.borrow_mut();
            inner.user_id = Some(user_id.to_string());
            inner.reconnect_attempts = 0;
        }
        self.dedup.borrow_mut().clear();
        self.open()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.borrow().state.clone()
    }

    fn is_open_for(&self, user_id: &str) -> bool {
        let inner = self.inner.borrow();
        let busy = matches!(
            inner.state,
            ConnectionState::Connected | ConnectionState::Connecting
        );
        busy && inner.user_id.as_deref() == Some(user_id)
    }

    /// Deliberate close: no reconnect follows.
    pub fn close(&self) {
        let socket = {
            let mut inner = self.inner.borrow_mut();
            inner.generation += 1;
            inner.state = ConnectionState::Disconnected;
            inner.user_id = None;
            inner.socket.take()
        };
        if let Some(ws) = socket {
            if let Err(e) = ws.close_with_code(1000) {
                log::warn!("Error sending close command: {}", js_message(&e));
            }
            notify_disconnect(&self.subscribers);
        }
    }

    pub fn send(&self, frame: &WsMessage) -> Result<()> {
        let inner = self.inner.borrow();
        match (&inner.socket, &inner.state) {
            (Some(ws), ConnectionState::Connected) => {
                ws.send_with_str(&encode_frame(frame)?)?;
                Ok(())
            }
            _ => Err(ConsoleError::Js("WebSocket is not connected".into())),
        }
    }

    fn open(&self) -> Result<()> {
        let (url, generation) = {
            let mut inner = self.inner.borrow_mut();
            let user_id = inner
                .user_id
                .clone()
                .ok_or_else(|| ConsoleError::Validation("No user id for live channel".into()))?;
            inner.generation += 1;
            inner.state = ConnectionState::Connecting;
            (api_config().ws_url(&user_id), inner.generation)
        };

        log::info!("Opening live channel {}", url);
        let ws = match WebSocket::new(&url) {
            Ok(ws) => ws,
            Err(e) => {
                let message = js_message(&e);
                self.open_failed(generation, &message);
                return Err(ConsoleError::Js(message));
            }
        };
        self.attach_handlers(&ws, generation);
        self.inner.borrow_mut().socket = Some(ws);
        Ok(())
    }

    // Leaves `Connecting` so the next connect() for this user is not a no-op.
    fn open_failed(&self, generation: u64, message: &str) {
        let mut inner = self.inner.borrow_mut();
        if inner.generation == generation {
            inner.state = ConnectionState::Error(message.to_string());
            inner.socket = None;
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.borrow().generation == generation
    }

    fn attach_handlers(&self, ws: &WebSocket, generation: u64) {
        let channel = self.clone();
        let onopen = Closure::wrap(Box::new(move |_: web_sys::Event| {
            if !channel.is_current(generation) {
                return;
            }
            log::info!("Live channel connected");
            {
                let mut inner = channel.inner.borrow_mut();
                inner.state = ConnectionState::Connected;
                inner.reconnect_attempts = 0;
            }
            notify_connect(&channel.subscribers);
        }) as Box<dyn FnMut(web_sys::Event)>);
        ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();

        let channel = self.clone();
        let onerror = Closure::wrap(Box::new(move |_: web_sys::Event| {
            if !channel.is_current(generation) {
                return;
            }
            log::error!("Live channel error");
            channel.inner.borrow_mut().state = ConnectionState::Error("socket error".into());
            notify_error(&channel.subscribers, "WebSocket error");
        }) as Box<dyn FnMut(web_sys::Event)>);
        ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();

        let channel = self.clone();
        let onclose = Closure::wrap(Box::new(move |evt: CloseEvent| {
            if !channel.is_current(generation) {
                return;
            }
            log::info!("Live channel closed (code {})", evt.code());
            {
                let mut inner = channel.inner.borrow_mut();
                inner.state = ConnectionState::Disconnected;
                inner.socket = None;
            }
            notify_disconnect(&channel.subscribers);
            channel.schedule_reconnect(generation);
        }) as Box<dyn FnMut(CloseEvent)>);
        ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        onclose.forget();

        let channel = self.clone();
        let onmessage = Closure::wrap(Box::new(move |event: MessageEvent| {
            if !channel.is_current(generation) {
                return;
            }
            let text = match event.data().as_string() {
                Some(text) => text,
                None => {
                    log::warn!("Received non-text live frame");
                    return;
                }
            };
            let Some(frame) = decode_frame(&text) else {
                return;
            };
            if let Some(reply) = dispatch_frame(&channel.subscribers, &channel.dedup, frame) {
                if let Err(e) = channel.send(&reply) {
                    log::warn!("Failed to answer live frame: {}", e);
                }
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();
    }

    fn schedule_reconnect(&self, generation: u64) {
        let (delay, attempt) = {
            let mut inner = self.inner.borrow_mut();
            if let Some(max) = inner.config.max_reconnect_attempts {
                if inner.reconnect_attempts >= max {
                    log::warn!("Max reconnection attempts reached");
                    return;
                }
            }
            inner.reconnect_attempts += 1;
            (inner.config.reconnect_delay_ms, inner.reconnect_attempts)
        };

        let channel = self.clone();
        wasm_bindgen_futures::spawn_local(async move {
            TimeoutFuture::new(delay).await;
            // A deliberate close or a new connect() bumped the generation.
            if !channel.is_current(generation) {
                return;
            }
            log::info!("Attempting live channel reconnection (attempt {})", attempt);
            if let Err(e) = channel.open() {
                log::error!("Failed to reopen live channel: {}", e);
                let current = channel.inner.borrow().generation;
                channel.schedule_reconnect(current);
            }
        });
    }
}

thread_local! {
    static LIVE_CHANNEL: LiveChannel = LiveChannel::default();
}

pub fn with_live_channel<R>(f: impl FnOnce(&LiveChannel) -> R) -> R {
    LIVE_CHANNEL.with(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Rc<RefCell<Subscribers>>, RefCell<MessageDeduplicator>) {
        (
            Rc::new(RefCell::new(Subscribers::default())),
            RefCell::new(MessageDeduplicator::default()),
        )
    }

    #[test]
    fn frames_reach_only_their_callbacks() {
        let (subs, dedup) = setup();
        let chats = Rc::new(RefCell::new(Vec::new()));
        let updates = Rc::new(RefCell::new(0));
        {
            let chats = Rc::clone(&chats);
            subs.borrow_mut()
                .subscribe_chat_message(move |m| chats.borrow_mut().push(m.content.clone()));
            let updates = Rc::clone(&updates);
            subs.borrow_mut()
                .subscribe_execution_update(move |_| *updates.borrow_mut() += 1);
        }

        let chat = decode_frame(r#"{"type":"chat_message","sender":"a","content":"hi","timestamp":5000}"#).unwrap();
        dispatch_frame(&subs, &dedup, chat.clone());
        dispatch_frame(&subs, &dedup, chat);
        dispatch_frame(&subs, &dedup, WsMessage::Unknown);

        assert_eq!(*chats.borrow(), vec!["hi".to_string()]);
        assert_eq!(*updates.borrow(), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let (subs, dedup) = setup();
        let count = Rc::new(RefCell::new(0));
        let id = {
            let count = Rc::clone(&count);
            subs.borrow_mut().subscribe_error(move |_| *count.borrow_mut() += 1)
        };
        dispatch_frame(&subs, &dedup, WsMessage::Error { message: "x".into() });
        assert!(subs.borrow_mut().unsubscribe(id));
        assert!(!subs.borrow_mut().unsubscribe(id));
        dispatch_frame(&subs, &dedup, WsMessage::Error { message: "y".into() });
        assert_eq!(*count.borrow(), 1);
        assert!(subs.borrow().is_empty());
    }

    #[test]
    fn callbacks_may_subscribe_while_dispatching() {
        let (subs, dedup) = setup();
        let inner = Rc::clone(&subs);
        subs.borrow_mut().subscribe_agent_thought(move |_| {
            inner.borrow_mut().subscribe_connect(|| {});
        });
        dispatch_frame(
            &subs,
            &dedup,
            WsMessage::AgentThought(AgentThought {
                agent_id: None,
                agent_name: None,
                execution_id: None,
                thought: "t".into(),
                timestamp: 1,
            }),
        );
        assert_eq!(subs.borrow().len(), 2);
    }

    #[test]
    fn failed_open_does_not_block_the_next_connect() {
        let channel = LiveChannel::default();
        let generation = {
            let mut inner = channel.inner.borrow_mut();
            inner.user_id = Some("u1".into());
            inner.state = ConnectionState::Connecting;
            inner.generation += 1;
            inner.generation
        };
        assert!(channel.is_open_for("u1"));

        channel.open_failed(generation, "SyntaxError");
        assert_eq!(channel.state(), ConnectionState::Error("SyntaxError".into()));
        assert!(!channel.is_open_for("u1"));
    }

    #[test]
    fn stale_open_failure_keeps_newer_state() {
        let channel = LiveChannel::default();
        {
            let mut inner = channel.inner.borrow_mut();
            inner.user_id = Some("u1".into());
            inner.state = ConnectionState::Connected;
            inner.generation = 4;
        }
        channel.open_failed(3, "late");
        assert_eq!(channel.state(), ConnectionState::Connected);
    }

    #[test]
    fn ping_is_answered_with_pong() {
        let (subs, dedup) = setup();
        let reply = dispatch_frame(&subs, &dedup, WsMessage::Ping { timestamp: Some(9) });
        assert_eq!(reply, Some(WsMessage::Pong { timestamp: Some(9) }));
    }
}
