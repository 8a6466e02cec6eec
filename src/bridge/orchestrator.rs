//! Bridge orchestrator that ties the game server and Discord together.
//!
//! Owns the connection lifecycle and both message directions. Game events
//! run through one outbound worker so Discord sees them in the order the
//! game produced them; Discord messages run through a separate inbound
//! worker so a slow webhook never holds up game-bound chat.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::common::{
    EventKind, GameEvent, OutboundNotification, RelayError, RemoteMessage, RenderError,
};
use crate::config::{RelayConfig, SettingsStore};
use crate::discord::{Dispatcher, RemoteSession, SessionConnector};
use crate::game::formatter::{
    death_reason, mask_mass_mentions, remap_color_codes, render, shortcode_emojis, Bindings,
};
use crate::game::GameServer;

use super::filter::{evaluate_with, FilterCache, FilterDirection, FilterReject};
use super::state::BridgeState;

/// What happened to one event or message.
#[derive(Debug)]
pub enum RelayOutcome {
    /// Posted to Discord.
    Delivered,
    /// Sent to the game as a broadcast.
    Broadcast,
    /// The event kind is switched off.
    Disabled,
    /// Dropped by a filter.
    Filtered(FilterReject),
    /// Rendering or delivery failed. Logged, never fatal.
    Failed(RelayError),
}

/// A game event after the checks that run before delivery.
#[derive(Debug)]
enum Prepared {
    Ready(OutboundNotification),
    Disabled,
    Filtered(FilterReject),
}

/// The relay between one game server and one Discord channel.
pub struct EventBridge {
    settings: Arc<SettingsStore>,
    dispatcher: Arc<dyn Dispatcher>,
    game: Arc<dyn GameServer>,
    filters: FilterCache,
    state: watch::Sender<BridgeState>,
}

impl EventBridge {
    pub fn new(
        settings: Arc<SettingsStore>,
        dispatcher: Arc<dyn Dispatcher>,
        game: Arc<dyn GameServer>,
    ) -> Self {
        let (state, _) = watch::channel(BridgeState::Disconnected);
        Self {
            settings,
            dispatcher,
            game,
            filters: FilterCache::new(),
            state,
        }
    }

    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    /// Move to `next` if that is a legal step. Illegal steps are refused
    /// and logged.
    fn transition(&self, next: BridgeState) -> bool {
        let mut from = BridgeState::Disconnected;
        let moved = self.state.send_if_modified(|current| {
            from = *current;
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });

        if moved {
            info!(from = %from, to = %next, "Bridge state changed");
        } else {
            warn!(from = %from, to = %next, "Refusing invalid bridge state transition");
        }
        moved
    }

    /// Open the Discord session and start relaying.
    ///
    /// Authentication is attempted once. On failure the bridge ends up
    /// [`BridgeState::Failed`] and stays there.
    pub async fn start(
        self: &Arc<Self>,
        connector: &dyn SessionConnector,
    ) -> Result<RelayHandle, RelayError> {
        if !self.transition(BridgeState::Authenticating) {
            if self.state().is_terminal() {
                warn!("Relay disabled after a failed login, restart to try again");
            }
            return Err(RelayError::InvalidState {
                state: self.state().name(),
            });
        }

        let config = self.settings.snapshot();
        let session = match connector
            .connect(&config.discord.token, config.discord.channel_id)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Discord login failed, relay disabled");
                self.transition(BridgeState::Failed);
                return Err(e);
            }
        };

        self.transition(BridgeState::Connected);

        let game_rx = self.game.subscribe();
        let remote_rx = session.subscribe();

        self.announce(&config.messages.connected, "connected").await;

        let outbound = tokio::spawn(Arc::clone(self).run_outbound(game_rx));
        let inbound = tokio::spawn(Arc::clone(self).run_inbound(remote_rx));

        Ok(RelayHandle {
            bridge: Arc::clone(self),
            session,
            outbound,
            inbound,
        })
    }

    async fn run_outbound(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<GameEvent>) {
        while let Some(event) = events.recv().await {
            self.relay_game_event(event).await;
        }
        debug!("Game -> Discord worker ended");
    }

    async fn run_inbound(self: Arc<Self>, mut messages: mpsc::UnboundedReceiver<RemoteMessage>) {
        while let Some(message) = messages.recv().await {
            self.relay_remote_message(message);
        }
        debug!("Discord -> Game worker ended");
    }

    /// Post a liveness text as the webhook itself. Empty texts are skipped.
    async fn announce(&self, text: &str, what: &str) {
        if text.trim().is_empty() {
            debug!("No {} message configured", what);
            return;
        }
        if let Err(e) = self.dispatcher.send(OutboundNotification::plain(text)).await {
            error!(error = %e, "Failed to post {} message", what);
        }
    }

    /// Relay one game event to Discord.
    pub async fn relay_game_event(&self, event: GameEvent) -> RelayOutcome {
        let config = self.settings.snapshot();
        let kind = event.kind();

        let notification = match self.build_notification(&event, &config) {
            Ok(Prepared::Ready(notification)) => notification,
            Ok(Prepared::Disabled) => {
                debug!(event = %kind, "Event disabled, not sending to Discord");
                return RelayOutcome::Disabled;
            }
            Ok(Prepared::Filtered(reason)) => {
                info!(event = %kind, "FILTERED Game -> Discord: {}", event.player());
                return RelayOutcome::Filtered(reason);
            }
            Err(e) => {
                error!(event = %kind, error = %e, "Failed to render Discord message");
                return RelayOutcome::Failed(e);
            }
        };

        info!(event = %kind, "Game -> Discord [{}]: {}", kind, notification.body);

        match self.dispatcher.send(notification).await {
            Ok(()) => RelayOutcome::Delivered,
            Err(e) => {
                error!(event = %kind, error = %e, "Failed to deliver Discord message");
                RelayOutcome::Failed(e.into())
            }
        }
    }

    /// Turn a game event into a webhook post under one config snapshot.
    ///
    /// Fails only when the rendered body comes out blank.
    fn build_notification(
        &self,
        event: &GameEvent,
        config: &Arc<RelayConfig>,
    ) -> Result<Prepared, RelayError> {
        let kind = event.kind();
        let player = event.player();
        let bindings = event_bindings(event);

        if let GameEvent::Chat { message, .. } = event {
            if !config.chat.enabled {
                return Ok(Prepared::Disabled);
            }

            let filter = self.filters.for_config(config);
            if filter.should_filter(FilterDirection::GameToDiscord, message) {
                return Ok(Prepared::Filtered(FilterReject::Pattern));
            }

            let body = if config.discord.block_mass_mentions {
                mask_mass_mentions(message)
            } else {
                message.clone()
            };
            if body.trim().is_empty() {
                return Err(empty_render(kind));
            }

            return Ok(Prepared::Ready(OutboundNotification {
                display_name: None,
                avatar_url: non_empty(render(&config.chat.avatar, &bindings)),
                body,
                username_override: Some(player.to_string()),
            }));
        }

        let Some(settings) = config.event(kind) else {
            return Ok(Prepared::Disabled);
        };
        if !settings.enabled {
            return Ok(Prepared::Disabled);
        }

        let body = render(&settings.format, &bindings);
        if body.trim().is_empty() {
            return Err(empty_render(kind));
        }

        Ok(Prepared::Ready(OutboundNotification {
            display_name: non_empty(settings.name.clone()),
            avatar_url: non_empty(render(&settings.avatar, &bindings)),
            body,
            username_override: None,
        }))
    }

    /// Relay one Discord message to the game.
    pub fn relay_remote_message(&self, message: RemoteMessage) -> RelayOutcome {
        let config = self.settings.snapshot();
        let filter = self.filters.for_config(&config);

        if let Err(reason) = evaluate_with(&message, &config, &filter) {
            match reason {
                FilterReject::Pattern => info!(
                    author = %message.author.tag,
                    "FILTERED Discord -> Game: {}",
                    message.content
                ),
                _ => debug!(author = %message.author.tag, ?reason, "Ignoring Discord message"),
            }
            return RelayOutcome::Filtered(reason);
        }

        let content = if config.discord.emoji_shortcodes {
            shortcode_emojis(&message.content)
        } else {
            message.content
        };

        let bindings = Bindings::new()
            .with("userTag", message.author.tag.as_str())
            .with("userMessage", content)
            .with("time", local_time());
        let line = remap_color_codes(&render(&config.messages.chat_format, &bindings));

        info!(author = %message.author.tag, "Discord -> Game: {}", line);
        self.game.broadcast(&line);
        RelayOutcome::Broadcast
    }
}

/// Placeholder values for a game event.
fn event_bindings(event: &GameEvent) -> Bindings {
    let bindings = Bindings::new()
        .with("username", event.player())
        .with("time", local_time());

    match event {
        GameEvent::Chat { message, .. } => bindings.with("message", message.as_str()),
        GameEvent::Died {
            player,
            death_message,
        } => bindings.with("reason", death_reason(death_message, player)),
        GameEvent::Joined { .. } | GameEvent::Left { .. } => bindings,
    }
}

fn local_time() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

fn empty_render(kind: EventKind) -> RelayError {
    RenderError::Empty { event: kind.name() }.into()
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// A running relay. Dropping it without [`RelayHandle::shutdown`] leaves
/// the workers running until both streams end.
pub struct RelayHandle {
    bridge: Arc<EventBridge>,
    session: Arc<dyn RemoteSession>,
    outbound: JoinHandle<()>,
    inbound: JoinHandle<()>,
}

impl RelayHandle {
    /// Stop relaying and disconnect.
    ///
    /// Events already queued are still delivered, so the disconnected
    /// message is the last post.
    pub async fn shutdown(self) {
        info!("Shutting down relay...");
        self.bridge.game.unsubscribe();
        self.session.unsubscribe();

        if let Err(e) = self.outbound.await {
            warn!("Game -> Discord worker panicked: {}", e);
        }
        if let Err(e) = self.inbound.await {
            warn!("Discord -> Game worker panicked: {}", e);
        }

        let config = self.bridge.settings.snapshot();
        self.bridge
            .announce(&config.messages.disconnected, "disconnected")
            .await;

        self.session.close().await;
        self.bridge.transition(BridgeState::Disconnected);
        info!("Relay stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Author, ChannelId, DeliveryError, EventHub};
    use crate::config::types::DEFAULT_EVENT_AVATAR;
    use serenity::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    const CHANNEL: ChannelId = 653102403725426701;

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<OutboundNotification>>,
        /// Bodies containing this text are rejected.
        fail_on: Option<&'static str>,
    }

    impl RecordingDispatcher {
        fn failing_on(text: &'static str) -> Self {
            Self {
                fail_on: Some(text),
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<OutboundNotification> {
            self.sent.lock().unwrap().clone()
        }

        fn bodies(&self) -> Vec<String> {
            self.sent().into_iter().map(|n| n.body).collect()
        }
    }

    #[async_trait]
    impl Dispatcher for RecordingDispatcher {
        async fn send(&self, notification: OutboundNotification) -> Result<(), DeliveryError> {
            if let Some(text) = self.fail_on {
                if notification.body.contains(text) {
                    return Err(DeliveryError::Rejected {
                        status: 500,
                        body: "internal error".to_string(),
                    });
                }
            }
            self.sent.lock().unwrap().push(notification);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeGame {
        events: EventHub<GameEvent>,
        broadcasts: Mutex<Vec<String>>,
    }

    impl GameServer for FakeGame {
        fn subscribe(&self) -> mpsc::UnboundedReceiver<GameEvent> {
            self.events.subscribe()
        }

        fn unsubscribe(&self) {
            self.events.unsubscribe();
        }

        fn broadcast(&self, line: &str) {
            self.broadcasts.lock().unwrap().push(line.to_string());
        }
    }

    #[derive(Default)]
    struct FakeSession {
        messages: EventHub<RemoteMessage>,
        closed: AtomicBool,
    }

    #[async_trait]
    impl RemoteSession for FakeSession {
        fn subscribe(&self) -> mpsc::UnboundedReceiver<RemoteMessage> {
            self.messages.subscribe()
        }

        fn unsubscribe(&self) {
            self.messages.unsubscribe();
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct FakeConnector {
        session: Arc<FakeSession>,
        reject: bool,
    }

    #[async_trait]
    impl SessionConnector for FakeConnector {
        async fn connect(
            &self,
            token: &str,
            channel_id: ChannelId,
        ) -> Result<Arc<dyn RemoteSession>, RelayError> {
            assert_eq!(token, "token");
            assert_eq!(channel_id, CHANNEL);
            if self.reject {
                return Err(RelayError::Auth {
                    reason: "invalid bot token".to_string(),
                });
            }
            Ok(self.session.clone())
        }
    }

    struct Harness {
        bridge: Arc<EventBridge>,
        dispatcher: Arc<RecordingDispatcher>,
        game: Arc<FakeGame>,
        session: Arc<FakeSession>,
    }

    impl Harness {
        fn new(config: RelayConfig) -> Self {
            Self::with_dispatcher(config, RecordingDispatcher::default())
        }

        fn with_dispatcher(config: RelayConfig, dispatcher: RecordingDispatcher) -> Self {
            let dispatcher = Arc::new(dispatcher);
            let game = Arc::new(FakeGame::default());
            let bridge = Arc::new(EventBridge::new(
                Arc::new(SettingsStore::from_config(config)),
                dispatcher.clone(),
                game.clone(),
            ));
            Self {
                bridge,
                dispatcher,
                game,
                session: Arc::new(FakeSession::default()),
            }
        }

        fn connector(&self, reject: bool) -> FakeConnector {
            FakeConnector {
                session: self.session.clone(),
                reject,
            }
        }

        fn broadcasts(&self) -> Vec<String> {
            self.game.broadcasts.lock().unwrap().clone()
        }
    }

    fn make_config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.discord.token = "token".to_string();
        config.discord.channel_id = CHANNEL;
        config
    }

    fn chat(player: &str, message: &str) -> GameEvent {
        GameEvent::Chat {
            player: player.to_string(),
            message: message.to_string(),
        }
    }

    fn joined(player: &str) -> GameEvent {
        GameEvent::Joined {
            player: player.to_string(),
        }
    }

    fn remote(bot: bool, channel_id: ChannelId, content: &str) -> RemoteMessage {
        RemoteMessage {
            author: Author {
                tag: "bob".to_string(),
                bot,
            },
            channel_id,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_disabled_event_is_not_sent() {
        let mut config = make_config();
        config.events.join.enabled = false;
        let h = Harness::new(config);

        let outcome = h.bridge.relay_game_event(joined("Steve")).await;
        assert!(matches!(outcome, RelayOutcome::Disabled));
        assert!(h.dispatcher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_join_uses_event_settings() {
        let h = Harness::new(make_config());

        let outcome = h.bridge.relay_game_event(joined("Steve")).await;
        assert!(matches!(outcome, RelayOutcome::Delivered));
        assert_eq!(
            h.dispatcher.sent(),
            vec![OutboundNotification {
                display_name: Some("Join Notification".to_string()),
                avatar_url: Some(DEFAULT_EVENT_AVATAR.to_string()),
                body: "```Steve joined the game```".to_string(),
                username_override: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_death_reason_strips_player_prefix() {
        let h = Harness::new(make_config());

        h.bridge
            .relay_game_event(GameEvent::Died {
                player: "Steve".to_string(),
                death_message: "Steve was slain by Zombie".to_string(),
            })
            .await;
        assert_eq!(h.dispatcher.bodies(), vec!["```Steve was slain by Zombie```"]);
    }

    #[tokio::test]
    async fn test_chat_masks_mass_mentions() {
        let mut config = make_config();
        config.discord.block_mass_mentions = true;
        let h = Harness::new(config);

        h.bridge.relay_game_event(chat("Amy", "hi @everyone")).await;

        let sent = h.dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "hi (at)everyone");
        assert_eq!(sent[0].effective_username(), Some("Amy"));
        assert_eq!(
            sent[0].avatar_url.as_deref(),
            Some("https://cravatar.eu/helmavatar/Amy/190.png")
        );
    }

    #[tokio::test]
    async fn test_chat_unmasked_when_disabled() {
        let h = Harness::new(make_config());
        h.bridge.relay_game_event(chat("Amy", "hi @here")).await;
        assert_eq!(h.dispatcher.bodies(), vec!["hi @here"]);
    }

    #[tokio::test]
    async fn test_chat_pattern_filter() {
        let mut config = make_config();
        config.filters.game_to_discord = vec!["(?i)gold.*sell".to_string()];
        let h = Harness::new(config);

        let outcome = h.bridge.relay_game_event(chat("Amy", "GOLD for sell")).await;
        assert!(matches!(outcome, RelayOutcome::Filtered(FilterReject::Pattern)));
        assert!(h.dispatcher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_blank_render_is_render_error() {
        let mut config = make_config();
        config.events.leave.format = "   ".to_string();
        let h = Harness::new(config);

        let outcome = h
            .bridge
            .relay_game_event(GameEvent::Left {
                player: "Steve".to_string(),
            })
            .await;
        assert!(matches!(
            outcome,
            RelayOutcome::Failed(RelayError::Render(RenderError::Empty { event: "leave" }))
        ));
        assert!(h.dispatcher.sent().is_empty());
    }

    #[test]
    fn test_build_notification_separates_skips_from_errors() {
        let mut config = make_config();
        config.chat.enabled = false;
        config.events.death.format = "".to_string();
        config.filters.game_to_discord = vec!["spam".to_string()];
        let h = Harness::new(config);
        let config = h.bridge.settings.snapshot();

        let built = h.bridge.build_notification(&chat("Amy", "spam"), &config);
        assert!(matches!(built, Ok(Prepared::Disabled)));

        let built = h.bridge.build_notification(&joined("Steve"), &config);
        assert!(matches!(built, Ok(Prepared::Ready(_))));

        let died = GameEvent::Died {
            player: "Steve".to_string(),
            death_message: "Steve fell".to_string(),
        };
        let built = h.bridge.build_notification(&died, &config);
        assert!(matches!(
            built,
            Err(RelayError::Render(RenderError::Empty { event: "death" }))
        ));

        let mut config = (*config).clone();
        config.chat.enabled = true;
        let built = h.bridge.build_notification(&chat("Amy", "spam"), &Arc::new(config));
        assert!(matches!(built, Ok(Prepared::Filtered(FilterReject::Pattern))));
    }

    #[tokio::test]
    async fn test_delivery_error_does_not_stop_bridge() {
        let h = Harness::with_dispatcher(make_config(), RecordingDispatcher::failing_on("boom"));
        let handle = h.bridge.start(&h.connector(false)).await.unwrap();

        let failed = h.bridge.relay_game_event(chat("Amy", "boom")).await;
        assert!(matches!(failed, RelayOutcome::Failed(RelayError::Delivery(_))));

        let next = h.bridge.relay_game_event(joined("Steve")).await;
        assert!(matches!(next, RelayOutcome::Delivered));
        assert_eq!(h.bridge.state(), BridgeState::Connected);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_inbound_remaps_and_broadcasts() {
        let h = Harness::new(make_config());

        let outcome = h.bridge.relay_remote_message(remote(false, CHANNEL, "&ahi 😀"));
        assert!(matches!(outcome, RelayOutcome::Broadcast));
        assert_eq!(
            h.broadcasts(),
            vec!["§b§l[Discord] §r<bob> §ahi :grinning:"]
        );
    }

    #[tokio::test]
    async fn test_inbound_rejections() {
        let h = Harness::new(make_config());

        assert!(matches!(
            h.bridge.relay_remote_message(remote(true, CHANNEL, "hello")),
            RelayOutcome::Filtered(FilterReject::Automated)
        ));
        assert!(matches!(
            h.bridge.relay_remote_message(remote(false, CHANNEL + 1, "hello")),
            RelayOutcome::Filtered(FilterReject::WrongChannel)
        ));
        assert!(matches!(
            h.bridge.relay_remote_message(remote(false, CHANNEL, "  ")),
            RelayOutcome::Filtered(FilterReject::Empty)
        ));
        assert!(h.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_is_terminal() {
        let h = Harness::new(make_config());

        let result = h.bridge.start(&h.connector(true)).await;
        assert!(matches!(result, Err(RelayError::Auth { .. })));
        assert_eq!(h.bridge.state(), BridgeState::Failed);
        assert!(h.dispatcher.sent().is_empty());
        assert!(!h.game.events.has_subscriber());

        let again = h.bridge.start(&h.connector(false)).await;
        assert!(matches!(again, Err(RelayError::InvalidState { state: "failed" })));
    }

    #[tokio::test]
    async fn test_lifecycle_orders_liveness_messages() {
        let h = Harness::new(make_config());
        let handle = h.bridge.start(&h.connector(false)).await.unwrap();
        assert_eq!(h.bridge.state(), BridgeState::Connected);
        assert!(h.game.events.has_subscriber());
        assert!(h.session.messages.has_subscriber());

        assert!(h.game.events.publish(joined("Steve")));
        assert!(h.game.events.publish(chat("Steve", "hello")));
        assert!(h.session.messages.publish(remote(false, CHANNEL, "hey Steve")));

        handle.shutdown().await;

        assert_eq!(
            h.dispatcher.bodies(),
            vec![
                "Relay connected",
                "```Steve joined the game```",
                "hello",
                "Relay disconnected",
            ]
        );
        assert_eq!(h.broadcasts(), vec!["§b§l[Discord] §r<bob> hey Steve"]);
        assert_eq!(h.bridge.state(), BridgeState::Disconnected);
        assert!(h.session.closed.load(Ordering::SeqCst));
        assert!(!h.game.events.has_subscriber());
    }
}
