use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use {
    tokio::{
        sync::broadcast,
        task::JoinHandle,
        time::{self, MissedTickBehavior},
    },
    tracing::{debug, info, warn},
};

use {
    banter_client::{ApiClient, ApiError, Message, validate::validate_message_text},
    banter_session::SessionStore,
};

use crate::state::FeedState;

/// Feed lifecycle notifications for the presentation collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEvent {
    /// The message list changed (snapshot applied or send acknowledged).
    Updated,
    /// A pull or send hit a 401. The session store has been cleared and
    /// the polling loop halted; a new login is required.
    SessionExpired,
}

/// Keeps the local message list eventually consistent with the server.
///
/// While active, a background task pulls a full snapshot at a fixed
/// period (an immediate pull, then one per tick; a tick that fires while
/// a pull is in flight is skipped). `send` appends the server-acknowledged
/// message without waiting for the next tick. The list is always ascending
/// by id with no duplicates — see `FeedState` for the guards.
pub struct MessageFeed {
    client: Arc<ApiClient>,
    store: Arc<SessionStore>,
    state: Arc<Mutex<FeedState>>,
    events: broadcast::Sender<FeedEvent>,
    poll_interval: Duration,
    page_limit: u32,
    task: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MessageFeed {
    pub fn new(
        client: Arc<ApiClient>,
        store: Arc<SessionStore>,
        poll_interval: Duration,
        page_limit: u32,
    ) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            client,
            store,
            state: Arc::new(Mutex::new(FeedState::default())),
            events,
            poll_interval,
            page_limit,
            task: Mutex::new(None),
        }
    }

    /// Subscribe to feed notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    /// A point-in-time copy of the ordered message list.
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.state).snapshot()
    }

    pub fn is_active(&self) -> bool {
        lock(&self.state).is_active()
    }

    /// Activate the feed and spawn the polling task: an immediate pull,
    /// then one per period until `stop()`. No-op when already running or
    /// when no session is active.
    pub fn start(&self) {
        let mut task = lock(&self.task);
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        if !self.store.is_authenticated() {
            warn!("not starting message feed without an active session");
            return;
        }

        let generation = lock(&self.state).activate();
        debug!(interval_ms = self.poll_interval.as_millis() as u64, "message feed started");

        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let poll_interval = self.poll_interval;
        let page_limit = self.page_limit;

        *task = Some(tokio::spawn(async move {
            let mut ticker = time::interval(poll_interval);
            // A tick that fires while a pull is in flight is lost, not queued.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !lock(&state).is_current(generation) {
                    break;
                }
                if !pull_once(&client, &store, &state, &events, page_limit).await {
                    break;
                }
            }
        }));
    }

    /// Halt the polling task and discard the message list. A pull already
    /// past the network boundary observes the stale generation and is a
    /// no-op on the discarded feed.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
        lock(&self.state).deactivate();
        debug!("message feed stopped");
    }

    /// One manual pull, subject to the same in-flight and staleness guards
    /// as the timer-driven pulls.
    pub async fn pull(&self) {
        pull_once(
            &self.client,
            &self.store,
            &self.state,
            &self.events,
            self.page_limit,
        )
        .await;
    }

    /// Send a message and append the server-acknowledged result to the
    /// list. Validation failures resolve locally; on any other failure the
    /// list is unchanged and the caller keeps the text for retry.
    pub async fn send(&self, text: &str) -> Result<Message, ApiError> {
        let trimmed = validate_message_text(text)?;

        let generation = {
            let state = lock(&self.state);
            if !state.is_active() {
                return Err(ApiError::Auth("message feed is not active".into()));
            }
            state.generation()
        };
        let token = self
            .store
            .token()
            .ok_or_else(|| ApiError::Auth("no active session".into()))?;

        match self.client.create_message(&token, trimmed).await {
            Ok(message) => {
                if lock(&self.state).append(generation, message.clone()) {
                    let _ = self.events.send(FeedEvent::Updated);
                }
                Ok(message)
            },
            Err(e) if e.is_auth() => {
                expire(&self.store, &self.state, &self.events);
                Err(e)
            },
            Err(e) => Err(e),
        }
    }
}

/// One pull cycle. Returns false when polling should halt (feed stopped
/// or session expired).
async fn pull_once(
    client: &ApiClient,
    store: &SessionStore,
    state: &Mutex<FeedState>,
    events: &broadcast::Sender<FeedEvent>,
    page_limit: u32,
) -> bool {
    let Some(generation) = lock(state).begin_pull() else {
        // In flight (tick skipped) or inactive (halt).
        return lock(state).is_active();
    };

    let Some(token) = store.token() else {
        // Logout raced the tick; wind the feed down quietly.
        lock(state).deactivate();
        return false;
    };

    let result = client.list_messages(&token, page_limit, 0).await;

    let applied = {
        let mut st = lock(state);
        st.finish_pull(generation);
        match result {
            Ok(page) => st.apply_snapshot(generation, page.messages),
            Err(e) if e.is_auth() => {
                drop(st);
                info!("session expired during pull");
                expire(store, state, events);
                return false;
            },
            Err(e) => {
                // Polling is self-healing; the next tick retries.
                warn!(error = %e, "message pull failed");
                return true;
            },
        }
    };

    if applied {
        let _ = events.send(FeedEvent::Updated);
    }
    true
}

/// 401 from pull or send: clear the session, halt the feed, tell the
/// presentation layer.
fn expire(store: &SessionStore, state: &Mutex<FeedState>, events: &broadcast::Sender<FeedEvent>) {
    lock(state).deactivate();
    store.clear();
    let _ = events.send(FeedEvent::SessionExpired);
}

#[cfg(test)]
mod tests {
    use banter_client::UserIdentity;

    use super::*;

    const FAST_POLL: Duration = Duration::from_millis(50);
    const SLOW_POLL: Duration = Duration::from_secs(600);

    fn authed_store(dir: &tempfile::TempDir) -> Arc<SessionStore> {
        let store = Arc::new(SessionStore::with_path(dir.path().join("session.json")));
        store.set(
            "T1".into(),
            UserIdentity {
                id: 7,
                username: "alice".into(),
            },
        );
        store
    }

    fn feed(server: &mockito::Server, store: Arc<SessionStore>, poll: Duration) -> MessageFeed {
        let client = Arc::new(ApiClient::new(&server.url()).unwrap());
        MessageFeed::new(client, store, poll, 100)
    }

    async fn wait_for(rx: &mut broadcast::Receiver<FeedEvent>, wanted: FeedEvent) {
        loop {
            let event = time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            if event == wanted {
                return;
            }
        }
    }

    fn page_body(ids: &[i64]) -> String {
        let messages: Vec<String> = ids
            .iter()
            .map(|id| {
                format!(
                    r#"{{"id":{id},"username":"alice","text":"msg {id}","created_at":"2026-01-05T10:00:00Z"}}"#
                )
            })
            .collect();
        format!(r#"{{"messages":[{}],"total":{}}}"#, messages.join(","), ids.len())
    }

    #[tokio::test]
    async fn test_start_pulls_immediately_and_orders_snapshot() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/messages")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("limit".into(), "100".into()),
                mockito::Matcher::UrlEncoded("offset".into(), "0".into()),
            ]))
            .with_status(200)
            .with_body(page_body(&[42, 41, 40]))
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let feed = feed(&server, authed_store(&dir), SLOW_POLL);
        let mut rx = feed.subscribe();

        feed.start();
        wait_for(&mut rx, FeedEvent::Updated).await;

        let ids: Vec<i64> = feed.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![40, 41, 42]);
        feed.stop();
    }

    #[tokio::test]
    async fn test_polling_repeats_at_interval() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/messages")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(page_body(&[1]))
            .expect_at_least(3)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let feed = feed(&server, authed_store(&dir), FAST_POLL);
        feed.start();
        time::sleep(Duration::from_millis(400)).await;
        feed.stop();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_pull_401_clears_session_and_halts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/messages")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .with_body(r#"{"error":"Invalid token."}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = authed_store(&dir);
        let feed = feed(&server, Arc::clone(&store), FAST_POLL);
        let mut rx = feed.subscribe();

        feed.start();
        wait_for(&mut rx, FeedEvent::SessionExpired).await;

        assert!(!store.is_authenticated());
        assert!(!feed.is_active());
        assert!(feed.messages().is_empty());

        // The loop halted: no further pulls on subsequent ticks.
        time::sleep(Duration::from_millis(250)).await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_appends_acknowledged_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/messages")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(page_body(&[40, 41]))
            .create_async()
            .await;
        server
            .mock("POST", "/api/messages")
            .match_header("authorization", "Bearer T1")
            .match_body(mockito::Matcher::Json(serde_json::json!({ "text": "hi" })))
            .with_status(201)
            .with_body(
                r#"{"id":42,"username":"alice","text":"hi","created_at":"2026-01-05T10:00:03Z"}"#,
            )
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let feed = feed(&server, authed_store(&dir), SLOW_POLL);
        let mut rx = feed.subscribe();
        feed.start();
        wait_for(&mut rx, FeedEvent::Updated).await;

        // Leading/trailing whitespace is trimmed before the wire.
        let sent = feed.send("  hi  ").await.unwrap();
        assert_eq!(sent.id, 42);

        let ids: Vec<i64> = feed.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![40, 41, 42]);
        feed.stop();
    }

    #[tokio::test]
    async fn test_send_precheck_makes_no_network_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/messages")
            .expect(0)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let feed = feed(&server, authed_store(&dir), SLOW_POLL);
        // No start(): validation fires before the active check matters here.
        let err = feed.send("   ").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(feed.messages().is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_failure_leaves_list_unchanged() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/messages")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(page_body(&[40]))
            .create_async()
            .await;
        server
            .mock("POST", "/api/messages")
            .with_status(500)
            .with_body("{}")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let feed = feed(&server, authed_store(&dir), SLOW_POLL);
        let mut rx = feed.subscribe();
        feed.start();
        wait_for(&mut rx, FeedEvent::Updated).await;

        assert!(feed.send("hi").await.is_err());
        let ids: Vec<i64> = feed.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![40]);
        feed.stop();
    }

    #[tokio::test]
    async fn test_send_401_expires_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/messages")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(page_body(&[40]))
            .create_async()
            .await;
        server
            .mock("POST", "/api/messages")
            .with_status(401)
            .with_body(r#"{"error":"Invalid token."}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = authed_store(&dir);
        let feed = feed(&server, Arc::clone(&store), SLOW_POLL);
        let mut rx = feed.subscribe();
        feed.start();
        wait_for(&mut rx, FeedEvent::Updated).await;

        let err = feed.send("hi").await.unwrap_err();
        assert!(err.is_auth());
        wait_for(&mut rx, FeedEvent::SessionExpired).await;
        assert!(!store.is_authenticated());
        assert!(!feed.is_active());
    }

    #[tokio::test]
    async fn test_network_error_keeps_polling() {
        // First tick fails at the transport level, loop stays alive.
        let dir = tempfile::tempdir().unwrap();
        let store = authed_store(&dir);
        let client = Arc::new(ApiClient::new("http://127.0.0.1:1").unwrap());
        let feed = MessageFeed::new(client, Arc::clone(&store), FAST_POLL, 100);

        feed.start();
        time::sleep(Duration::from_millis(200)).await;
        assert!(feed.is_active());
        assert!(store.is_authenticated());
        feed.stop();
    }

    #[tokio::test]
    async fn test_stop_discards_list_and_halts_polling() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/messages")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(page_body(&[40]))
            .expect_at_most(3)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let feed = feed(&server, authed_store(&dir), FAST_POLL);
        let mut rx = feed.subscribe();
        feed.start();
        wait_for(&mut rx, FeedEvent::Updated).await;

        feed.stop();
        assert!(!feed.is_active());
        assert!(feed.messages().is_empty());

        time::sleep(Duration::from_millis(250)).await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_after_stop_is_rejected() {
        let server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let feed = feed(&server, authed_store(&dir), SLOW_POLL);
        feed.stop();

        let err = feed.send("hi").await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_start_without_session_does_nothing() {
        let server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::with_path(dir.path().join("session.json")));
        let feed = feed(&server, store, FAST_POLL);

        feed.start();
        assert!(!feed.is_active());
    }

    #[tokio::test]
    async fn test_start_twice_keeps_single_loop() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/messages")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(page_body(&[40]))
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let feed = feed(&server, authed_store(&dir), SLOW_POLL);
        let mut rx = feed.subscribe();
        feed.start();
        wait_for(&mut rx, FeedEvent::Updated).await;

        // Second start is a no-op: the populated list survives.
        feed.start();
        assert_eq!(feed.messages().len(), 1);
        feed.stop();
    }
}
