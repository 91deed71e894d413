//! Interactive room loop: render the feed as it updates, send stdin
//! lines, exit on EOF or session expiry.

use std::{sync::Arc, time::Duration};

use {
    anyhow::bail,
    tokio::{
        io::{AsyncBufReadExt, BufReader},
        sync::broadcast,
    },
};

use {
    banter_client::ApiClient,
    banter_feed::{FeedEvent, MessageFeed},
    banter_session::SessionStore,
};

pub async fn run(
    client: Arc<ApiClient>,
    store: Arc<SessionStore>,
    poll_interval: Duration,
    page_limit: u32,
) -> anyhow::Result<()> {
    if !store.is_authenticated() {
        bail!("not logged in; run `banter login` first");
    }

    let feed = MessageFeed::new(client, store, poll_interval, page_limit);
    let mut events = feed.subscribe();
    feed.start();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut last_printed = 0i64;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(FeedEvent::Updated) => {
                    last_printed = print_new(&feed, last_printed);
                },
                Ok(FeedEvent::SessionExpired) => {
                    eprintln!("session expired; run `banter login` again");
                    break;
                },
                // Missed some notifications; the list itself is complete.
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    last_printed = print_new(&feed, last_printed);
                },
                Err(broadcast::error::RecvError::Closed) => break,
            },
            line = stdin.next_line() => match line {
                Ok(Some(text)) if text.trim().is_empty() => {},
                Ok(Some(text)) => {
                    // The feed validates and trims; a failed send keeps
                    // the text out of the list, so just report it.
                    if let Err(e) = feed.send(&text).await {
                        eprintln!("send failed: {e}");
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    feed.stop();
                    return Err(e.into());
                },
            },
        }
    }

    feed.stop();
    Ok(())
}

fn print_new(feed: &MessageFeed, last_printed: i64) -> i64 {
    let mut newest = last_printed;
    for message in feed.messages().iter().filter(|m| m.id > last_printed) {
        println!(
            "[{}] {}: {}",
            message.created_at.format("%H:%M"),
            message.username,
            message.text
        );
        newest = message.id;
    }
    newest
}
