//! HTTP surface of the realtime broadcaster.
//!
//! A client opens `GET /events?topics=...` and receives an SSE stream. The
//! first frame is a `connected` event carrying the connection ID; with it the
//! client can join and leave further topics while the stream stays open.
//! Dropping the stream (client disconnect) tears down every membership, and a
//! reconnecting client must re-query state it may have missed: the
//! broadcaster never replays.

use rocket::{
    response::stream::{Event as SseEvent, EventStream},
    serde::json::serde_json::json,
    Route, Shutdown, State,
};

use crate::{
    broadcast::{Broadcaster, ConnectionId, Topic},
    error::{Error, Result},
    model::{auth::AuthToken, db::admin::Admin},
};

pub fn routes() -> Vec<Route> {
    routes![events, join_topic, leave_topic]
}

/// Parse and authorise a list of topic names.
fn parse_topics(names: &[String], admin: bool) -> Result<Vec<Topic>> {
    names
        .iter()
        .map(|name| {
            let topic = name
                .parse::<Topic>()
                .map_err(|err| Error::validation("topics", err))?;
            if topic.is_privileged() && !admin {
                return Err(Error::forbidden(format!(
                    "Topic '{topic}' requires admin rights"
                )));
            }
            Ok(topic)
        })
        .collect()
}

/// Disconnects the connection when the stream is dropped, however that
/// happens (graceful leave, client hang-up, server shutdown).
struct ConnectionGuard {
    broadcaster: Broadcaster,
    connection: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.broadcaster.disconnect(self.connection);
    }
}

#[get("/events?<topics>")]
async fn events(
    token: Option<AuthToken<Admin>>,
    topics: Vec<String>,
    broadcaster: &State<Broadcaster>,
    mut end: Shutdown,
) -> Result<EventStream![SseEvent]> {
    let topics = parse_topics(&topics, token.is_some())?;

    let (connection, mut rx) = broadcaster.connect();
    for topic in &topics {
        // The connection was created just above and cannot be gone yet.
        broadcaster.join(connection, *topic).ok();
    }
    let guard = ConnectionGuard {
        broadcaster: broadcaster.inner().clone(),
        connection,
    };

    Ok(EventStream! {
        // Move the guard in so a dropped stream always disconnects.
        let _guard = guard;

        yield SseEvent::json(&json!({ "connection_id": connection.to_string() }))
            .event("connected");

        loop {
            let event = rocket::tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => event,
                    // Disconnected by the registry (e.g. server-side prune).
                    None => break,
                },
                _ = &mut end => break,
            };
            yield SseEvent::json(&event).event(event.kind());
        }
    })
}

#[post("/events/<connection>/topics/<topic>")]
async fn join_topic(
    token: Option<AuthToken<Admin>>,
    connection: ConnectionId,
    topic: &str,
    broadcaster: &State<Broadcaster>,
) -> Result<()> {
    let topic = parse_topics(&[topic.to_string()], token.is_some())?[0];
    broadcaster
        .join(connection, topic)
        .map_err(|()| Error::not_found(format!("Connection {connection}")))
}

#[delete("/events/<connection>/topics/<topic>")]
async fn leave_topic(
    connection: ConnectionId,
    topic: &str,
    broadcaster: &State<Broadcaster>,
) -> Result<()> {
    let topic = topic
        .parse::<Topic>()
        .map_err(|err| Error::validation("topic", err))?;
    broadcaster
        .leave(connection, topic)
        .map_err(|()| Error::not_found(format!("Connection {connection}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_authorisation() {
        let names = vec!["voting".to_string(), "results".to_string()];
        assert_eq!(
            parse_topics(&names, false).unwrap(),
            vec![Topic::Voting, Topic::Results]
        );

        // The admin topic needs rights...
        let names = vec!["admin".to_string()];
        assert!(matches!(
            parse_topics(&names, false),
            Err(Error::Forbidden(_))
        ));
        // ...and passes with them.
        assert_eq!(parse_topics(&names, true).unwrap(), vec![Topic::Admin]);

        // Unknown names are validation errors.
        let names = vec!["everything".to_string()];
        assert!(matches!(
            parse_topics(&names, true),
            Err(Error::Validation { .. })
        ));
    }
}
