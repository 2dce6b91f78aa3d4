//! Room-based realtime fanout.
//!
//! The broadcaster is a typed registry: topic -> set of connection handles,
//! with `connect`/`join`/`leave`/`disconnect` as the only mutators. Each
//! connection owns an unbounded channel, so delivery within one connection is
//! FIFO in publish order; across connections no global order is guaranteed.
//! Delivery is at-most-once per subscriber per publish: the broadcaster is a
//! stateless notifier, not a durable queue, and a reconnecting client must
//! re-query current state.
//!
//! The registry lives behind a plain mutex (no await points while held), so
//! the state machine is deterministically unit-testable without a network
//! layer. The HTTP surface over it is in [`crate::api::events`].

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rocket::tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use serde::{Deserialize, Serialize};

use crate::model::{api::PostResults, mongodb::Id};

/// A named fanout channel that connections can join and leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Global voting activity: lightweight "a vote happened" events.
    Voting,
    /// Global results: full snapshots after every commit.
    Results,
    /// Results for one specific post.
    Post(Id),
    /// Privileged notifications for admin dashboards.
    Admin,
}

impl Topic {
    /// Does joining this topic require admin rights?
    pub fn is_privileged(&self) -> bool {
        matches!(self, Topic::Admin)
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "voting" => Ok(Topic::Voting),
            "results" => Ok(Topic::Results),
            "admin" => Ok(Topic::Admin),
            other => match other.strip_prefix("post-") {
                Some(id) => id
                    .parse::<Id>()
                    .map(Topic::Post)
                    .map_err(|_| format!("Invalid post topic: {other}")),
                None => Err(format!("Unknown topic: {other}")),
            },
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::Voting => write!(f, "voting"),
            Topic::Results => write!(f, "results"),
            Topic::Post(id) => write!(f, "post-{id}"),
            Topic::Admin => write!(f, "admin"),
        }
    }
}

/// A message pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
    /// A vote was committed. Deliberately omits the candidate: subscribers of
    /// the activity feed learn that voting is happening, not who is winning.
    VoteCast {
        post_id: Id,
        cast_at: DateTime<Utc>,
    },
    /// Fresh results snapshot on the global results topic.
    ResultsUpdate {
        post_id: Id,
        results: PostResults,
    },
    /// Fresh results snapshot on a per-post topic.
    PostResultsUpdate {
        post_id: Id,
        results: PostResults,
    },
    /// Turnout progress for admin dashboards.
    VotingProgress {
        post_id: Id,
        total_votes: u64,
        turnout_percentage: f64,
    },
    /// Free-form operational notification for admin dashboards.
    AdminNotification { message: String },
}

impl Event {
    /// The wire name of this event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::VoteCast { .. } => "vote-cast",
            Event::ResultsUpdate { .. } => "results-update",
            Event::PostResultsUpdate { .. } => "post-results-update",
            Event::VotingProgress { .. } => "voting-progress",
            Event::AdminNotification { .. } => "admin-notification",
        }
    }
}

/// Opaque handle identifying one connection. Random so that join/leave
/// endpoints cannot be driven against someone else's subscription.
pub type ConnectionId = Id;

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, UnboundedSender<Event>>,
    topics: HashMap<Topic, HashSet<ConnectionId>>,
}

impl Registry {
    fn disconnect(&mut self, connection: ConnectionId) {
        self.connections.remove(&connection);
        for members in self.topics.values_mut() {
            members.remove(&connection);
        }
        self.topics.retain(|_, members| !members.is_empty());
    }
}

/// Shared handle on the fanout registry; cheap to clone. Constructed once at
/// startup and passed to everything that publishes (no global singleton).
#[derive(Clone, Default)]
pub struct Broadcaster {
    registry: Arc<Mutex<Registry>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection with no topic memberships.
    /// The returned receiver yields this connection's messages in order.
    pub fn connect(&self) -> (ConnectionId, UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Id::new();
        let mut registry = self.registry.lock().unwrap();
        registry.connections.insert(id, tx);
        (id, rx)
    }

    /// Add the connection to a topic. Joining twice is a no-op.
    /// Fails if the connection is unknown (never connected or already gone).
    pub fn join(&self, connection: ConnectionId, topic: Topic) -> Result<(), ()> {
        let mut registry = self.registry.lock().unwrap();
        if !registry.connections.contains_key(&connection) {
            return Err(());
        }
        registry.topics.entry(topic).or_default().insert(connection);
        Ok(())
    }

    /// Remove the connection from a topic. Leaving a topic it never joined is
    /// a no-op.
    pub fn leave(&self, connection: ConnectionId, topic: Topic) -> Result<(), ()> {
        let mut registry = self.registry.lock().unwrap();
        if !registry.connections.contains_key(&connection) {
            return Err(());
        }
        if let Some(members) = registry.topics.get_mut(&topic) {
            members.remove(&connection);
            if members.is_empty() {
                registry.topics.remove(&topic);
            }
        }
        Ok(())
    }

    /// Drop the connection and all its topic memberships. Terminal: the
    /// connection ID cannot be revived, a client must reconnect.
    pub fn disconnect(&self, connection: ConnectionId) {
        self.registry.lock().unwrap().disconnect(connection);
    }

    /// Push an event to every current member of the topic. Members whose
    /// receiving half has gone away are treated as disconnected and pruned.
    /// Returns the number of subscribers the event was delivered to.
    pub fn publish(&self, topic: Topic, event: Event) -> usize {
        let mut registry = self.registry.lock().unwrap();
        let members = match registry.topics.get(&topic) {
            Some(members) => members.iter().copied().collect::<Vec<_>>(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for member in members {
            match registry.connections.get(&member) {
                Some(tx) => {
                    if tx.send(event.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        dead.push(member);
                    }
                }
                None => dead.push(member),
            }
        }
        for member in dead {
            registry.disconnect(member);
        }
        delivered
    }

    /// Push fresh results snapshots to the global and per-post results topics.
    /// Used whenever counts change: after a commit, and after an invalidation
    /// or restore changes what counts.
    pub fn results_changed(&self, post_id: Id, results: &PostResults) {
        self.publish(
            Topic::Results,
            Event::ResultsUpdate {
                post_id,
                results: results.clone(),
            },
        );
        self.publish(
            Topic::Post(post_id),
            Event::PostResultsUpdate {
                post_id,
                results: results.clone(),
            },
        );
    }

    /// Push a free-form notification to admin dashboards.
    pub fn notify_admins(&self, message: impl Into<String>) {
        self.publish(
            Topic::Admin,
            Event::AdminNotification {
                message: message.into(),
            },
        );
    }

    /// Fan out all messages for one committed vote: a lightweight activity
    /// event, fresh snapshots on the global and per-post results topics, and
    /// turnout progress for admins.
    pub fn vote_committed(&self, post_id: Id, cast_at: DateTime<Utc>, results: &PostResults) {
        self.publish(Topic::Voting, Event::VoteCast { post_id, cast_at });
        self.results_changed(post_id, results);
        self.publish(
            Topic::Admin,
            Event::VotingProgress {
                post_id,
                total_votes: results.total_votes,
                turnout_percentage: results.turnout_percentage,
            },
        );
    }

    /// Current number of members of a topic (diagnostics and tests).
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.registry
            .lock()
            .unwrap()
            .topics
            .get(&topic)
            .map(HashSet::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn results_with_total(total_votes: u64) -> PostResults {
        PostResults {
            tallies: HashMap::new(),
            total_votes,
            turnout_percentage: 0.0,
        }
    }

    fn event(n: u64) -> Event {
        Event::AdminNotification {
            message: format!("message {n}"),
        }
    }

    #[test]
    fn members_receive_in_publish_order() {
        let broadcaster = Broadcaster::new();
        let (conn, mut rx) = broadcaster.connect();
        broadcaster.join(conn, Topic::Admin).unwrap();

        for n in 0..5 {
            assert_eq!(broadcaster.publish(Topic::Admin, event(n)), 1);
        }
        for n in 0..5 {
            assert_eq!(rx.try_recv().unwrap(), event(n));
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn non_members_receive_nothing() {
        let broadcaster = Broadcaster::new();
        let (_conn, mut rx) = broadcaster.connect();

        // Connected but no topics: nothing is delivered.
        broadcaster.publish(Topic::Voting, event(0));
        assert!(rx.try_recv().is_err());

        // A member of a different topic is equally unaffected.
        let (other, mut other_rx) = broadcaster.connect();
        broadcaster.join(other, Topic::Results).unwrap();
        broadcaster.publish(Topic::Voting, event(1));
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn leave_stops_delivery() {
        let broadcaster = Broadcaster::new();
        let (conn, mut rx) = broadcaster.connect();
        broadcaster.join(conn, Topic::Voting).unwrap();

        broadcaster.publish(Topic::Voting, event(0));
        broadcaster.leave(conn, Topic::Voting).unwrap();
        broadcaster.publish(Topic::Voting, event(1));

        assert_eq!(rx.try_recv().unwrap(), event(0));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn duplicate_join_delivers_once() {
        let broadcaster = Broadcaster::new();
        let (conn, mut rx) = broadcaster.connect();
        broadcaster.join(conn, Topic::Voting).unwrap();
        broadcaster.join(conn, Topic::Voting).unwrap();

        assert_eq!(broadcaster.publish(Topic::Voting, event(0)), 1);
        assert_eq!(rx.try_recv().unwrap(), event(0));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disconnect_drops_all_memberships() {
        let broadcaster = Broadcaster::new();
        let (conn, _rx) = broadcaster.connect();
        broadcaster.join(conn, Topic::Voting).unwrap();
        broadcaster.join(conn, Topic::Results).unwrap();
        assert_eq!(broadcaster.subscriber_count(Topic::Voting), 1);

        broadcaster.disconnect(conn);
        assert_eq!(broadcaster.subscriber_count(Topic::Voting), 0);
        assert_eq!(broadcaster.subscriber_count(Topic::Results), 0);

        // Terminal state: the old handle cannot rejoin.
        assert!(broadcaster.join(conn, Topic::Voting).is_err());
    }

    #[test]
    fn dropped_receiver_is_pruned_on_publish() {
        let broadcaster = Broadcaster::new();
        let (conn, rx) = broadcaster.connect();
        broadcaster.join(conn, Topic::Voting).unwrap();
        drop(rx);

        assert_eq!(broadcaster.publish(Topic::Voting, event(0)), 0);
        assert_eq!(broadcaster.subscriber_count(Topic::Voting), 0);
        assert!(broadcaster.join(conn, Topic::Voting).is_err());
    }

    #[test]
    fn vote_committed_reaches_the_right_topics() {
        let broadcaster = Broadcaster::new();
        let post_id = Id::new();
        let other_post = Id::new();

        let (voting, mut voting_rx) = broadcaster.connect();
        broadcaster.join(voting, Topic::Voting).unwrap();
        let (post, mut post_rx) = broadcaster.connect();
        broadcaster.join(post, Topic::Post(post_id)).unwrap();
        let (other, mut other_rx) = broadcaster.connect();
        broadcaster.join(other, Topic::Post(other_post)).unwrap();
        let (admin, mut admin_rx) = broadcaster.connect();
        broadcaster.join(admin, Topic::Admin).unwrap();

        let cast_at = Utc::now();
        broadcaster.vote_committed(post_id, cast_at, &results_with_total(1));

        // Voting topic sees the lightweight event, which carries no candidate.
        match voting_rx.try_recv().unwrap() {
            Event::VoteCast { post_id: p, .. } => assert_eq!(p, post_id),
            other => panic!("unexpected event {other:?}"),
        }

        // The post's own topic sees a snapshot; an unrelated post's does not.
        match post_rx.try_recv().unwrap() {
            Event::PostResultsUpdate { results, .. } => assert_eq!(results.total_votes, 1),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(other_rx.try_recv().is_err());

        // Admins get turnout progress.
        match admin_rx.try_recv().unwrap() {
            Event::VotingProgress { total_votes, .. } => assert_eq!(total_votes, 1),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn topic_names_round_trip() {
        let id = Id::new();
        for topic in [Topic::Voting, Topic::Results, Topic::Admin, Topic::Post(id)] {
            assert_eq!(topic.to_string().parse::<Topic>().unwrap(), topic);
        }
        assert!("post-nonsense".parse::<Topic>().is_err());
        assert!("everything".parse::<Topic>().is_err());
    }
}
