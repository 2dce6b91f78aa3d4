use mongodb::bson::{doc, Document};
use rocket::serde::json::serde_json;
use serde::{Deserialize, Serialize};

use crate::model::db::audit::AuditAction;

/// Optional filters for querying the audit log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromForm)]
pub struct AuditQuery {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub target: Option<String>,
}

impl AuditQuery {
    /// Build the corresponding MongoDB filter document.
    ///
    /// An unrecognised `action` value matches nothing rather than everything,
    /// so a typo cannot silently widen a privileged query.
    pub fn to_filter(&self) -> Document {
        let mut filter = doc! {};
        if let Some(actor) = &self.actor {
            filter.insert("actor", actor);
        }
        if let Some(action) = &self.action {
            match serde_json::from_value::<AuditAction>(serde_json::Value::String(action.clone())) {
                Ok(action) => {
                    filter.insert("action", action);
                }
                Err(_) => {
                    filter.insert("action", "__unknown__");
                }
            }
        }
        if let Some(target) = &self.target {
            filter.insert("target", target);
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_matches_everything() {
        assert_eq!(AuditQuery::default().to_filter(), doc! {});
    }

    #[test]
    fn known_action_is_typed() {
        let query = AuditQuery {
            action: Some("VoteInvalidated".to_string()),
            ..Default::default()
        };
        assert_eq!(
            query.to_filter(),
            doc! { "action": AuditAction::VoteInvalidated }
        );
    }

    #[test]
    fn unknown_action_matches_nothing() {
        let query = AuditQuery {
            action: Some("MadeUpAction".to_string()),
            ..Default::default()
        };
        assert_eq!(query.to_filter(), doc! { "action": "__unknown__" });
    }
}
