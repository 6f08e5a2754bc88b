//! Connection-scoped session state
//!
//! A session lives exactly as long as its connection: created on connect,
//! discarded on disconnect, never persisted. It carries the resolved
//! identity (or none, for guests), the currently selected group view, and
//! the one-shot staged AUTHINFO credential pair.

use crate::identity::UserInfo;
use crate::index::{Group, RecordId};

/// Snapshot of the selected group, taken at GROUP time
///
/// Water marks are copied into the session on selection; a concurrent
/// retention pass may advance the stored group, which a reader observes
/// only on reselection. That transient staleness is acceptable: the worst
/// case is a just-pruned article reported absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupView {
    /// Group row id
    pub id: RecordId,
    /// Content type, kept for render dispatch
    pub content_type: String,
    /// Newsgroup name
    pub name: String,
    /// Low water mark at selection time
    pub min_index: u64,
    /// High water mark at selection time
    pub max_index: u64,
    /// Estimated article count (max - min + 1, or 0 when empty)
    pub total: u64,
    /// Article cursor, starts at the low water mark
    pub current_article: u64,
}

impl GroupView {
    /// Build a view from a group row
    #[must_use]
    pub fn from_group(group: &Group) -> Self {
        Self {
            id: group.id,
            content_type: group.content_type.clone(),
            name: group.name.clone(),
            min_index: group.min_index,
            max_index: group.max_index,
            total: group.total(),
            current_article: group.min_index,
        }
    }
}

/// Per-connection session state
#[derive(Debug, Default)]
pub struct Session {
    user_info: Option<UserInfo>,
    group: Option<GroupView>,
    authinfo_user: Option<String>,
    authinfo_pass: Option<String>,
}

impl Session {
    /// Create an anonymous session with nothing selected
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an identity has been bound by authentication
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user_info.is_some()
    }

    /// The bound identity, if any
    #[must_use]
    pub fn user_info(&self) -> Option<&UserInfo> {
        self.user_info.as_ref()
    }

    /// Bind a resolved identity to this session
    pub fn bind_identity(&mut self, info: UserInfo) {
        self.user_info = Some(info);
    }

    /// The requester's locale, if their account has one
    #[must_use]
    pub fn locale(&self) -> Option<&str> {
        self.user_info.as_ref()?.locale.as_deref()
    }

    /// The selected group view, if any
    #[must_use]
    pub fn group(&self) -> Option<&GroupView> {
        self.group.as_ref()
    }

    /// Mutable access to the selected group view (cursor updates)
    #[must_use]
    pub fn group_mut(&mut self) -> Option<&mut GroupView> {
        self.group.as_mut()
    }

    /// Replace the selected group view
    pub fn select_group(&mut self, view: GroupView) {
        self.group = Some(view);
    }

    /// Stage the AUTHINFO USER half of a credential pair
    pub fn stage_user(&mut self, user: impl Into<String>) {
        self.authinfo_user = Some(user.into());
    }

    /// Stage the AUTHINFO PASS half of a credential pair
    pub fn stage_pass(&mut self, pass: impl Into<String>) {
        self.authinfo_pass = Some(pass.into());
    }

    /// Whether a username is staged (PASS is only legal after USER)
    #[must_use]
    pub fn has_staged_user(&self) -> bool {
        self.authinfo_user.is_some()
    }

    /// Consume the staged credential pair, clearing both halves
    ///
    /// Called exactly once per authentication attempt; the pair is gone
    /// afterwards regardless of the attempt's outcome.
    pub fn take_credentials(&mut self) -> (Option<String>, Option<String>) {
        (self.authinfo_user.take(), self.authinfo_pass.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_anonymous_and_unselected() {
        let session = Session::new();
        assert!(!session.is_authenticated());
        assert!(session.group().is_none());
        assert!(session.locale().is_none());
    }

    #[test]
    fn test_group_view_totals() {
        let mut group = Group::new("general", RecordId::generate(), "forum");
        group.min_index = 5;
        group.max_index = 10;

        let view = GroupView::from_group(&group);
        assert_eq!(view.total, 6);
        assert_eq!(view.current_article, 5);

        // Empty group: min = max + 1
        group.min_index = 11;
        let view = GroupView::from_group(&group);
        assert_eq!(view.total, 0);
    }

    #[test]
    fn test_take_credentials_clears_both() {
        let mut session = Session::new();
        session.stage_user("alice");
        session.stage_pass("secret");
        assert!(session.has_staged_user());

        let (user, pass) = session.take_credentials();
        assert_eq!(user.as_deref(), Some("alice"));
        assert_eq!(pass.as_deref(), Some("secret"));

        // Immediately gone: a second take yields nothing
        let (user, pass) = session.take_credentials();
        assert!(user.is_none());
        assert!(pass.is_none());
        assert!(!session.has_staged_user());
    }

    #[test]
    fn test_bind_identity() {
        let mut session = Session::new();
        session.bind_identity(UserInfo {
            user: Some(RecordId::generate()),
            name: "alice".to_string(),
            locale: Some("fr-FR".to_string()),
        });

        assert!(session.is_authenticated());
        assert_eq!(session.locale(), Some("fr-FR"));
    }
}
