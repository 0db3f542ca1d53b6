//! Group gate: whether the bot may respond in an event's conversation.

use crate::channels::InboundEvent;
use crate::config::{GroupPolicy, GroupsConfig};

/// Permission check consulted before gated commands run.
pub trait GroupGate: Send + Sync {
    fn allowed(&self, event: &InboundEvent) -> bool;
}

/// Gate driven by the `groups` config section. Private chats are always allowed.
#[derive(Debug, Clone, Default)]
pub struct PolicyGate {
    policy: GroupPolicy,
    allowlist: Vec<String>,
}

impl PolicyGate {
    pub fn new(policy: GroupPolicy, allowlist: Vec<String>) -> Self {
        Self {
            policy,
            allowlist: allowlist
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn from_config(groups: &GroupsConfig) -> Self {
        Self::new(groups.policy, groups.allowlist.clone())
    }
}

impl GroupGate for PolicyGate {
    fn allowed(&self, event: &InboundEvent) -> bool {
        if event.conversation_kind.is_private() {
            return true;
        }
        match self.policy {
            GroupPolicy::Open => true,
            GroupPolicy::Allowlist => self.allowlist.iter().any(|id| *id == event.conversation_id),
            GroupPolicy::Disabled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ConversationKind;

    fn event(conversation_id: &str, kind: ConversationKind) -> InboundEvent {
        InboundEvent {
            channel_id: "telegram".into(),
            sender_id: "1".into(),
            conversation_id: conversation_id.into(),
            conversation_kind: kind,
            message_id: 1,
            text: "/start".into(),
            reply_text: None,
        }
    }

    #[test]
    fn private_chats_always_allowed() {
        let gate = PolicyGate::new(GroupPolicy::Disabled, vec![]);
        assert!(gate.allowed(&event("5", ConversationKind::Private)));
    }

    #[test]
    fn open_policy_allows_groups() {
        let gate = PolicyGate::default();
        assert!(gate.allowed(&event("-100", ConversationKind::Supergroup)));
    }

    #[test]
    fn allowlist_policy() {
        let gate = PolicyGate::new(GroupPolicy::Allowlist, vec![" -100 ".into()]);
        assert!(gate.allowed(&event("-100", ConversationKind::Group)));
        assert!(!gate.allowed(&event("-200", ConversationKind::Group)));
    }

    #[test]
    fn disabled_policy_blocks_groups() {
        let gate = PolicyGate::new(GroupPolicy::Disabled, vec!["-100".into()]);
        assert!(!gate.allowed(&event("-100", ConversationKind::Supergroup)));
        assert!(!gate.allowed(&event("-100", ConversationKind::Channel)));
    }
}
