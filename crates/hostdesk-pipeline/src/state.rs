// SPDX-FileCopyrightText: 2026 Hostdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation and message status rules.
//!
//! Processors never assume jobs arrive in order. They re-read the current
//! state and ask these functions what, if anything, should change.

use hostdesk_core::types::{ConversationStatus, MessageStatus};

/// Provider delivery status mapped to the message status domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Known(MessageStatus),
    /// Vocabulary this pipeline does not know. Treated as `SENT`.
    Unknown,
}

impl ProviderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sent" => Self::Known(MessageStatus::Sent),
            "delivered" => Self::Known(MessageStatus::Delivered),
            "read" => Self::Known(MessageStatus::Read),
            "failed" | "deleted" => Self::Known(MessageStatus::Failed),
            _ => Self::Unknown,
        }
    }

    pub fn status(self) -> MessageStatus {
        match self {
            Self::Known(status) => status,
            Self::Unknown => MessageStatus::Sent,
        }
    }
}

/// Whether `from -> to` follows `SENT -> DELIVERED -> READ`.
///
/// `FAILED` is always accepted. Out-of-order updates are still applied by
/// the caller; this only decides whether to warn.
pub fn is_expected_transition(from: MessageStatus, to: MessageStatus) -> bool {
    use MessageStatus::*;
    match to {
        Failed => true,
        Read => matches!(from, Delivered | Sent),
        Delivered => matches!(from, Sent | Pending),
        Sent => from == Pending,
        Pending => false,
    }
}

/// New inbound activity reopens a closed conversation.
pub fn on_inbound(current: ConversationStatus) -> Option<ConversationStatus> {
    (current == ConversationStatus::Closed).then_some(ConversationStatus::Open)
}

/// The customer read our last message: the attendant's turn is over.
pub fn on_outbound_read(current: ConversationStatus) -> Option<ConversationStatus> {
    (current == ConversationStatus::InProgress).then_some(ConversationStatus::Waiting)
}

/// An attendant message went out: the conversation is being handled.
pub fn on_outbound_sent(current: ConversationStatus) -> Option<ConversationStatus> {
    (current != ConversationStatus::InProgress).then_some(ConversationStatus::InProgress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use MessageStatus::*;

    #[test]
    fn provider_vocabulary() {
        assert_eq!(ProviderStatus::parse("delivered").status(), Delivered);
        assert_eq!(ProviderStatus::parse("READ").status(), Read);
        assert_eq!(ProviderStatus::parse("deleted").status(), Failed);
        assert_eq!(ProviderStatus::parse("warning"), ProviderStatus::Unknown);
        assert_eq!(ProviderStatus::parse("warning").status(), Sent);
    }

    #[test]
    fn expected_order() {
        assert!(is_expected_transition(Sent, Delivered));
        assert!(is_expected_transition(Delivered, Read));
        assert!(is_expected_transition(Sent, Read));
        assert!(!is_expected_transition(Delivered, Sent));
        assert!(!is_expected_transition(Read, Delivered));
    }

    #[test]
    fn failed_always_expected() {
        for from in [Pending, Sent, Delivered, Read, Failed] {
            assert!(is_expected_transition(from, Failed));
        }
    }

    #[test]
    fn conversation_transitions() {
        use ConversationStatus::*;
        assert_eq!(on_inbound(Closed), Some(Open));
        assert_eq!(on_inbound(Waiting), None);
        assert_eq!(on_outbound_read(InProgress), Some(Waiting));
        assert_eq!(on_outbound_read(Open), None);
        assert_eq!(on_outbound_sent(Waiting), Some(InProgress));
        assert_eq!(on_outbound_sent(InProgress), None);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_provider_status_maps_to_a_delivery_state(raw in "\\PC{0,16}") {
                prop_assert_ne!(ProviderStatus::parse(&raw).status(), Pending);
            }

            #[test]
            fn parse_ignores_case_and_padding(idx in 0usize..4, pad in " {0,3}") {
                let word = ["sent", "delivered", "read", "failed"][idx];
                let noisy = format!("{pad}{}{pad}", word.to_ascii_uppercase());
                prop_assert_eq!(ProviderStatus::parse(&noisy), ProviderStatus::parse(word));
            }
        }
    }
}
