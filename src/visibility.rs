use crate::log::{Message, MessageKind};

/// Whether `viewer` may see `message`. Status and broadcast messages are
/// public; a direct message is visible only to its two ends.
pub fn is_visible(viewer: &str, message: &Message) -> bool {
    match message.kind {
        MessageKind::Status | MessageKind::Broadcast => true,
        MessageKind::Direct => viewer == message.from || viewer == message.to,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::BROADCAST_TARGET;

    fn msg(kind: MessageKind, from: &str, to: &str) -> Message {
        Message {
            from: from.into(),
            to: to.into(),
            text: "x".into(),
            kind,
            time: "00:00:00".into(),
        }
    }

    #[test]
    fn direct_is_visible_to_both_ends_only() {
        let m = msg(MessageKind::Direct, "A", "B");
        assert!(is_visible("A", &m));
        assert!(is_visible("B", &m));
        assert!(!is_visible("C", &m));
        assert!(!is_visible(BROADCAST_TARGET, &m));
    }

    #[test]
    fn public_kinds_are_visible_to_anyone() {
        for kind in [MessageKind::Status, MessageKind::Broadcast] {
            let m = msg(kind, "A", "B");
            for viewer in ["A", "B", "C", "never-joined"] {
                assert!(is_visible(viewer, &m));
            }
        }
    }
}
