//! The IK1-IK7 link state table. Pure decision logic: given the IK/PK of a
//! just-accepted frame and whether a command is queued, says what the
//! connection should do next. Counter bookkeeping and actually sending
//! frames stay in `connection.rs`; this module only decides.

/// Link kind byte values.
pub mod ik {
    pub const CONNECT: u8 = 1;
    pub const CONFIRM: u8 = 2;
    pub const IDLE_POLL: u8 = 3;
    pub const DATA: u8 = 4;
    pub const POS_ACK: u8 = 5;
    pub const NEG_ACK: u8 = 6;
    pub const MORE_DATA: u8 = 7;
}

/// The only protocol-kind value this implementation accepts.
pub const PK_ACCEPTED: u8 = 1;

/// What the connection should do after accepting a frame whose PK matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Send the next queued command as IK4.
    SendIk4,
    /// Send IK3 immediately (no poll delay).
    SendIk3,
    /// Enter post-poll idle: wait `polling_interval` seconds (or send
    /// immediately if a burst reconciliation is still in progress) before
    /// sending IK3.
    Ik3AfterPoll,
    /// IK7 burst reconciliation: rewind `tc_rec`, arm a 5-frame burst
    /// window, and send IK3 immediately.
    Reconcile,
    /// Unrecognised IK: send IK5 (ack) then IK3.
    Ik5ThenIk3,
}

/// Decides the next action for an accepted (PK-matched) frame.
pub fn decide(ik: u8, send_queue_non_empty: bool) -> NextAction {
    match ik {
        ik::CONNECT | ik::DATA => {
            if send_queue_non_empty {
                NextAction::SendIk4
            } else {
                NextAction::Ik3AfterPoll
            }
        }
        ik::CONFIRM => {
            if send_queue_non_empty {
                NextAction::SendIk4
            } else {
                NextAction::SendIk3
            }
        }
        ik::MORE_DATA => NextAction::Reconcile,
        _ => NextAction::Ik5ThenIk3,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn connect_with_queued_command_sends_ik4() {
        assert_eq!(decide(ik::CONNECT, true), NextAction::SendIk4);
    }

    #[test]
    fn connect_with_empty_queue_polls_after_delay() {
        assert_eq!(decide(ik::CONNECT, false), NextAction::Ik3AfterPoll);
    }

    #[test]
    fn data_with_empty_queue_polls_after_delay() {
        assert_eq!(decide(ik::DATA, false), NextAction::Ik3AfterPoll);
    }

    #[test]
    fn confirm_with_empty_queue_sends_ik3_immediately() {
        assert_eq!(decide(ik::CONFIRM, false), NextAction::SendIk3);
    }

    #[test]
    fn confirm_with_queued_command_sends_ik4() {
        assert_eq!(decide(ik::CONFIRM, true), NextAction::SendIk4);
    }

    #[test]
    fn more_data_always_reconciles() {
        assert_eq!(decide(ik::MORE_DATA, false), NextAction::Reconcile);
        assert_eq!(decide(ik::MORE_DATA, true), NextAction::Reconcile);
    }

    #[test]
    fn unrecognised_ik_acks_then_polls() {
        assert_eq!(decide(ik::POS_ACK, false), NextAction::Ik5ThenIk3);
        assert_eq!(decide(ik::NEG_ACK, true), NextAction::Ik5ThenIk3);
        assert_eq!(decide(99, false), NextAction::Ik5ThenIk3);
    }
}
