#![forbid(unsafe_code)]

//! Dialog context: the client/supplier pairing and the ControlBlock
//! threading across one request/response exchange.

use osci_core::{Error, Result};
use osci_keys::Role;
use osci_message::parts::ControlBlock;

/// One explicit dialog between a client (Originator side) and a supplier
/// (Addressee or Intermediary side).
pub struct DialogHandler {
    pub client: Role,
    pub supplier: Role,
    pub conversation_id: Option<String>,
    sequence: u64,
    /// Challenge we sent with the last request; the response must echo it.
    last_challenge: Option<String>,
    /// Challenge the peer sent last; our next request must echo it.
    peer_challenge: Option<String>,
    /// Once a message of this dialog traveled encrypted, every further
    /// message must too (SOAP faults exempted).
    pub encrypted: bool,
}

impl DialogHandler {
    pub fn new(client: Role, supplier: Role) -> Self {
        Self {
            client,
            supplier,
            conversation_id: None,
            sequence: 0,
            last_challenge: None,
            peer_challenge: None,
            encrypted: false,
        }
    }

    /// Build the ControlBlock for the next outgoing request.
    pub fn next_control_block(&mut self) -> ControlBlock {
        let challenge = random_challenge();
        let cb = ControlBlock {
            challenge: Some(challenge.clone()),
            response: self.peer_challenge.clone(),
            conversation_id: self.conversation_id.clone(),
            sequence_number: Some(self.sequence),
        };
        self.last_challenge = Some(challenge);
        cb
    }

    /// Check an incoming response's ControlBlock against the dialog state
    /// and advance it.
    pub fn check_response(&mut self, cb: &ControlBlock) -> Result<()> {
        match (&self.last_challenge, &cb.response) {
            (Some(sent), Some(echoed)) if sent == echoed => {}
            (None, _) => {}
            _ => {
                return Err(Error::ProtocolState(
                    "response does not echo the dialog challenge".into(),
                ));
            }
        }
        match (&self.conversation_id, &cb.conversation_id) {
            (Some(ours), Some(theirs)) if ours != theirs => {
                return Err(Error::ProtocolState(format!(
                    "conversation id changed from {ours} to {theirs}"
                )));
            }
            (None, Some(theirs)) => self.conversation_id = Some(theirs.clone()),
            _ => {}
        }
        if let Some(seq) = cb.sequence_number {
            if seq != self.sequence {
                return Err(Error::ProtocolState(format!(
                    "sequence number {seq}, expected {}",
                    self.sequence
                )));
            }
        }
        self.peer_challenge = cb.challenge.clone();
        self.sequence += 1;
        self.last_challenge = None;
        Ok(())
    }
}

fn random_challenge() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    osci_stream::storeio::to_hex(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use osci_keys::RoleKind;

    fn dialog() -> DialogHandler {
        DialogHandler::new(
            Role::originator("client"),
            Role::new(RoleKind::Intermediary, "supplier"),
        )
    }

    #[test]
    fn challenge_is_threaded_across_the_pair() {
        let mut d = dialog();
        let request = d.next_control_block();
        let response = ControlBlock {
            response: request.challenge.clone(),
            challenge: Some("peer-ch".into()),
            conversation_id: Some("conv-9".into()),
            sequence_number: Some(0),
        };
        d.check_response(&response).unwrap();
        assert_eq!(d.conversation_id.as_deref(), Some("conv-9"));

        // The next request echoes the peer's challenge and bumps the
        // sequence number.
        let next = d.next_control_block();
        assert_eq!(next.response.as_deref(), Some("peer-ch"));
        assert_eq!(next.sequence_number, Some(1));
    }

    #[test]
    fn wrong_echo_is_rejected() {
        let mut d = dialog();
        let _request = d.next_control_block();
        let response = ControlBlock {
            response: Some("not-our-challenge".into()),
            challenge: None,
            conversation_id: None,
            sequence_number: Some(0),
        };
        assert!(d.check_response(&response).is_err());
    }

    #[test]
    fn conversation_id_must_not_change() {
        let mut d = dialog();
        d.conversation_id = Some("conv-1".into());
        let response = ControlBlock {
            response: None,
            challenge: None,
            conversation_id: Some("conv-2".into()),
            sequence_number: None,
        };
        assert!(d.check_response(&response).is_err());
    }
}
