use crate::consensus::{verify_block_proof, verify_block_update, ValidatorChange};
use crate::error::BmvError;
use crate::execution::{parse_event, prove_receipt, ReceiptError};
use crate::mta::MerkleTreeAccumulator;
use crate::types::{Address, BtpAddress, RelayMessage, Validators};
use crate::verifier::config::{ConfigError, VerifierConfig};
use crate::verifier::state::{VerifierState, VerifierStatus};
use std::fmt;
use tracing::{debug, info, warn};

/// Stage of a relay call, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ApplyingBlockUpdates,
    ApplyingBlockProof,
    ApplyingReceiptProofs,
    Committed,
    Rejected,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::ApplyingBlockUpdates => "applying_block_updates",
            Phase::ApplyingBlockProof => "applying_block_proof",
            Phase::ApplyingReceiptProofs => "applying_receipt_proofs",
            Phase::Committed => "committed",
            Phase::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// The block whose receipt root proves the call's receipts.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    height: u64,
    receipt_hash: Option<[u8; 32]>,
}

/// Result of a verified call, applied at the single commit point.
struct Verified {
    validators: Option<Validators>,
    mta: Option<MerkleTreeAccumulator>,
    anchor_height: u64,
    next_sequence: u64,
    messages: Vec<Vec<u8>>,
}

/// Verifies relay messages from one source network for one message center.
///
/// Calls take `&mut self`, so one instance processes one relay message at a
/// time. A call either commits all of its state changes or none.
#[derive(Debug, Clone)]
pub struct BtpMessageVerifier {
    bmc: Address,
    net: String,
    state: VerifierState,
}

impl BtpMessageVerifier {
    /// Install a verifier: accumulator and `last_height` start at the
    /// configured offset, the next expected sequence is 1.
    pub fn new(config: &VerifierConfig) -> Result<Self, ConfigError> {
        let validators = config.validate()?;
        let mut mta = MerkleTreeAccumulator::with_offset(config.offset);
        mta.set_roots_size(config.roots_size);
        mta.set_cache_size(config.cache_size);
        mta.set_allow_newer_witness(config.allow_newer_witness);

        info!(
            bmc = %config.bmc,
            net = %config.net,
            offset = config.offset,
            validators = validators.len(),
            "verifier installed"
        );

        Ok(Self::from_state(
            config.bmc,
            config.net.clone(),
            VerifierState {
                validators,
                mta,
                last_height: config.offset,
                next_sequence: 1,
            },
        ))
    }

    /// Resume from previously exported state.
    pub fn from_state(bmc: Address, net: String, state: VerifierState) -> Self {
        BtpMessageVerifier { bmc, net, state }
    }

    pub fn bmc(&self) -> &Address {
        &self.bmc
    }

    pub fn net_address(&self) -> &str {
        &self.net
    }

    pub fn validators(&self) -> &Validators {
        &self.state.validators
    }

    pub fn mta(&self) -> &MerkleTreeAccumulator {
        &self.state.mta
    }

    pub fn state(&self) -> &VerifierState {
        &self.state
    }

    pub fn next_sequence(&self) -> u64 {
        self.state.next_sequence
    }

    pub fn status(&self) -> VerifierStatus {
        self.state.status()
    }

    /// Verify one relay message and return the payloads of the messages it
    /// delivers, in order.
    ///
    /// `bmc` is the full BTP address of the local message center, `prev` the
    /// address of the previous hop, and `seq` the sequence number of the last
    /// message already received from `prev`.
    pub fn handle_relay_message(
        &mut self,
        bmc: &str,
        prev: &str,
        seq: u64,
        msg: &[u8],
    ) -> Result<Vec<Vec<u8>>, BmvError> {
        debug!(phase = %Phase::Idle, prev, seq, len = msg.len(), "relay message received");

        match self.verify(bmc, prev, seq, msg) {
            Ok(verified) => Ok(self.commit(verified)),
            Err(err) => {
                warn!(
                    phase = %Phase::Rejected,
                    code = err.code(),
                    error = %err,
                    "relay message rejected"
                );
                Err(err)
            }
        }
    }

    fn check_accessible(&self, current: &BtpAddress, prev: &BtpAddress) -> Result<(), BmvError> {
        if prev.net() != self.net {
            return Err(BmvError::NotAcceptable(format!(
                "previous hop network {} is not {}",
                prev.net(),
                self.net
            )));
        }
        let contract: Address = current.contract().parse()?;
        if contract != self.bmc {
            return Err(BmvError::NotAcceptable(format!(
                "message center {} is not {}",
                contract, self.bmc
            )));
        }
        Ok(())
    }

    /// Run every check against a working copy of the state. Nothing here
    /// touches `self.state`.
    fn verify(&self, bmc: &str, prev: &str, seq: u64, msg: &[u8]) -> Result<Verified, BmvError> {
        let current: BtpAddress = bmc.parse()?;
        let prev_addr: BtpAddress = prev.parse()?;
        self.check_accessible(&current, &prev_addr)?;

        // 1. Decode and require something to anchor on
        let relay = RelayMessage::from_bytes(msg)?;
        if !relay.has_anchor() {
            return Err(BmvError::InvalidRelayMessage(
                "relay message has neither block updates nor a block proof".to_string(),
            ));
        }

        let mut validators = self.state.validators.clone();
        let mut mta = self.state.mta.clone();
        let mut validators_changed = false;
        let mut anchor: Option<Anchor> = None;

        // 2. Block updates extend the accumulator one height at a time
        for update in &relay.block_updates {
            let expected = mta
                .height()
                .checked_add(1)
                .ok_or_else(|| BmvError::Internal("accumulator height overflow".to_string()))?;
            let height = update.height();
            if height > expected {
                return Err(BmvError::BlockUpdateHeightHigher { height, expected });
            }
            if height < expected {
                return Err(BmvError::BlockUpdateHeightLower { height, expected });
            }

            if let ValidatorChange::Rotate(next) = verify_block_update(update, &validators)? {
                debug!(
                    phase = %Phase::ApplyingBlockUpdates,
                    height,
                    hash = %hex::encode(next.hash()),
                    "validator set rotated"
                );
                validators = next;
                validators_changed = true;
            }
            mta.add(*update.header.hash())?;
            anchor = Some(Anchor {
                height,
                receipt_hash: update.header.receipt_hash(),
            });
            debug!(phase = %Phase::ApplyingBlockUpdates, height, "block update applied");
        }

        // 3. A block proof re-anchors on an already accumulated block
        if let Some(proof) = &relay.block_proof {
            verify_block_proof(proof, &mta)?;
            anchor = Some(Anchor {
                height: proof.height(),
                receipt_hash: proof.header.receipt_hash(),
            });
            debug!(
                phase = %Phase::ApplyingBlockProof,
                height = proof.height(),
                "block proof applied"
            );
        }

        let anchor = anchor.ok_or_else(|| {
            BmvError::Internal("no anchor after applying block evidence".to_string())
        })?;

        // 4. Receipts and the message events they prove
        let mut next_sequence = seq
            .checked_add(1)
            .ok_or_else(|| BmvError::Internal("sequence overflow".to_string()))?;
        let mut messages = Vec::new();

        for receipt_proof in &relay.receipt_proofs {
            let receipt_hash = anchor.receipt_hash.ok_or(ReceiptError::MissingReceiptHash {
                height: anchor.height,
            })?;
            let receipt = prove_receipt(receipt_proof, &receipt_hash)?;

            for log in &receipt.event_logs {
                if log.address.to_string() != prev_addr.contract() {
                    continue;
                }
                let event = match parse_event(log)?.to_message_event()? {
                    Some(event) => event,
                    None => continue,
                };

                let expected = next_sequence as i128;
                if event.seq > expected {
                    return Err(BmvError::SequenceTooHigh {
                        seq: event.seq,
                        expected: next_sequence,
                    });
                }
                if event.seq < expected {
                    return Err(BmvError::SequenceTooLow {
                        seq: event.seq,
                        expected: next_sequence,
                    });
                }
                if event.next_bmc != bmc {
                    debug!(
                        phase = %Phase::ApplyingReceiptProofs,
                        seq = next_sequence,
                        next = %event.next_bmc,
                        "message for another hop skipped"
                    );
                    continue;
                }

                debug!(
                    phase = %Phase::ApplyingReceiptProofs,
                    seq = next_sequence,
                    len = event.msg.len(),
                    "message accepted"
                );
                messages.push(event.msg);
                next_sequence = next_sequence
                    .checked_add(1)
                    .ok_or_else(|| BmvError::Internal("sequence overflow".to_string()))?;
            }
        }

        let block_applied = !relay.block_updates.is_empty() || relay.block_proof.is_some();
        Ok(Verified {
            validators: validators_changed.then_some(validators),
            mta: block_applied.then_some(mta),
            anchor_height: anchor.height,
            next_sequence,
            messages,
        })
    }

    /// 5. Apply a verified call. Infallible, so state never ends half-updated.
    fn commit(&mut self, verified: Verified) -> Vec<Vec<u8>> {
        if let Some(validators) = verified.validators {
            self.state.validators = validators;
        }
        if let Some(mta) = verified.mta {
            self.state.mta = mta;
        }
        if !verified.messages.is_empty() {
            self.state.last_height = verified.anchor_height;
            self.state.next_sequence = verified.next_sequence;
        }

        info!(
            phase = %Phase::Committed,
            height = self.state.mta.height(),
            last_height = self.state.last_height,
            next_sequence = self.state.next_sequence,
            messages = verified.messages.len(),
            "relay message committed"
        );
        verified.messages
    }
}
