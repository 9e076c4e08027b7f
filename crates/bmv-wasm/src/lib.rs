//! # BMV WASM
//!
//! WebAssembly bindings for the BTP message verifier.
//! This crate bridges `bmv-core`'s pure Rust verification logic to JavaScript
//! via `wasm-bindgen`.
//!
//! ## Architecture
//!
//! - All verification happens in Rust/WASM (never in JS)
//! - Relay messages arrive as base64url strings, exactly as relayers submit them
//! - Delivered payloads are returned base64url-encoded, in sequence order
//! - A rejected relay message leaves the verifier state untouched

mod state;

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use bmv_core::{BmvError, BtpMessageVerifier, VerifierConfig, VerifierState};
use serde::{Deserialize, Serialize};
use state::VerificationProgress;
use wasm_bindgen::prelude::*;

/// Set up panic hook on WASM initialization.
/// This ensures Rust panics are logged to the browser console with full stack traces.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// A verifier instance for one source network and one local message center.
#[wasm_bindgen]
pub struct BmvClient {
    verifier: BtpMessageVerifier,
    progress: VerificationProgress,
}

#[wasm_bindgen]
impl BmvClient {
    /// Install a verifier from its JSON configuration.
    ///
    /// The initial validator set is the only moment of trust. Every later
    /// set is reached through verified block updates.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<BmvClient, JsValue> {
        let config = VerifierConfig::from_json(config_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?;
        let verifier = BtpMessageVerifier::new(&config)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?;

        log_to_console(&format!(
            "[BMV] Installed for {} at {}: offset {}, {} validators",
            config.net,
            config.bmc,
            config.offset,
            verifier.validators().len()
        ));

        Ok(BmvClient {
            verifier,
            progress: VerificationProgress::new(),
        })
    }

    /// Resume a verifier from state previously returned by `exportState`.
    #[wasm_bindgen(js_name = fromState)]
    pub fn from_state(bmc: &str, net: &str, state_json: &str) -> Result<BmvClient, JsValue> {
        let bmc = bmc
            .parse()
            .map_err(|e| JsValue::from_str(&format!("Invalid bmc address: {}", e)))?;
        let state: VerifierState = serde_json::from_str(state_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid state JSON: {}", e)))?;

        let verifier = BtpMessageVerifier::from_state(bmc, net.to_string(), state);
        log_to_console(&format!(
            "[BMV] Restored at accumulator height {}, next sequence {}",
            verifier.mta().height(),
            verifier.next_sequence()
        ));

        Ok(BmvClient {
            verifier,
            progress: VerificationProgress::new(),
        })
    }

    /// Verify a relay message and return the delivered payloads.
    ///
    /// bmc: BTP address of the local message center (`btp://net/cx…`)
    /// prev: BTP address of the previous hop
    /// seq: sequence number of the last message already received from `prev`
    /// msg: base64url-encoded relay message
    ///
    /// Returns an array of base64url payload strings. On rejection throws
    /// `{ code, message }` with the numeric BMV error code.
    #[wasm_bindgen(js_name = handleRelayMessage)]
    pub fn handle_relay_message(
        &mut self,
        bmc: &str,
        prev: &str,
        seq: u64,
        msg: &str,
    ) -> Result<js_sys::Array, JsValue> {
        let result = decode_relay_message(msg)
            .and_then(|raw| self.verifier.handle_relay_message(bmc, prev, seq, &raw));

        match result {
            Ok(messages) => {
                self.progress.record_accepted(messages.len());
                log_to_console(&format!(
                    "[BMV] Accepted: {} message(s), height {}, next sequence {}",
                    messages.len(),
                    self.verifier.mta().height(),
                    self.verifier.next_sequence()
                ));
                Ok(encode_payloads(&messages)
                    .into_iter()
                    .map(JsValue::from)
                    .collect())
            }
            Err(e) => {
                self.progress.record_rejected(e.code());
                log_to_console(&format!("[BMV] Rejected (code {}): {}", e.code(), e));
                let body = ErrorResponse::from(&e);
                Err(serde_wasm_bindgen::to_value(&body)
                    .unwrap_or_else(|_| JsValue::from_str(&body.message)))
            }
        }
    }

    /// Accumulator height and offset, and the height of the last relayed message.
    #[wasm_bindgen(js_name = getStatus)]
    pub fn get_status(&self) -> Result<JsValue, JsValue> {
        to_js(&self.verifier.status())
    }

    /// Accumulator details for operators.
    pub fn mta(&self) -> Result<JsValue, JsValue> {
        let mta = self.verifier.mta();
        let view = MtaResponse {
            height: mta.height(),
            offset: mta.offset(),
            roots_size: mta.roots_size(),
            cache_size: mta.cache_size(),
            allow_newer_witness: mta.allow_newer_witness(),
            roots: mta
                .roots()
                .iter()
                .map(|root| root.map(|r| format!("0x{}", hex::encode(r))))
                .collect(),
        };
        to_js(&view)
    }

    /// Current validator set as `{ hash, addresses }`.
    pub fn validators(&self) -> Result<JsValue, JsValue> {
        to_js(&self.verifier.validators().info())
    }

    pub fn bmc(&self) -> String {
        self.verifier.bmc().to_string()
    }

    #[wasm_bindgen(js_name = netAddress)]
    pub fn net_address(&self) -> String {
        self.verifier.net_address().to_string()
    }

    /// Counters for this instance since it was created.
    pub fn progress(&self) -> Result<JsValue, JsValue> {
        to_js(&self.progress)
    }

    /// Full verifier state as JSON, for persisting between sessions.
    #[wasm_bindgen(js_name = exportState)]
    pub fn export_state(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.verifier.state())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

/// Relayers submit base64url, with or without padding.
fn decode_relay_message(msg: &str) -> Result<Vec<u8>, BmvError> {
    let msg = msg.trim();
    URL_SAFE
        .decode(msg)
        .or_else(|_| URL_SAFE_NO_PAD.decode(msg))
        .map_err(|e| BmvError::InvalidRelayMessage(format!("not base64url: {}", e)))
}

fn encode_payloads(messages: &[Vec<u8>]) -> Vec<String> {
    messages.iter().map(|m| URL_SAFE.encode(m)).collect()
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

// ============================================================================
// Response types (serialized to JS objects)
// ============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct ErrorResponse {
    code: u32,
    message: String,
}

impl From<&BmvError> for ErrorResponse {
    fn from(err: &BmvError) -> Self {
        ErrorResponse {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MtaResponse {
    height: u64,
    offset: u64,
    roots_size: usize,
    cache_size: usize,
    allow_newer_witness: bool,
    roots: Vec<Option<String>>,
}

fn log_to_console(msg: &str) {
    web_sys::console::log_1(&JsValue::from_str(msg));
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmv_core::code;

    #[test]
    fn test_decode_relay_message_padding() {
        assert_eq!(decode_relay_message("-_8=").unwrap(), vec![0xFB, 0xFF]);
        assert_eq!(decode_relay_message("-_8").unwrap(), vec![0xFB, 0xFF]);
        assert_eq!(decode_relay_message(" 3-A= \n").unwrap(), vec![0xDF, 0x80]);
    }

    #[test]
    fn test_decode_relay_message_rejects_standard_alphabet() {
        let err = decode_relay_message("+/8=").unwrap_err();
        assert!(matches!(err, BmvError::InvalidRelayMessage(_)));
        assert_eq!(err.code(), code::UNKNOWN);
    }

    #[test]
    fn test_payloads_are_url_safe() {
        let encoded = encode_payloads(&[vec![0xFB, 0xFF], b"hi".to_vec()]);
        assert_eq!(encoded, vec!["-_8=".to_string(), "aGk=".to_string()]);
    }

    #[test]
    fn test_error_response_carries_code() {
        let err = BmvError::SequenceTooHigh { seq: 5, expected: 2 };
        let body = ErrorResponse::from(&err);
        assert_eq!(body.code, code::INVALID_SEQUENCE_HIGHER);
        assert!(body.message.contains("expected 2"));
    }
}
