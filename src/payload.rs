//! Button Payload codec.
//!
//! A chat button carries one string bounded by the platform's 2000-character
//! value limit. Two forms share the wire:
//!
//! ```text
//! url:<encoded Focus Address>|<action>     direct form
//! <opaque session id>|<action>             legacy form (registry lookup)
//! ```
//!
//! The Focus Address encoder escapes `|`, so the separator never appears
//! unescaped inside an address and parsing always splits on the **last**
//! separator. `build` fails loudly above the size limit; it never truncates.

use thiserror::Error;

use crate::action::ActionToken;
use crate::address::{EncodeError, FocusAddress};

/// Discriminator prefix for the direct (address-carrying) form.
pub const DIRECT_PREFIX: &str = "url:";

/// Separator between the target portion and the action token.
pub const SEPARATOR: char = '|';

/// The platform's limit on a button value.
pub const MAX_PAYLOAD_LEN: usize = 2000;

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("button payload is {len} chars, over the {MAX_PAYLOAD_LEN} char platform limit")]
    TooLong { len: usize },

    #[error("invalid session id `{0}`")]
    InvalidSessionId(String),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// The target half of a parsed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadTarget {
    /// Direct form: a fully resolved Focus Address.
    Address(FocusAddress),
    /// Legacy form: an opaque session id needing registry resolution.
    SessionId(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonPayload {
    pub target: PayloadTarget,
    pub action: ActionToken,
}

/// Build a direct-form payload. Hard failure above the platform limit.
pub fn build(addr: &FocusAddress, action: ActionToken) -> Result<String, PayloadError> {
    let encoded = addr.encode()?;
    let payload = format!("{DIRECT_PREFIX}{encoded}{SEPARATOR}{}", action.as_wire());
    check_len(payload)
}

/// Build a legacy-form payload from an opaque session id.
pub fn build_legacy(session_id: &str, action: ActionToken) -> Result<String, PayloadError> {
    if session_id.is_empty()
        || session_id.contains(SEPARATOR)
        || session_id.starts_with(DIRECT_PREFIX)
    {
        return Err(PayloadError::InvalidSessionId(session_id.to_string()));
    }
    let payload = format!("{session_id}{SEPARATOR}{}", action.as_wire());
    check_len(payload)
}

fn check_len(payload: String) -> Result<String, PayloadError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(PayloadError::TooLong {
            len: payload.len(),
        });
    }
    Ok(payload)
}

/// Parse a button payload. Total: `None` on a missing separator, unknown
/// action token, or an undecodable address in the direct form.
pub fn parse(payload: &str) -> Option<ButtonPayload> {
    let (head, tail) = payload.rsplit_once(SEPARATOR)?;
    let action = ActionToken::from_wire(tail)?;
    let target = match head.strip_prefix(DIRECT_PREFIX) {
        Some(encoded) => PayloadTarget::Address(FocusAddress::decode(encoded)?),
        None => {
            if head.is_empty() {
                return None;
            }
            PayloadTarget::SessionId(head.to_string())
        }
    };
    Some(ButtonPayload { target, action })
}

/// The raw text after the last separator, if any.
pub fn extract_action(payload: &str) -> Option<&str> {
    payload
        .rsplit_once(SEPARATOR)
        .map(|(_, tail)| tail)
        .filter(|tail| !tail.is_empty())
}

/// Whether `s` is one of the fixed action tokens. Agrees with [`parse`].
pub fn is_valid_action(s: &str) -> bool {
    ActionToken::from_wire(s).is_some()
}
