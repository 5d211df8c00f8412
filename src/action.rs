//! Action tokens carried by chat buttons.
//!
//! Each token maps deterministically to literal terminal input, except
//! `Focus`, which activates the target window instead of typing anything.

/// The fixed action set a button can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionToken {
    /// Bring the target terminal window to the foreground.
    Focus,
    /// Numbered quick replies, matching the platform's button row.
    Reply1,
    Reply2,
    Reply3,
    /// Ask the session to keep going.
    Continue,
    /// Ask the session to push its work.
    Push,
}

impl ActionToken {
    pub const ALL: [ActionToken; 6] = [
        ActionToken::Focus,
        ActionToken::Reply1,
        ActionToken::Reply2,
        ActionToken::Reply3,
        ActionToken::Continue,
        ActionToken::Push,
    ];

    /// Short code used on the wire (button payloads, `?action=` queries).
    pub fn as_wire(self) -> &'static str {
        match self {
            ActionToken::Focus => "focus",
            ActionToken::Reply1 => "1",
            ActionToken::Reply2 => "2",
            ActionToken::Reply3 => "3",
            ActionToken::Continue => "continue",
            ActionToken::Push => "push",
        }
    }

    pub fn from_wire(s: &str) -> Option<ActionToken> {
        match s {
            "focus" => Some(ActionToken::Focus),
            "1" => Some(ActionToken::Reply1),
            "2" => Some(ActionToken::Reply2),
            "3" => Some(ActionToken::Reply3),
            "continue" => Some(ActionToken::Continue),
            "push" => Some(ActionToken::Push),
            _ => None,
        }
    }

    /// The literal text typed into the target pane, or `None` for `Focus`.
    pub fn literal_input(self) -> Option<&'static str> {
        match self {
            ActionToken::Focus => None,
            ActionToken::Reply1 => Some("1"),
            ActionToken::Reply2 => Some("2"),
            ActionToken::Reply3 => Some("3"),
            ActionToken::Continue => Some("continue"),
            ActionToken::Push => Some("push"),
        }
    }
}
