//! Focus Address codec.
//!
//! A Focus Address names one terminal target across heterogeneous hosts and
//! travels as a compact URI-like string:
//!
//! ```text
//! claude-focus://<variant>/<segment>{/<segment>}*[?action=<token>]
//! ```
//!
//! Segment count and order are fixed per variant. Each segment is
//! percent-encoded individually, so the payload separator `|`, the path
//! separator `/` and the query marker `?` can never appear unescaped inside
//! an encoded address. Decoding is total: any malformed input yields `None`
//! because it sits on the untrusted-webhook hot path.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;

/// URI scheme prefix for every encoded Focus Address.
pub const SCHEME: &str = "claude-focus://";

/// Escape set for one path segment: everything except ASCII alphanumerics
/// and the URI unreserved marks.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("missing required field `{0}`")]
    EmptyField(&'static str),
}

/// A terminal target. Each variant stores only the fields it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusAddress {
    /// A local GUI terminal window, identified by process id.
    Gui { pid: u32 },
    /// A local GUI terminal window hosting a multiplexer client.
    GuiTmux { pid: u32, pane: String },
    /// A multiplexer pane with no GUI attachment (works headless).
    Tmux { pane: String },
    /// A pane reached through an established cross-host link.
    /// The link id is caller-chosen; the SSH coordinates allow direct
    /// dispatch when no Link Record is available.
    SshLink {
        link_id: String,
        host: String,
        user: String,
        port: u16,
        pane: String,
    },
    /// A pane reached directly over SSH.
    Ssh {
        host: String,
        user: String,
        port: u16,
        pane: String,
    },
    /// A browser-attached multiplexer pane, paired under a link id.
    Web { link_id: String, pane: String },
    /// A raw terminal device on the local desktop.
    Tty { device: String, pid: u32 },
}

impl FocusAddress {
    /// Wire name of this variant, also stored in records as `variant_type`.
    pub fn variant_name(&self) -> &'static str {
        match self {
            FocusAddress::Gui { .. } => "gui",
            FocusAddress::GuiTmux { .. } => "gui-tmux",
            FocusAddress::Tmux { .. } => "tmux",
            FocusAddress::SshLink { .. } => "ssh-link",
            FocusAddress::Ssh { .. } => "ssh",
            FocusAddress::Web { .. } => "web",
            FocusAddress::Tty { .. } => "tty",
        }
    }

    /// Human-oriented one-line summary for record display names.
    pub fn describe(&self) -> String {
        match self {
            FocusAddress::Gui { pid } => format!("gui window (pid {pid})"),
            FocusAddress::GuiTmux { pid, pane } => format!("pane {pane} (pid {pid})"),
            FocusAddress::Tmux { pane } => format!("pane {pane}"),
            FocusAddress::SshLink {
                link_id,
                host,
                user,
                pane,
                ..
            } => format!("{user}@{host}:{pane} (link {link_id})"),
            FocusAddress::Ssh {
                host, user, pane, ..
            } => format!("{user}@{host}:{pane}"),
            FocusAddress::Web { link_id, pane } => format!("web pane {pane} (link {link_id})"),
            FocusAddress::Tty { device, pid } => format!("{device} (pid {pid})"),
        }
    }

    /// Encode to the wire form. Fails on empty required fields rather than
    /// emitting an address that cannot round-trip.
    pub fn encode(&self) -> Result<String, EncodeError> {
        let mut out = String::from(SCHEME);
        match self {
            FocusAddress::Gui { pid } => {
                out.push_str("gui/");
                out.push_str(&pid.to_string());
            }
            FocusAddress::GuiTmux { pid, pane } => {
                require(pane, "pane")?;
                out.push_str("gui-tmux/");
                out.push_str(&pid.to_string());
                out.push('/');
                out.push_str(&enc(pane));
            }
            FocusAddress::Tmux { pane } => {
                require(pane, "pane")?;
                out.push_str("tmux/");
                out.push_str(&enc(pane));
            }
            FocusAddress::SshLink {
                link_id,
                host,
                user,
                port,
                pane,
            } => {
                require(link_id, "link_id")?;
                require(host, "host")?;
                require(user, "user")?;
                require(pane, "pane")?;
                out.push_str("ssh-link/");
                out.push_str(&enc(link_id));
                out.push('/');
                out.push_str(&enc(host));
                out.push('/');
                out.push_str(&enc(user));
                out.push('/');
                out.push_str(&port.to_string());
                out.push('/');
                out.push_str(&enc(pane));
            }
            FocusAddress::Ssh {
                host,
                user,
                port,
                pane,
            } => {
                require(host, "host")?;
                require(user, "user")?;
                require(pane, "pane")?;
                out.push_str("ssh/");
                out.push_str(&enc(host));
                out.push('/');
                out.push_str(&enc(user));
                out.push('/');
                out.push_str(&port.to_string());
                out.push('/');
                out.push_str(&enc(pane));
            }
            FocusAddress::Web { link_id, pane } => {
                require(link_id, "link_id")?;
                require(pane, "pane")?;
                out.push_str("web/");
                out.push_str(&enc(link_id));
                out.push('/');
                out.push_str(&enc(pane));
            }
            FocusAddress::Tty { device, pid } => {
                require(device, "device")?;
                out.push_str("tty/");
                // The device path keeps its own slashes: each piece becomes
                // a segment and decode re-joins everything but the trailing
                // pid segment.
                let mut first = true;
                for piece in device.split('/') {
                    if !first {
                        out.push('/');
                    }
                    first = false;
                    out.push_str(&enc(piece));
                }
                out.push('/');
                out.push_str(&pid.to_string());
            }
        }
        Ok(out)
    }

    /// Decode from the wire form. Total: returns `None` on malformed input,
    /// unknown variant, wrong segment arity or bad numeric fields. A trailing
    /// `?action=` query is ignored; it is never part of identity.
    pub fn decode(s: &str) -> Option<FocusAddress> {
        let rest = s.strip_prefix(SCHEME)?;
        let (path, _) = split_action(rest);
        let mut segments = path.split('/');
        let variant = segments.next()?;
        let parts: Vec<&str> = segments.collect();

        match variant {
            "gui" => {
                let [pid] = parts.as_slice() else {
                    return None;
                };
                Some(FocusAddress::Gui {
                    pid: pid.parse().ok()?,
                })
            }
            "gui-tmux" => {
                let [pid, pane] = parts.as_slice() else {
                    return None;
                };
                Some(FocusAddress::GuiTmux {
                    pid: pid.parse().ok()?,
                    pane: dec_nonempty(pane)?,
                })
            }
            "tmux" => {
                let [pane] = parts.as_slice() else {
                    return None;
                };
                Some(FocusAddress::Tmux {
                    pane: dec_nonempty(pane)?,
                })
            }
            "ssh-link" => {
                let [link_id, host, user, port, pane] = parts.as_slice() else {
                    return None;
                };
                Some(FocusAddress::SshLink {
                    link_id: dec_nonempty(link_id)?,
                    host: dec_nonempty(host)?,
                    user: dec_nonempty(user)?,
                    port: port.parse().ok()?,
                    pane: dec_nonempty(pane)?,
                })
            }
            "ssh" => {
                let [host, user, port, pane] = parts.as_slice() else {
                    return None;
                };
                Some(FocusAddress::Ssh {
                    host: dec_nonempty(host)?,
                    user: dec_nonempty(user)?,
                    port: port.parse().ok()?,
                    pane: dec_nonempty(pane)?,
                })
            }
            "web" => {
                let [link_id, pane] = parts.as_slice() else {
                    return None;
                };
                Some(FocusAddress::Web {
                    link_id: dec_nonempty(link_id)?,
                    pane: dec_nonempty(pane)?,
                })
            }
            "tty" => {
                // Arity is open-ended: the device path may span segments.
                // The last segment is the pid; the rest re-join as the device.
                if parts.len() < 2 {
                    return None;
                }
                let (pid, device_parts) = parts.split_last()?;
                let device = device_parts
                    .iter()
                    .map(|p| dec(p))
                    .collect::<Option<Vec<_>>>()?
                    .join("/");
                if device.is_empty() {
                    return None;
                }
                Some(FocusAddress::Tty {
                    device,
                    pid: pid.parse().ok()?,
                })
            }
            _ => None,
        }
    }
}

fn require<'a>(value: &'a str, field: &'static str) -> Result<&'a str, EncodeError> {
    if value.is_empty() {
        Err(EncodeError::EmptyField(field))
    } else {
        Ok(value)
    }
}

fn enc(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

fn dec(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|c| c.into_owned())
}

fn dec_nonempty(segment: &str) -> Option<String> {
    dec(segment).filter(|s| !s.is_empty())
}

/// Append an `?action=` query to an already-encoded address.
///
/// Tokens come from the fixed action set and never need escaping.
pub fn attach_action(encoded: &str, action: &str) -> String {
    format!("{encoded}?action={action}")
}

/// Split an encoded address (or its path remainder) into the path part and
/// the optional `action` query value.
pub fn split_action(s: &str) -> (&str, Option<&str>) {
    match s.split_once('?') {
        Some((path, query)) => {
            let action = query
                .split('&')
                .find_map(|pair| pair.strip_prefix("action="))
                .filter(|v| !v.is_empty());
            (path, action)
        }
        None => (s, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(addr: FocusAddress) {
        let encoded = addr.encode().unwrap();
        assert_eq!(
            FocusAddress::decode(&encoded),
            Some(addr),
            "failed to round-trip {encoded}"
        );
    }

    // ── Round trips ───────────────────────────────────────────────

    #[test]
    fn roundtrip_gui() {
        roundtrip(FocusAddress::Gui { pid: 4242 });
    }

    #[test]
    fn roundtrip_gui_tmux() {
        roundtrip(FocusAddress::GuiTmux {
            pid: 31337,
            pane: "main:1.2".into(),
        });
    }

    #[test]
    fn roundtrip_tmux() {
        roundtrip(FocusAddress::Tmux {
            pane: "work:0.0".into(),
        });
    }

    #[test]
    fn roundtrip_ssh_link() {
        roundtrip(FocusAddress::SshLink {
            link_id: "buildbox".into(),
            host: "build.example.com".into(),
            user: "ci".into(),
            port: 2222,
            pane: "agents:2.1".into(),
        });
    }

    #[test]
    fn roundtrip_ssh() {
        roundtrip(FocusAddress::Ssh {
            host: "10.0.1.9".into(),
            user: "deploy".into(),
            port: 22,
            pane: "main:0.0".into(),
        });
    }

    #[test]
    fn roundtrip_web() {
        roundtrip(FocusAddress::Web {
            link_id: "nb-1".into(),
            pane: "notebook:0.0".into(),
        });
    }

    #[test]
    fn roundtrip_tty_device_with_slashes() {
        roundtrip(FocusAddress::Tty {
            device: "/dev/ttys003".into(),
            pid: 7421,
        });
    }

    #[test]
    fn roundtrip_pane_needing_escapes() {
        // ':' and '.' plus characters that collide with the payload framing.
        roundtrip(FocusAddress::Tmux {
            pane: "my session:1.2|x?y".into(),
        });
    }

    #[test]
    fn roundtrip_user_with_space() {
        roundtrip(FocusAddress::Ssh {
            host: "example.org".into(),
            user: "odd user".into(),
            port: 22,
            pane: "s:0.0".into(),
        });
    }

    #[test]
    fn separator_never_unescaped_in_encoded_form() {
        let encoded = FocusAddress::Tmux {
            pane: "a|b|c".into(),
        }
        .encode()
        .unwrap();
        assert!(!encoded.contains('|'), "got {encoded}");
    }

    // ── Encode failures ───────────────────────────────────────────

    #[test]
    fn encode_rejects_empty_pane() {
        let err = FocusAddress::Tmux { pane: String::new() }.encode();
        assert!(matches!(err, Err(EncodeError::EmptyField("pane"))));
    }

    #[test]
    fn encode_rejects_empty_link_id() {
        let err = FocusAddress::SshLink {
            link_id: String::new(),
            host: "h".into(),
            user: "u".into(),
            port: 22,
            pane: "p:0.0".into(),
        }
        .encode();
        assert!(matches!(err, Err(EncodeError::EmptyField("link_id"))));
    }

    // ── Total decode ──────────────────────────────────────────────

    #[test]
    fn decode_rejects_missing_scheme() {
        assert_eq!(FocusAddress::decode("tmux/main:0.0"), None);
        assert_eq!(FocusAddress::decode(""), None);
    }

    #[test]
    fn decode_rejects_unknown_variant() {
        assert_eq!(FocusAddress::decode("claude-focus://screen/0"), None);
    }

    #[test]
    fn decode_rejects_wrong_arity() {
        assert_eq!(FocusAddress::decode("claude-focus://tmux"), None);
        assert_eq!(FocusAddress::decode("claude-focus://tmux/a/b"), None);
        assert_eq!(FocusAddress::decode("claude-focus://gui/1/2"), None);
        assert_eq!(
            FocusAddress::decode("claude-focus://ssh-link/l/h/u/22"),
            None
        );
        assert_eq!(FocusAddress::decode("claude-focus://tty/9"), None);
    }

    #[test]
    fn decode_rejects_bad_numbers() {
        assert_eq!(FocusAddress::decode("claude-focus://gui/abc"), None);
        assert_eq!(
            FocusAddress::decode("claude-focus://ssh/h/u/99999/p"),
            None
        );
    }

    #[test]
    fn decode_rejects_empty_segments() {
        assert_eq!(FocusAddress::decode("claude-focus://tmux/"), None);
        assert_eq!(FocusAddress::decode("claude-focus://web//p"), None);
    }

    #[test]
    fn decode_never_panics_on_fuzzed_input() {
        let cases = [
            "claude-focus://",
            "claude-focus:///",
            "claude-focus://tmux/%",
            "claude-focus://tmux/%zz",
            "claude-focus://ssh-link/a/b/c/d/e/f",
            "claude-focus://tty//0",
            "claude-focus://gui/-1",
            "claude-focus://tmux/a?b?c",
            "CLAUDE-FOCUS://tmux/a",
            "claude-focus:/tmux/a",
        ];
        for case in cases {
            // Either decodes or yields None; must not panic.
            let _ = FocusAddress::decode(case);
        }
    }

    #[test]
    fn decode_truncated_prefixes_yield_none() {
        let full = FocusAddress::SshLink {
            link_id: "l1".into(),
            host: "h".into(),
            user: "u".into(),
            port: 22,
            pane: "p:0.0".into(),
        }
        .encode()
        .unwrap();
        for len in 0..full.len() {
            // No truncation of a 5-segment address leaves a valid 5-segment
            // address; shorter variants may incidentally parse, which is fine
            // as long as nothing panics.
            let _ = FocusAddress::decode(&full[..len]);
        }
    }

    // ── Action query handling ─────────────────────────────────────

    #[test]
    fn action_query_is_not_identity() {
        let addr = FocusAddress::Tmux {
            pane: "main:0.0".into(),
        };
        let encoded = addr.encode().unwrap();
        let with_action = attach_action(&encoded, "focus");
        assert_eq!(FocusAddress::decode(&with_action), Some(addr));
    }

    #[test]
    fn split_action_extracts_token() {
        assert_eq!(
            split_action("tmux/a?action=focus"),
            ("tmux/a", Some("focus"))
        );
        assert_eq!(split_action("tmux/a"), ("tmux/a", None));
        assert_eq!(split_action("tmux/a?action="), ("tmux/a", None));
        assert_eq!(split_action("tmux/a?other=1"), ("tmux/a", None));
    }

    #[test]
    fn attach_then_split() {
        let s = attach_action("claude-focus://tmux/a", "push");
        let (path, action) = split_action(&s);
        assert_eq!(path, "claude-focus://tmux/a");
        assert_eq!(action, Some("push"));
    }

    // ── Metadata helpers ──────────────────────────────────────────

    #[test]
    fn variant_names_are_wire_names() {
        assert_eq!(FocusAddress::Gui { pid: 1 }.variant_name(), "gui");
        assert_eq!(
            FocusAddress::Tmux { pane: "a".into() }.variant_name(),
            "tmux"
        );
    }

    #[test]
    fn describe_is_human_readable() {
        let addr = FocusAddress::Ssh {
            host: "build".into(),
            user: "ci".into(),
            port: 22,
            pane: "m:0.0".into(),
        };
        assert_eq!(addr.describe(), "ci@build:m:0.0");
    }
}
