//! focusd, chat-driven terminal remote control.
//!
//! Routes chat-platform webhook events (button clicks and threaded replies)
//! to terminal sessions spread across heterogeneous hosts: a local desktop,
//! SSH-reached remotes, or a browser-attached terminal. Each target is named
//! by a compact Focus Address; an inbound webhook is verified, classified as
//! locally satisfiable or foreign, and either proxied to a cooperating peer
//! relay or translated into literal input for a local multiplexer pane.

pub mod action;
pub mod address;
pub mod config;
pub mod dispatch;
pub mod payload;
pub mod relay;
pub mod store;
pub mod webhook;
