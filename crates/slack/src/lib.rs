//! Slack Integration - Socket Mode bot interface
//!
//! This crate provides the Slack interface for askwolf:
//! - **Socket Mode** (`socket`) - WebSocket connection loop to Slack (no public URL needed)
//! - **Command Patterns** (`commands`) - templated text triggers like `query for bot - <message>`
//! - **Dispatch** (`events`) - routes inbound messages to registered command handlers
//! - **Sender** (`sender`) - outbound `chat.postMessage` replies
//! - **Analytics** (`analytics`) - per-invocation metadata stream and logger task
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Socket Mode and subscribe to message events
//! 3. Set env vars: `ASKWOLF_SLACK_APP_TOKEN`, `ASKWOLF_SLACK_BOT_TOKEN`
//!
//! # Key Types
//!
//! - `SocketModeRunner` - connection loop with reconnection backoff
//! - `CommandDispatcher` - matches inbound text against registered patterns
//! - `CommandHandler` - trait implemented by the bot's question handler
//! - `AnalyticsSink` - single-producer side of the invocation event stream

pub mod analytics;
pub mod commands;
pub mod events;
pub mod sender;
pub mod socket;
