//! Chat Transport
//!
//! Connects the workflow to the chat platform. Telegram is the production
//! adapter; the recording adapter stands in for it in tests.
//!
//! ## Architecture
//!
//! ```text
//! Telegram → ChatAdapter → mpsc → BotGateway
//!                                    ↓
//!                         CommandRouter.parse() / CallbackAction::parse()
//!                                    ↓
//!                                 Workflow
//!                                    ↓
//!                   ResponseMapper → ChatAdapter.send_message()
//! ```

pub mod adapters;
pub mod command_router;
pub mod gateway;
pub mod response_mapper;
pub mod types;

pub use types::*;
