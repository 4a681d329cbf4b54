//! Transport adapters for RTA.
//!
//! Concrete implementations of the kernel's transport collaborators:
//!
//! - [`SupabaseExecutor`] runs generated SQL through a Supabase RPC.
//! - [`SseTelemetrySource`] subscribes to a source's server-push stream.
//! - [`SmtpNotifier`] delivers alert notifications by e-mail.

pub mod email;
pub mod error;
pub mod sse;
pub mod supabase;

pub use email::{DEFAULT_SMTP_PORT, SmtpConfig, SmtpNotifier};
pub use error::{AdapterError, Result};
pub use sse::{DEFAULT_STREAM_URL, SseLineDecoder, SseTelemetrySource};
pub use supabase::{DEFAULT_RPC, SupabaseConfig, SupabaseExecutor};
