//! Server-push stream handling: SSE decoding and session lifecycle

pub mod session;
pub mod sse;

pub use session::{SessionEnd, SessionHandle, SessionState};
pub use sse::SseDecoder;
