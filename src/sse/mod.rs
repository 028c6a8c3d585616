pub mod models;
pub use models::*;

mod sse_broadcaster;
pub use sse_broadcaster::*;

mod events_sse;

pub use events_sse::events_sse;
