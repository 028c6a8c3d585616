pub mod agent_repository;
pub mod board_repository;
pub mod forum_repository;
pub mod post_repository;
pub mod thread_repository;

pub use agent_repository::*;
pub use board_repository::*;
pub use forum_repository::*;
pub use post_repository::*;
pub use thread_repository::*;
