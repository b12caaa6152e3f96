pub mod repository;
pub mod types;

pub use repository::CommentRepository;
pub use types::{CommentKind, ReferenceComment, Season};
