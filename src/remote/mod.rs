//! Comic platform GraphQL sources.
//!
//! Both sources emit records already renamed to the local field names so the
//! reconciler can validate them directly.

mod client;
mod comments;
mod episodes;
mod queries;

pub use client::GraphQlClient;
pub use comments::CommentSource;
pub use episodes::EpisodeSource;
