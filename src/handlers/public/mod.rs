// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Magic link lifecycle: generate → validate → use. The only credential a
// respondent holds before `use` is the token itself.
pub mod magic_link;

pub use magic_link::{generate_post, use_post, validate_post};
