pub mod magic_link;
pub mod migrate;
pub mod policy;
pub mod token;
