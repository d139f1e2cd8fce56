// handlers/protected/mod.rs - Principal-aware handlers under /api
//
// Every handler receives the `Principal` resolved by `principal_middleware`
// and passes it to a service, which consults the access policy per row.
pub mod auth;
pub mod profiles;
pub mod responses;
pub mod surveys;
