pub mod principal;
pub mod response;

pub use principal::principal_middleware;
pub use response::{ApiResponse, ApiResult};
