pub mod magic_link;
pub mod profile;
pub mod response;
pub mod survey;

pub use magic_link::MagicLinkToken;
pub use profile::Profile;
pub use response::{NewResponse, SurveyResponse};
pub use survey::{NewSurvey, Survey, SurveyStatus, SurveyUpdate};
