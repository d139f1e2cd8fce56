//! Access policy for survey, response, and profile rows.
//!
//! `authorize` is a pure function of the acting principal, the resource's
//! owner and status, and the operation. Callers must evaluate it on every
//! access; nothing here is cached.

use serde::Serialize;
use uuid::Uuid;

use crate::database::models::{Survey, SurveyStatus};

pub type AccountId = Uuid;

/// Who is acting, as established by the session layer for this request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    Anonymous,
    Account { account_id: AccountId },
    /// Holder of a consumed magic link, scoped to one survey
    Respondent { email: String, survey_id: Uuid },
    Service,
}

/// A principal's relation to one resource owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Anonymous,
    AuthenticatedAsOwner(AccountId),
    AuthenticatedAsOther(AccountId),
    ServiceLevel,
}

impl Principal {
    pub fn account(account_id: AccountId) -> Self {
        Principal::Account { account_id }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, Principal::Service)
    }

    /// Respondents hold no account and rank with anonymous callers here
    pub fn standing_toward(&self, owner: AccountId) -> Standing {
        match self {
            Principal::Service => Standing::ServiceLevel,
            Principal::Account { account_id } if *account_id == owner => Standing::AuthenticatedAsOwner(*account_id),
            Principal::Account { account_id } => Standing::AuthenticatedAsOther(*account_id),
            Principal::Anonymous | Principal::Respondent { .. } => Standing::Anonymous,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Insert,
    Update,
    Delete,
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" | "select" => Ok(Operation::Read),
            "insert" => Ok(Operation::Insert),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            other => Err(format!("unknown operation '{}'", other)),
        }
    }
}

/// The survey facts every rule needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurveyFacts {
    pub id: Uuid,
    pub owner: AccountId,
    pub status: SurveyStatus,
    pub has_link: bool,
}

impl SurveyFacts {
    fn accepts_respondents(&self) -> bool {
        self.status == SurveyStatus::Active && self.has_link
    }
}

impl From<&Survey> for SurveyFacts {
    fn from(survey: &Survey) -> Self {
        Self {
            id: survey.id,
            owner: survey.owner_account_id,
            status: survey.status,
            has_link: survey.unique_link.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Survey(SurveyFacts),
    /// A response row (existing or about to be inserted) under its survey
    Response(SurveyFacts),
    Profile { account_id: AccountId },
}

impl Resource {
    pub fn survey(survey: &Survey) -> Self {
        Resource::Survey(survey.into())
    }

    pub fn response_of(survey: &Survey) -> Self {
        Resource::Response(survey.into())
    }

    fn owner(&self) -> AccountId {
        match self {
            Resource::Survey(s) | Resource::Response(s) => s.owner,
            Resource::Profile { account_id } => *account_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

pub fn authorize(principal: &Principal, resource: &Resource, operation: Operation) -> Decision {
    let decision = evaluate(principal, resource, operation);
    tracing::debug!(?principal, ?resource, ?operation, ?decision, "policy decision");
    decision
}

fn evaluate(principal: &Principal, resource: &Resource, operation: Operation) -> Decision {
    use Decision::{Allow, Deny};

    // Survey-scoped magic link sessions get their own narrow grant
    if let Principal::Respondent { survey_id, .. } = principal {
        return match (resource, operation) {
            (Resource::Survey(s), Operation::Read) if s.id == *survey_id && s.status == SurveyStatus::Active => Allow,
            (Resource::Response(s), Operation::Insert) if s.id == *survey_id && s.accepts_respondents() => Allow,
            _ => Deny,
        };
    }

    match principal.standing_toward(resource.owner()) {
        Standing::ServiceLevel => Allow,

        Standing::Anonymous => match (resource, operation) {
            (Resource::Response(s), Operation::Insert) if s.accepts_respondents() => Allow,
            _ => Deny,
        },

        Standing::AuthenticatedAsOwner(_) => match (resource, operation) {
            (Resource::Response(s), Operation::Insert) if s.accepts_respondents() => Allow,
            (Resource::Response(_), Operation::Insert) => Deny,
            (_, Operation::Read | Operation::Update | Operation::Delete) => Allow,
            (Resource::Survey(_) | Resource::Profile { .. }, Operation::Insert) => Allow,
        },

        Standing::AuthenticatedAsOther(_) => Deny,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_OPS: [Operation; 4] = [Operation::Read, Operation::Insert, Operation::Update, Operation::Delete];

    fn facts(owner: AccountId, status: SurveyStatus, has_link: bool) -> SurveyFacts {
        SurveyFacts {
            id: Uuid::new_v4(),
            owner,
            status,
            has_link,
        }
    }

    #[test]
    fn service_is_allowed_everything() {
        let s = facts(Uuid::new_v4(), SurveyStatus::Draft, false);
        for resource in [Resource::Survey(s), Resource::Response(s), Resource::Profile { account_id: s.owner }] {
            for op in ALL_OPS {
                assert_eq!(authorize(&Principal::Service, &resource, op), Decision::Allow);
            }
        }
    }

    #[test]
    fn anonymous_may_only_insert_responses_into_accepting_surveys() {
        let active = facts(Uuid::new_v4(), SurveyStatus::Active, true);
        assert!(authorize(&Principal::Anonymous, &Resource::Response(active), Operation::Insert).is_allowed());

        for op in [Operation::Read, Operation::Update, Operation::Delete] {
            assert_eq!(authorize(&Principal::Anonymous, &Resource::Response(active), op), Decision::Deny);
        }
        for op in ALL_OPS {
            assert_eq!(authorize(&Principal::Anonymous, &Resource::Survey(active), op), Decision::Deny);
            assert_eq!(
                authorize(&Principal::Anonymous, &Resource::Profile { account_id: active.owner }, op),
                Decision::Deny
            );
        }
    }

    #[test]
    fn anonymous_insert_refused_for_draft_closed_or_unlinked() {
        let owner = Uuid::new_v4();
        for s in [
            facts(owner, SurveyStatus::Draft, true),
            facts(owner, SurveyStatus::Closed, true),
            facts(owner, SurveyStatus::Active, false),
        ] {
            assert_eq!(authorize(&Principal::Anonymous, &Resource::Response(s), Operation::Insert), Decision::Deny);
        }
    }

    #[test]
    fn owner_manages_own_rows() {
        let owner = Uuid::new_v4();
        let principal = Principal::account(owner);
        let draft = facts(owner, SurveyStatus::Draft, false);

        for op in [Operation::Read, Operation::Update, Operation::Delete] {
            assert!(authorize(&principal, &Resource::Survey(draft), op).is_allowed());
            assert!(authorize(&principal, &Resource::Response(draft), op).is_allowed());
            assert!(authorize(&principal, &Resource::Profile { account_id: owner }, op).is_allowed());
        }
        assert_eq!(authorize(&principal, &Resource::Response(draft), Operation::Insert), Decision::Deny);
    }

    #[test]
    fn other_tenants_are_denied_everything() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let b_survey = facts(b, SurveyStatus::Active, true);
        let as_a = Principal::account(a);

        for op in ALL_OPS {
            assert_eq!(authorize(&as_a, &Resource::Survey(b_survey), op), Decision::Deny);
            assert_eq!(authorize(&as_a, &Resource::Response(b_survey), op), Decision::Deny);
            assert_eq!(authorize(&as_a, &Resource::Profile { account_id: b }, op), Decision::Deny);
        }
    }

    #[test]
    fn respondent_scope_is_one_survey() {
        let owner = Uuid::new_v4();
        let scoped = facts(owner, SurveyStatus::Active, true);
        let other = facts(owner, SurveyStatus::Active, true);
        let respondent = Principal::Respondent {
            email: "alice@example.com".into(),
            survey_id: scoped.id,
        };

        assert!(authorize(&respondent, &Resource::Survey(scoped), Operation::Read).is_allowed());
        assert!(authorize(&respondent, &Resource::Response(scoped), Operation::Insert).is_allowed());

        assert_eq!(authorize(&respondent, &Resource::Response(scoped), Operation::Read), Decision::Deny);
        assert_eq!(authorize(&respondent, &Resource::Survey(scoped), Operation::Update), Decision::Deny);
        assert_eq!(authorize(&respondent, &Resource::Survey(other), Operation::Read), Decision::Deny);
        assert_eq!(
            authorize(&respondent, &Resource::Profile { account_id: owner }, Operation::Read),
            Decision::Deny
        );
    }

    #[test]
    fn respondent_loses_read_once_survey_closes() {
        let closed = facts(Uuid::new_v4(), SurveyStatus::Closed, true);
        let respondent = Principal::Respondent {
            email: "alice@example.com".into(),
            survey_id: closed.id,
        };
        assert_eq!(authorize(&respondent, &Resource::Survey(closed), Operation::Read), Decision::Deny);
    }

    #[test]
    fn standing_matches_ownership() {
        let owner = Uuid::new_v4();
        assert_eq!(Principal::account(owner).standing_toward(owner), Standing::AuthenticatedAsOwner(owner));
        let other = Uuid::new_v4();
        assert_eq!(Principal::account(other).standing_toward(owner), Standing::AuthenticatedAsOther(other));
        assert_eq!(Principal::Anonymous.standing_toward(owner), Standing::Anonymous);
        assert_eq!(Principal::Service.standing_toward(owner), Standing::ServiceLevel);
    }
}
