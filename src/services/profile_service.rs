use std::sync::Arc;
use uuid::Uuid;

use super::error::ServiceResult;
use super::{missing, require};
use crate::database::models::Profile;
use crate::database::{ProfileStore, Store};
use crate::policy::{Operation, Principal, Resource};

pub struct ProfileService {
    store: Arc<dyn Store>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, principal: &Principal, account_id: Uuid) -> ServiceResult<Profile> {
        // Ownership is known from the id alone, so decide before touching storage
        require(principal, &Resource::Profile { account_id }, Operation::Read)?;
        self.store
            .find_profile(account_id)
            .await?
            .ok_or_else(|| missing(principal, "profile"))
    }
}
