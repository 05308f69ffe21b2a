//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{RolloutRecord, ToggleRecord};
use crate::domain::types::{RolloutStrategy, ValueType};

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// One-based offset pagination as used by the admin listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Clamp caller-supplied values into a usable window.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.limit.max(1)))
    }
}

/// Read side of the toggle source of truth.
#[async_trait]
pub trait TogglesRepo: Send + Sync {
    /// Public lookup: inactive toggles are indistinguishable from missing ones.
    async fn find_active_by_key(&self, key: &str) -> Result<Option<ToggleRecord>, RepoError>;
    async fn find_by_key(&self, key: &str) -> Result<Option<ToggleRecord>, RepoError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ToggleRecord>, RepoError>;
    async fn list_active(&self) -> Result<Vec<ToggleRecord>, RepoError>;
    async fn list_all(&self) -> Result<Vec<ToggleRecord>, RepoError>;
    async fn list_page(&self, page: PageRequest) -> Result<Page<ToggleRecord>, RepoError>;
    async fn health_check(&self) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateToggleParams {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub value: String,
    pub value_type: ValueType,
    pub is_active: bool,
    pub actor: Uuid,
}

#[derive(Debug, Clone)]
pub struct UpdateToggleParams {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub value: String,
    pub value_type: ValueType,
    pub actor: Uuid,
}

#[async_trait]
pub trait TogglesWriteRepo: Send + Sync {
    async fn create_toggle(&self, params: CreateToggleParams) -> Result<ToggleRecord, RepoError>;
    async fn update_toggle(&self, params: UpdateToggleParams) -> Result<ToggleRecord, RepoError>;
    async fn set_toggle_active(
        &self,
        id: Uuid,
        is_active: bool,
        actor: Uuid,
    ) -> Result<ToggleRecord, RepoError>;
    /// Deletes the toggle together with its rollouts, returning the removed record.
    async fn delete_toggle(&self, id: Uuid) -> Result<ToggleRecord, RepoError>;
}

#[async_trait]
pub trait RolloutsRepo: Send + Sync {
    async fn find_rollout(&self, id: Uuid) -> Result<Option<RolloutRecord>, RepoError>;
    async fn list_for_toggle(&self, toggle_id: Uuid) -> Result<Vec<RolloutRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateRolloutParams {
    pub toggle_id: Uuid,
    pub strategy: RolloutStrategy,
    pub percentage: i32,
    pub is_active: bool,
    pub actor: Uuid,
}

#[derive(Debug, Clone)]
pub struct UpdateRolloutParams {
    pub id: Uuid,
    pub strategy: RolloutStrategy,
    pub percentage: i32,
    pub is_active: bool,
    pub actor: Uuid,
}

#[async_trait]
pub trait RolloutsWriteRepo: Send + Sync {
    async fn create_rollout(&self, params: CreateRolloutParams)
    -> Result<RolloutRecord, RepoError>;
    async fn update_rollout(&self, params: UpdateRolloutParams)
    -> Result<RolloutRecord, RepoError>;
    async fn set_rollout_percentage(
        &self,
        id: Uuid,
        percentage: i32,
        actor: Uuid,
    ) -> Result<RolloutRecord, RepoError>;
    async fn delete_rollout(&self, id: Uuid) -> Result<RolloutRecord, RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps() {
        let page = PageRequest::new(Some(0), Some(1_000));
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, MAX_PAGE_LIMIT);
        assert_eq!(page.offset(), 0);

        let page = PageRequest::new(Some(3), Some(10));
        assert_eq!(page.offset(), 20);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page: Page<()> = Page {
            items: Vec::new(),
            total: 21,
            page: 1,
            limit: 10,
        };
        assert_eq!(page.total_pages(), 3);
    }
}
