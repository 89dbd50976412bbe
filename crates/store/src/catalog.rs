//! In-memory alert rule store
//!
//! Read side implements [`RuleCatalog`] for the matcher and scheduler. The
//! inherent methods are the write surface used by the user-management
//! collaborator.

use async_trait::async_trait;
use dashmap::DashMap;
use herald_core::{AlertRule, NotificationPreference, OwnerId, RuleId};
use herald_ports::{RuleCatalog, StoreError, StoreResult};
use log::info;
use std::sync::Arc;

pub struct InMemoryRuleCatalog {
    rules: Arc<DashMap<RuleId, AlertRule>>,
    preferences: Arc<DashMap<OwnerId, NotificationPreference>>,
}

impl InMemoryRuleCatalog {
    pub fn new() -> Self {
        Self {
            rules: Arc::new(DashMap::new()),
            preferences: Arc::new(DashMap::new()),
        }
    }

    /// Store a new rule; fails if the id is already taken
    pub fn create_rule(&self, rule: AlertRule) -> StoreResult<RuleId> {
        let id = rule.id;
        match self.rules.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StoreError::Conflict(format!("rule {} already exists", id)))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                info!("[catalog] rule {} created for owner {}: {}", id, rule.owner_id, rule.target);
                slot.insert(rule);
                Ok(id)
            }
        }
    }

    pub fn rename_rule(&self, id: RuleId, name: impl Into<String>) -> StoreResult<AlertRule> {
        let mut rule = self.rules.get_mut(&id).ok_or(StoreError::RuleNotFound(id))?;
        rule.rename(name);
        Ok(rule.clone())
    }

    /// Pause or resume a rule. Rules are never hard-deleted.
    pub fn set_rule_active(&self, id: RuleId, active: bool) -> StoreResult<AlertRule> {
        let mut rule = self.rules.get_mut(&id).ok_or(StoreError::RuleNotFound(id))?;
        rule.set_active(active);
        info!("[catalog] rule {} active={}", id, active);
        Ok(rule.clone())
    }

    pub fn rule(&self, id: RuleId) -> Option<AlertRule> {
        self.rules.get(&id).map(|r| r.value().clone())
    }

    /// Every rule for an owner, oldest first, paused ones included
    pub fn rules_for_owner(&self, owner_id: OwnerId) -> Vec<AlertRule> {
        let mut rules: Vec<AlertRule> = self
            .rules
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| r.value().clone())
            .collect();
        rules.sort_by_key(|r| r.created_at);
        rules
    }

    pub fn upsert_preference(&self, preference: NotificationPreference) {
        self.preferences.insert(preference.owner_id, preference);
    }
}

impl Default for InMemoryRuleCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryRuleCatalog {
    fn clone(&self) -> Self {
        Self {
            rules: Arc::clone(&self.rules),
            preferences: Arc::clone(&self.preferences),
        }
    }
}

#[async_trait]
impl RuleCatalog for InMemoryRuleCatalog {
    async fn active_rules(&self) -> StoreResult<Vec<AlertRule>> {
        let mut rules: Vec<AlertRule> = self
            .rules
            .iter()
            .filter(|r| r.active)
            .map(|r| r.value().clone())
            .collect();
        rules.sort_by_key(|r| (r.created_at, r.id));
        Ok(rules)
    }

    async fn preference(&self, owner_id: OwnerId) -> StoreResult<Option<NotificationPreference>> {
        Ok(self.preferences.get(&owner_id).map(|p| p.value().clone()))
    }
}
