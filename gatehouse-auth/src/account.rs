//! Account security state machine
//!
//! Lockout is driven only by login outcomes and cleared only by an explicit
//! administrative unlock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observable account state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountState {
    ActiveUnlocked,
    ActiveLocked,
    Inactive,
}

/// Per-principal security state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSecurity {
    pub is_active: bool,
    pub is_locked: bool,
    pub is_credential_expired: bool,
    pub failed_attempts: u32,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Default for AccountSecurity {
    fn default() -> Self {
        Self {
            is_active: true,
            is_locked: false,
            is_credential_expired: false,
            failed_attempts: 0,
            last_login_at: None,
        }
    }
}

impl AccountSecurity {
    /// Inactive wins over locked
    pub fn state(&self) -> AccountState {
        if !self.is_active {
            AccountState::Inactive
        } else if self.is_locked {
            AccountState::ActiveLocked
        } else {
            AccountState::ActiveUnlocked
        }
    }

    pub fn on_login_success(&mut self, now: DateTime<Utc>) {
        self.failed_attempts = 0;
        self.last_login_at = Some(now);
    }

    /// Count a failure; returns true when this failure locked the account
    pub fn on_login_failure(&mut self, max_attempts: u32) -> bool {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        if !self.is_locked && self.failed_attempts >= max_attempts {
            self.is_locked = true;
            return true;
        }
        false
    }

    pub fn unlock(&mut self) {
        self.is_locked = false;
        self.failed_attempts = 0;
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Failures left before lockout
    pub fn remaining_attempts(&self, max_attempts: u32) -> u32 {
        max_attempts.saturating_sub(self.failed_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_failure_locks() {
        let mut security = AccountSecurity {
            failed_attempts: 4,
            ..Default::default()
        };
        assert!(security.on_login_failure(5));
        assert!(security.is_locked);
        assert_eq!(security.state(), AccountState::ActiveLocked);

        // Further failures keep counting but do not report a new lock
        assert!(!security.on_login_failure(5));
        assert_eq!(security.failed_attempts, 6);
    }

    #[test]
    fn success_before_threshold_resets_counter() {
        let mut security = AccountSecurity::default();
        for _ in 0..3 {
            assert!(!security.on_login_failure(5));
        }
        assert_eq!(security.remaining_attempts(5), 2);

        let now = Utc::now();
        security.on_login_success(now);
        assert_eq!(security.failed_attempts, 0);
        assert_eq!(security.last_login_at, Some(now));
        assert_eq!(security.state(), AccountState::ActiveUnlocked);
    }

    #[test]
    fn lock_only_clears_on_unlock() {
        let mut security = AccountSecurity::default();
        for _ in 0..5 {
            security.on_login_failure(5);
        }
        security.on_login_success(Utc::now());
        assert!(security.is_locked);

        security.unlock();
        assert!(!security.is_locked);
        assert_eq!(security.failed_attempts, 0);
    }

    #[test]
    fn activation_is_independent_of_lock() {
        let mut security = AccountSecurity::default();
        security.on_login_failure(1);
        security.deactivate();
        assert_eq!(security.state(), AccountState::Inactive);

        security.activate();
        assert_eq!(security.state(), AccountState::ActiveLocked);
    }
}
