use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::ConsoleError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(pub String);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability handed to every console entry point in place of ambient login state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSession {
    pub operator: OperatorId,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl OperatorSession {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: OperatorId(operator.into()),
            started_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expires_at = Some(self.started_at + ttl);
        self
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }

    pub fn authorize(&self, now: DateTime<Utc>) -> Result<&OperatorId, ConsoleError> {
        if self.is_active_at(now) {
            Ok(&self.operator)
        } else {
            Err(ConsoleError::PermissionDenied(format!(
                "session for operator {} has expired",
                self.operator
            )))
        }
    }
}

/// Authenticated-session collaborator supplied by the surrounding application.
pub trait SessionProvider: Send + Sync {
    fn current_operator(&self) -> Option<OperatorSession>;
    fn logout(&self);
}

/// Provider holding one session until it is logged out.
#[derive(Debug, Default)]
pub struct FixedSessionProvider {
    session: Mutex<Option<OperatorSession>>,
}

impl FixedSessionProvider {
    pub fn signed_in(session: OperatorSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

impl SessionProvider for FixedSessionProvider {
    fn current_operator(&self) -> Option<OperatorSession> {
        self.session.lock().expect("session mutex poisoned").clone()
    }

    fn logout(&self) {
        self.session.lock().expect("session mutex poisoned").take();
    }
}
