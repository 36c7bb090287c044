//! Authentication context consulted before sending.

/// Answers whether the current user may send messages.
pub trait AuthProvider: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn user_id(&self) -> Option<String>;
}

/// Fixed authentication context, for embedding apps that resolve auth up front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticAuth {
    user_id: Option<String>,
}

impl StaticAuth {
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }
}

impl AuthProvider for StaticAuth {
    fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_auth() {
        let auth = StaticAuth::authenticated("user-1");
        assert!(auth.is_authenticated());
        assert_eq!(auth.user_id().as_deref(), Some("user-1"));

        let anon = StaticAuth::anonymous();
        assert!(!anon.is_authenticated());
        assert!(anon.user_id().is_none());
    }
}
