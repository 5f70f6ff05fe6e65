// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session state and identity-token selection.

use std::time::Duration;

use ualink_types::codec::ByteString;
use ualink_types::messages::{
    AnonymousIdentityToken, EndpointDescription, UserNameIdentityToken, UserTokenKind,
    UserTokenPolicy,
};
use ualink_types::{ExtensionObject, NodeId};

use crate::channel::SECURITY_POLICY_NONE;

// =============================================================================
// SessionInfo
// =============================================================================

/// The state of an established session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Server-assigned session id.
    pub session_id: NodeId,

    /// Token carried in every request header within the session.
    pub authentication_token: NodeId,

    /// Session lifetime granted by the server.
    pub revised_timeout: Duration,
}

// =============================================================================
// Identity
// =============================================================================

/// The identity presented in ActivateSession.
#[derive(Debug, Clone)]
pub(crate) enum Identity {
    /// Anonymous access.
    Anonymous,

    /// Username and password.
    UserName {
        /// The user name.
        username: String,
        /// The password.
        password: String,
    },
}

impl Identity {
    /// The token kind this identity needs the endpoint to accept.
    fn token_kind(&self) -> UserTokenKind {
        match self {
            Self::Anonymous => UserTokenKind::Anonymous,
            Self::UserName { .. } => UserTokenKind::UserName,
        }
    }

    /// Builds the identity token for ActivateSession, selecting the policy
    /// id advertised by the server's endpoints. Falls back to the
    /// conventional policy ids when the server advertises none.
    pub(crate) fn to_token(&self, endpoints: &[EndpointDescription]) -> ExtensionObject {
        let policy_id = select_policy_id(endpoints, self.token_kind()).unwrap_or_else(|| {
            match self.token_kind() {
                UserTokenKind::UserName => "username".to_string(),
                _ => "anonymous".to_string(),
            }
        });

        match self {
            Self::Anonymous => {
                ExtensionObject::from_message(&AnonymousIdentityToken { policy_id })
            }
            Self::UserName { username, password } => {
                ExtensionObject::from_message(&UserNameIdentityToken {
                    policy_id,
                    user_name: username.clone(),
                    password: ByteString::new(password.as_bytes().to_vec()),
                    encryption_algorithm: String::new(),
                })
            }
        }
    }
}

/// Picks the policy id for `kind` from the server's endpoints, preferring
/// endpoints on the None security policy (the only one this client speaks).
fn select_policy_id(endpoints: &[EndpointDescription], kind: UserTokenKind) -> Option<String> {
    let matching = |policy: &&UserTokenPolicy| policy.token_type == kind;

    endpoints
        .iter()
        .filter(|e| e.security_policy_uri == SECURITY_POLICY_NONE)
        .chain(endpoints.iter())
        .flat_map(|e| e.user_identity_tokens.iter().filter(matching))
        .map(|policy| policy.policy_id.clone())
        .find(|id| !id.is_empty())
}

// =============================================================================
// Tests
// =============================================================================
