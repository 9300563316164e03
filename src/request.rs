//! Protocol request descriptions.
//!
//! A [`RequestSpec`] is an immutable snapshot of one protocol request: the
//! session token, the action, and whether the access key accompanies it. The
//! builder deliberately validates nothing - scenarios must be able to
//! construct protocol-violating requests (absent token, blank action, wrong
//! verb for the current state) to exercise the target's rejection paths.
//!
//! The display form redacts the token to at most its first and last four
//! characters so diagnostics never leak a full session token.

use crate::token::TokenGenerator;
use std::fmt;

/// The three operations the target endpoint recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVerb {
    Login,
    Action,
    Logout,
}

impl ProtocolVerb {
    /// The wire form of the verb.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Action => "ACTION",
            Self::Logout => "LOGOUT",
        }
    }

    pub const ALL: [ProtocolVerb; 3] = [Self::Login, Self::Action, Self::Logout];
}

impl fmt::Display for ProtocolVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of one protocol request.
///
/// Equality and display are defined over exactly these three fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    token: Option<String>,
    action: Option<String>,
    include_api_key: bool,
}

impl RequestSpec {
    pub fn builder() -> RequestSpecBuilder {
        RequestSpecBuilder::default()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn include_api_key(&self) -> bool {
        self.include_api_key
    }

    /// The token as shown in diagnostics: `***` when absent or 8 chars or
    /// shorter, otherwise first four + `***` + last four.
    pub fn redacted_token(&self) -> String {
        redact(self.token.as_deref())
    }
}

impl fmt::Display for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RequestSpec {{ token: {}, action: {}, api_key: {} }}",
            self.redacted_token(),
            self.action.as_deref().unwrap_or("<none>"),
            if self.include_api_key { "present" } else { "missing" },
        )
    }
}

fn redact(token: Option<&str>) -> String {
    match token {
        Some(token) if token.chars().count() > 8 => {
            let chars: Vec<char> = token.chars().collect();
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{head}***{tail}")
        }
        _ => "***".to_string(),
    }
}

/// Mutable construction-time state for a [`RequestSpec`].
///
/// The access key is included by default; every other field starts absent.
/// `build()` freezes the current state into a spec.
#[derive(Debug, Clone)]
pub struct RequestSpecBuilder {
    token: Option<String>,
    action: Option<String>,
    include_api_key: bool,
}

impl Default for RequestSpecBuilder {
    fn default() -> Self {
        Self {
            token: None,
            action: None,
            include_api_key: true,
        }
    }
}

impl RequestSpecBuilder {
    /// Set an explicit token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set a freshly generated valid token.
    pub fn valid_token(self, generator: &TokenGenerator) -> Self {
        self.token(generator.valid_token())
    }

    /// Set a freshly generated invalid-alphabet token.
    pub fn invalid_token(self, generator: &TokenGenerator) -> Self {
        self.token(generator.invalid_token())
    }

    /// Set the action to a canonical protocol verb.
    pub fn verb(mut self, verb: ProtocolVerb) -> Self {
        self.action = Some(verb.as_str().to_string());
        self
    }

    pub fn login(self) -> Self {
        self.verb(ProtocolVerb::Login)
    }

    pub fn action(self) -> Self {
        self.verb(ProtocolVerb::Action)
    }

    pub fn logout(self) -> Self {
        self.verb(ProtocolVerb::Logout)
    }

    /// Set an arbitrary action string, including blank or unknown ones.
    pub fn action_name(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Omit the `X-Api-Key` header entirely.
    pub fn without_api_key(mut self) -> Self {
        self.include_api_key = false;
        self
    }

    /// Freeze the current state into an immutable spec.
    pub fn build(self) -> RequestSpec {
        RequestSpec {
            token: self.token,
            action: self.action,
            include_api_key: self.include_api_key,
        }
    }
}
