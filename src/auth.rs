// Destination authentication
//
// DESIGN: A closed set of credential strategies. Each variant is validated
// when the configuration is resolved, so a bad credential aborts startup
// instead of failing on the first flush. At dispatch time the provider only
// adds an Authorization header to the outgoing request.

use crate::config::{AuthenticationConfig, ConfigError};
use crate::destinations::BulkRequest;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub enum AuthProvider {
    /// `Authorization: Basic <base64(user:password)>`
    Basic { encoded: String },
    /// `Authorization: Bearer <token>`
    Bearer { token: String },
}

impl AuthProvider {
    pub fn basic(user: &str, password: &str) -> Result<Self, ConfigError> {
        if user.is_empty() {
            return Err(ConfigError::MissingCredential {
                kind: "BASIC",
                field: "user",
            });
        }
        if password.is_empty() {
            return Err(ConfigError::MissingCredential {
                kind: "BASIC",
                field: "password",
            });
        }

        let encoded = STANDARD.encode(format!("{}:{}", user, password));
        Ok(AuthProvider::Basic { encoded })
    }

    pub fn bearer(token: &str) -> Result<Self, ConfigError> {
        if token.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                kind: "BEARER",
                field: "token",
            });
        }
        Ok(AuthProvider::Bearer {
            token: token.to_string(),
        })
    }

    /// Builds the provider named by `config.auth_type`. Unknown types are a
    /// configuration error.
    pub fn from_config(config: &AuthenticationConfig) -> Result<Self, ConfigError> {
        match config.auth_type.as_str() {
            "basic" => Self::basic(credential(config, "user"), credential(config, "password")),
            "bearer" => Self::bearer(credential(config, "token")),
            other => Err(ConfigError::UnsupportedAuthentication(other.to_string())),
        }
    }

    pub fn header_value(&self) -> String {
        match self {
            AuthProvider::Basic { encoded } => format!("Basic {}", encoded),
            AuthProvider::Bearer { token } => format!("Bearer {}", token),
        }
    }

    /// Adds the credentials to an outgoing request, replacing any
    /// Authorization header already present.
    pub fn apply(&self, request: &mut BulkRequest) {
        request.set_header("authorization", self.header_value());
    }
}

fn credential<'a>(config: &'a AuthenticationConfig, name: &str) -> &'a str {
    config.config.get(name).map(String::as_str).unwrap_or("")
}

// Credentials never end up in logs
impl fmt::Debug for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthProvider::Basic { .. } => f.write_str("Basic(***)"),
            AuthProvider::Bearer { .. } => f.write_str("Bearer(***)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn auth_config(auth_type: &str, pairs: &[(&str, &str)]) -> AuthenticationConfig {
        AuthenticationConfig {
            auth_type: auth_type.to_string(),
            config: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_basic_encodes_user_and_password() {
        let auth = AuthProvider::basic("elastic", "changeme").unwrap();
        // base64("elastic:changeme")
        assert_eq!(auth.header_value(), "Basic ZWxhc3RpYzpjaGFuZ2VtZQ==");
    }

    #[test]
    fn test_bearer_header() {
        let auth = AuthProvider::bearer("xaat-123").unwrap();
        assert_eq!(auth.header_value(), "Bearer xaat-123");
    }

    #[test]
    fn test_bearer_rejects_empty_token() {
        assert!(matches!(
            AuthProvider::bearer(""),
            Err(ConfigError::MissingCredential { kind: "BEARER", field: "token" })
        ));
        assert!(AuthProvider::bearer("   ").is_err());
    }

    #[test]
    fn test_basic_rejects_missing_fields() {
        assert!(AuthProvider::basic("", "secret").is_err());
        assert!(AuthProvider::basic("elastic", "").is_err());
    }

    #[test]
    fn test_from_config() {
        let basic = AuthProvider::from_config(&auth_config(
            "basic",
            &[("user", "elastic"), ("password", "changeme")],
        ))
        .unwrap();
        assert!(matches!(basic, AuthProvider::Basic { .. }));

        let bearer =
            AuthProvider::from_config(&auth_config("bearer", &[("token", "abc")])).unwrap();
        assert_eq!(bearer, AuthProvider::Bearer { token: "abc".into() });

        let missing = AuthProvider::from_config(&auth_config("bearer", &[]));
        assert!(missing.is_err());

        let unknown = AuthProvider::from_config(&auth_config("aws", &[]));
        assert!(matches!(unknown, Err(ConfigError::UnsupportedAuthentication(_))));
    }

    #[test]
    fn test_apply_sets_authorization_header() {
        let auth = AuthProvider::bearer("abc").unwrap();
        let mut request = BulkRequest::new("/_bulk", b"{}\n".to_vec());
        request.set_header("authorization", "Bearer stale");

        auth.apply(&mut request);

        assert_eq!(request.header("authorization"), Some("Bearer abc"));
        let auth_headers = request
            .headers
            .iter()
            .filter(|(name, _)| name == "authorization")
            .count();
        assert_eq!(auth_headers, 1);
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let auth = AuthProvider::bearer("super-secret").unwrap();
        assert_eq!(format!("{:?}", auth), "Bearer(***)");
    }
}
