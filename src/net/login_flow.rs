use crate::error::{LoginParseError, StoreError};
use crate::net::login::{parse_login_payload, LoginCredentials};
use crate::persistence::accounts::AuthOutcome;
use crate::persistence::store::UserStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginRejection {
    Malformed(LoginParseError),
    WrongPassword { login: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginDecision {
    Accepted {
        login: String,
        registered: bool,
    },
    Rejected(LoginRejection),
}

/// Parses the login payload and authenticates it, registering unknown logins.
pub fn handle_login_payload<U: UserStore + ?Sized>(
    payload: &[u8],
    users: &U,
) -> Result<LoginDecision, StoreError> {
    let LoginCredentials { login, password } = match parse_login_payload(payload) {
        Ok(credentials) => credentials,
        Err(err) => return Ok(LoginDecision::Rejected(LoginRejection::Malformed(err))),
    };
    let decision = match users.authenticate_or_register(&login, &password)? {
        AuthOutcome::Authenticated => LoginDecision::Accepted {
            login,
            registered: false,
        },
        AuthOutcome::Registered => LoginDecision::Accepted {
            login,
            registered: true,
        },
        AuthOutcome::WrongPassword => {
            LoginDecision::Rejected(LoginRejection::WrongPassword { login })
        }
    };
    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::login::build_login_payload;
    use crate::persistence::store::MemoryStore;

    #[test]
    fn first_login_registers_then_authenticates() {
        let store = MemoryStore::new();
        let payload = build_login_payload("user", "pass", 40).expect("payload");
        assert_eq!(
            handle_login_payload(&payload, &store).expect("decision"),
            LoginDecision::Accepted {
                login: "user".to_string(),
                registered: true
            }
        );
        assert_eq!(
            handle_login_payload(&payload, &store).expect("decision"),
            LoginDecision::Accepted {
                login: "user".to_string(),
                registered: false
            }
        );
    }

    #[test]
    fn wrong_password_is_rejected() {
        let store = MemoryStore::new();
        let good = build_login_payload("user", "pass", 40).expect("payload");
        let bad = build_login_payload("user", "nope", 40).expect("payload");
        handle_login_payload(&good, &store).expect("decision");
        assert_eq!(
            handle_login_payload(&bad, &store).expect("decision"),
            LoginDecision::Rejected(LoginRejection::WrongPassword {
                login: "user".to_string()
            })
        );
    }

    #[test]
    fn malformed_payload_is_rejected_without_touching_store() {
        let store = MemoryStore::new();
        let decision = handle_login_payload(&[0u8; 12], &store).expect("decision");
        assert!(matches!(
            decision,
            LoginDecision::Rejected(LoginRejection::Malformed(LoginParseError::TooShort(12)))
        ));
    }
}
