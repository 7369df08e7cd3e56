//! Provider tokens for connections and repositories.
//!
//! Tokens are stable strings other modules use to resolve providers, so their
//! format is fixed:
//!
//! | input                        | token                                  |
//! |------------------------------|----------------------------------------|
//! | `None`, `""`, `"default"`    | `ES_CLIENT`                            |
//! | `" analytics "`              | `ES_CLIENT_ANALYTICS`                  |
//! | `User` on `"analytics"`      | `ES_REPOSITORY_USER_ES_CLIENT_ANALYTICS` |

use crate::document::Entity;

/// Token of the default connection.
pub const DEFAULT_CLIENT_TOKEN: &str = "ES_CLIENT";

/// Token of the connection registry itself.
pub const CONNECTION_REGISTRY_TOKEN: &str = "ES_CONNECTION_REGISTRY";

/// Token of the connection named `name`.
pub fn client_token(name: Option<&str>) -> String {
    let name = name.unwrap_or_default().trim().to_uppercase();
    if name.is_empty() || name == "DEFAULT" {
        DEFAULT_CLIENT_TOKEN.to_string()
    } else {
        format!("{DEFAULT_CLIENT_TOKEN}_{name}")
    }
}

/// Token of the repository of `E` on the connection named `connection`.
pub fn repository_token<E: Entity>(connection: Option<&str>) -> String {
    repository_token_for(E::entity_name(), connection)
}

/// Token of the repository of the entity named `entity` on `connection`.
pub fn repository_token_for(entity: &str, connection: Option<&str>) -> String {
    format!(
        "ES_REPOSITORY_{}_{}",
        entity.to_uppercase(),
        client_token(connection)
    )
}
