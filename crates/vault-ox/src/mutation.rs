use serde_json::{Value, json};

use crate::{
    error::{GraphqlError, VaultError},
    executor::QueryExecutor,
    graphql::{
        CREATE_PUBLIC_LINK, DELETE_FILE, Operation, OperationKind, REVOKE_PUBLIC_LINK,
        SET_USER_ROLE, TOGGLE_PUBLIC, Variables,
    },
    models::Role,
};

/// Sends write operations. Never patches local state: callers re-read the
/// affected view after a success.
#[derive(Debug, Clone)]
pub struct MutationDispatcher {
    executor: QueryExecutor,
}

impl MutationDispatcher {
    #[must_use]
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    /// Send any mutation from the catalogue.
    pub async fn mutate(&self, operation: &Operation, variables: Variables) -> Result<Value, VaultError> {
        if operation.kind != OperationKind::Mutation {
            return Err(VaultError::validation(format!("{} is not a mutation", operation.name)));
        }
        let result = self.executor.send(operation, variables).await;
        if let Err(ref e) = result {
            log::warn!("{} failed: {e}", operation.name);
        }
        result
    }

    /// Create (or fetch the existing) public link token for a file.
    pub async fn create_public_link(&self, file_id: &str) -> Result<String, VaultError> {
        let data = self
            .mutate(&CREATE_PUBLIC_LINK, args(json!({ "fileId": require_id("fileId", file_id)? })))
            .await?;
        let token: String = CREATE_PUBLIC_LINK.decode_required(&data)?;
        if token.is_empty() {
            return Err(VaultError::MissingData(CREATE_PUBLIC_LINK.root_field));
        }
        Ok(token)
    }

    pub async fn revoke_public_link(&self, file_id: &str) -> Result<(), VaultError> {
        let data = self
            .mutate(&REVOKE_PUBLIC_LINK, args(json!({ "fileId": require_id("fileId", file_id)? })))
            .await?;
        expect_ack(&REVOKE_PUBLIC_LINK, &data)
    }

    pub async fn set_public(&self, file_id: &str, is_public: bool) -> Result<(), VaultError> {
        let data = self
            .mutate(
                &TOGGLE_PUBLIC,
                args(json!({ "fileId": require_id("fileId", file_id)?, "isPublic": is_public })),
            )
            .await?;
        expect_ack(&TOGGLE_PUBLIC, &data)
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), VaultError> {
        let data = self
            .mutate(&DELETE_FILE, args(json!({ "fileId": require_id("fileId", file_id)? })))
            .await?;
        expect_ack(&DELETE_FILE, &data)
    }

    pub async fn set_user_role(&self, user_id: &str, role: &Role) -> Result<(), VaultError> {
        let data = self
            .mutate(
                &SET_USER_ROLE,
                args(json!({ "userId": require_id("userId", user_id)?, "role": role.as_str() })),
            )
            .await?;
        expect_ack(&SET_USER_ROLE, &data)
    }
}

/// Turn a `json!` object literal into variables
fn args(value: Value) -> Variables {
    match value {
        Value::Object(map) => map,
        _ => Variables::new(),
    }
}

/// Ids are required arguments; reject blanks before they hit the wire
fn require_id<'a>(name: &str, id: &'a str) -> Result<&'a str, VaultError> {
    if id.trim().is_empty() {
        Err(VaultError::validation(format!("{name} must not be empty")))
    } else {
        Ok(id)
    }
}

/// Boolean mutations answer `false` when the server refused without an error
fn expect_ack(operation: &Operation, data: &Value) -> Result<(), VaultError> {
    if operation.decode_required::<bool>(data)? {
        Ok(())
    } else {
        Err(VaultError::Server(vec![GraphqlError {
            message: format!("{} was refused", operation.root_field),
            path: None,
        }]))
    }
}
