//! GraphQL wire types and the catalogue of operations the client issues.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::{GraphqlError, VaultError};

/// Named variables of a GraphQL operation
pub type Variables = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
}

/// A GraphQL document the client knows how to send, plus the root field its
/// result lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    pub kind: OperationKind,
    pub document: &'static str,
    pub root_field: &'static str,
}

impl Operation {
    /// Pull the root field out of `data` and decode it.
    ///
    /// A `null` root (the backend's answer for unauthorized callers) is `Ok(None)`.
    pub fn decode<T: DeserializeOwned>(&self, data: &Value) -> Result<Option<T>, VaultError> {
        match data.get(self.root_field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(T::deserialize(value)?)),
        }
    }

    /// Like [`Operation::decode`] but a missing root is an error.
    pub fn decode_required<T: DeserializeOwned>(&self, data: &Value) -> Result<T, VaultError> {
        self.decode(data)?.ok_or(VaultError::MissingData(self.root_field))
    }

    /// Like [`Operation::decode`] but a missing root is an empty collection.
    pub fn decode_list<T: DeserializeOwned>(&self, data: &Value) -> Result<Vec<T>, VaultError> {
        Ok(self.decode(data)?.unwrap_or_default())
    }
}

pub const MY_FILES: Operation = Operation {
    name: "MyFiles",
    kind: OperationKind::Query,
    document: "query MyFiles($limit: Int, $offset: Int, $nameLike: String, $mimeTypes: [String!], $sizeMin: Int, $sizeMax: Int, $dateFrom: String, $dateTo: String, $tags: [String!]) { myFiles(limit: $limit, offset: $offset, nameLike: $nameLike, mimeTypes: $mimeTypes, sizeMin: $sizeMin, sizeMax: $sizeMax, dateFrom: $dateFrom, dateTo: $dateTo, tags: $tags) { id filename sizeBytes mimeType isPublic createdAt publicToken downloadCount } }",
    root_field: "myFiles",
};

pub const MY_STORAGE_STATS: Operation = Operation {
    name: "MyStorageStats",
    kind: OperationKind::Query,
    document: "query MyStorageStats { myStorageStats { originalBytes dedupedBytes savedBytes savedPercent } }",
    root_field: "myStorageStats",
};

pub const ALL_FILES: Operation = Operation {
    name: "AllFiles",
    kind: OperationKind::Query,
    document: "query AllFiles($limit: Int, $offset: Int) { allFiles(limit: $limit, offset: $offset) { id filename sizeBytes mimeType isPublic createdAt publicToken downloadCount } }",
    root_field: "allFiles",
};

pub const ALL_USERS: Operation = Operation {
    name: "AllUsers",
    kind: OperationKind::Query,
    document: "query AllUsers($limit: Int, $offset: Int) { allUsers(limit: $limit, offset: $offset) { id email name role createdAt } }",
    root_field: "allUsers",
};

pub const CREATE_PUBLIC_LINK: Operation = Operation {
    name: "CreatePublicLink",
    kind: OperationKind::Mutation,
    document: "mutation CreatePublicLink($fileId: String!) { createPublicLink(fileId: $fileId) }",
    root_field: "createPublicLink",
};

pub const REVOKE_PUBLIC_LINK: Operation = Operation {
    name: "RevokePublicLink",
    kind: OperationKind::Mutation,
    document: "mutation RevokePublicLink($fileId: String!) { revokePublicLink(fileId: $fileId) }",
    root_field: "revokePublicLink",
};

pub const TOGGLE_PUBLIC: Operation = Operation {
    name: "TogglePublic",
    kind: OperationKind::Mutation,
    document: "mutation TogglePublic($fileId: String!, $isPublic: Boolean!) { togglePublic(fileId: $fileId, isPublic: $isPublic) }",
    root_field: "togglePublic",
};

pub const DELETE_FILE: Operation = Operation {
    name: "DeleteFile",
    kind: OperationKind::Mutation,
    document: "mutation DeleteFile($fileId: String!) { deleteFile(fileId: $fileId) }",
    root_field: "deleteFile",
};

pub const SET_USER_ROLE: Operation = Operation {
    name: "SetUserRole",
    kind: OperationKind::Mutation,
    document: "mutation SetUserRole($userId: String!, $role: String!) { setUserRole(userId: $userId, role: $role) }",
    root_field: "setUserRole",
};

/// Request body sent to the GraphQL endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub variables: Variables,
}

impl GraphqlRequest {
    #[must_use]
    pub fn new(operation: &Operation, variables: Variables) -> Self {
        Self {
            query: operation.document.to_string(),
            operation_name: Some(operation.name.to_string()),
            variables,
        }
    }
}

/// Response body of the GraphQL endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphqlError>>,
}

impl GraphqlResponse {
    #[must_use]
    pub fn with_data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    #[must_use]
    pub fn with_errors(errors: Vec<GraphqlError>) -> Self {
        Self {
            data: None,
            errors: Some(errors),
        }
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Data if the server reported no errors, otherwise a `Server` error.
    /// Partial data alongside errors is treated as a failure.
    pub fn into_result(self) -> Result<Value, VaultError> {
        match (self.data, self.errors) {
            (_, Some(errors)) if !errors.is_empty() => Err(VaultError::Server(errors)),
            (Some(data), _) if !data.is_null() => Ok(data),
            _ => Err(VaultError::MissingData("data")),
        }
    }
}
