//! Typed endpoint facade for the dashboard backend.
//!
//! | Operation | Method | Path |
//! |---|---|---|
//! | [`get_user_profile`](DashboardApi::get_user_profile) | GET | `/api/user/profile` |
//! | [`update_user_profile`](DashboardApi::update_user_profile) | PUT | `/api/user/profile` |
//! | [`get_protected_data`](DashboardApi::get_protected_data) | GET | `/api/protected` |
//! | [`upload_image_metadata`](DashboardApi::upload_image_metadata) | POST | `/api/upload/metadata` |

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{ApiClient, log_failure};
use crate::error::ApiError;
use crate::request::{ApiMethod, RequestDescriptor};

/// JSON object payload (profile fields, image metadata).
pub type JsonObject = serde_json::Map<String, Value>;

/// A fixed (method, path) pair bound to a named operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub name: &'static str,
    pub method: ApiMethod,
    pub path: &'static str,
}

impl Endpoint {
    pub fn descriptor(&self) -> RequestDescriptor {
        RequestDescriptor::new(self.method, self.path)
    }
}

pub const GET_USER_PROFILE: Endpoint = Endpoint {
    name: "get_user_profile",
    method: ApiMethod::Get,
    path: "/api/user/profile",
};

pub const UPDATE_USER_PROFILE: Endpoint = Endpoint {
    name: "update_user_profile",
    method: ApiMethod::Put,
    path: "/api/user/profile",
};

pub const GET_PROTECTED_DATA: Endpoint = Endpoint {
    name: "get_protected_data",
    method: ApiMethod::Get,
    path: "/api/protected",
};

pub const UPLOAD_IMAGE_METADATA: Endpoint = Endpoint {
    name: "upload_image_metadata",
    method: ApiMethod::Post,
    path: "/api/upload/metadata",
};

/// All bindings, in declaration order.
pub const ENDPOINTS: [Endpoint; 4] = [
    GET_USER_PROFILE,
    UPDATE_USER_PROFILE,
    GET_PROTECTED_DATA,
    UPLOAD_IMAGE_METADATA,
];

/// Public API of the dashboard backend.
///
/// Implemented by [`ApiClient`]; depend on `dyn DashboardApi` to swap in a
/// fake in UI-layer tests.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// Profile of the signed-in user.
    async fn get_user_profile(&self) -> Result<Value, ApiError>;

    /// Update profile fields; returns the updated profile as the server echoes it.
    async fn update_user_profile(&self, profile: JsonObject) -> Result<Value, ApiError>;

    async fn get_protected_data(&self) -> Result<Value, ApiError>;

    /// Store metadata for an uploaded image. Empty metadata is rejected
    /// locally with [`ApiError::Validation`].
    async fn upload_image_metadata(&self, metadata: JsonObject) -> Result<Value, ApiError>;
}

#[async_trait]
impl DashboardApi for ApiClient {
    async fn get_user_profile(&self) -> Result<Value, ApiError> {
        self.call(&GET_USER_PROFILE, None).await
    }

    async fn update_user_profile(&self, profile: JsonObject) -> Result<Value, ApiError> {
        self.call(&UPDATE_USER_PROFILE, Some(Value::Object(profile)))
            .await
    }

    async fn get_protected_data(&self) -> Result<Value, ApiError> {
        self.call(&GET_PROTECTED_DATA, None).await
    }

    async fn upload_image_metadata(&self, metadata: JsonObject) -> Result<Value, ApiError> {
        if metadata.is_empty() {
            let err = ApiError::Validation("image metadata must not be empty".to_owned());
            log_failure(UPLOAD_IMAGE_METADATA.method, UPLOAD_IMAGE_METADATA.path, &err);
            return Err(err);
        }
        self.call(&UPLOAD_IMAGE_METADATA, Some(Value::Object(metadata)))
            .await
    }
}
