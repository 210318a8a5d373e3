//! Tenant credentials stored in a Secret.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use tracing::debug;

use super::CredentialBroker;
use crate::client::ProviderCredentials;
use crate::controller::error::{Error, Result};

const ACCESS_KEY_ID: &str = "aws_access_key_id";
const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
const SESSION_TOKEN: &str = "aws_session_token";

/// Decode credentials from a Secret's data.
pub fn credentials_from_secret(data: &BTreeMap<String, ByteString>) -> Result<ProviderCredentials> {
    let field = |key: &str| -> Result<Option<String>> {
        match data.get(key) {
            Some(ByteString(bytes)) => String::from_utf8(bytes.clone())
                .map(|value| Some(value.trim().to_string()).filter(|v| !v.is_empty()))
                .map_err(|_| Error::Credentials(format!("secret key {} is not valid UTF-8", key))),
            None => Ok(None),
        }
    };
    let required = |key: &str| -> Result<String> {
        field(key)?.ok_or_else(|| Error::Credentials(format!("secret is missing key {}", key)))
    };

    Ok(ProviderCredentials {
        access_key_id: required(ACCESS_KEY_ID)?,
        secret_access_key: required(SECRET_ACCESS_KEY)?,
        session_token: field(SESSION_TOKEN)?,
    })
}

/// A missing Secret means the tenant has no credentials; any other failure
/// is the API's.
fn secret_read_error(err: kube::Error, namespace: &str, name: &str) -> Error {
    match err {
        kube::Error::Api(e) if e.code == 404 => {
            Error::Credentials(format!("secret {}/{} not found", namespace, name))
        }
        other => Error::Kube(other),
    }
}

/// Issues credentials by reading a named Secret in the tenant namespace.
#[derive(Clone)]
pub struct SecretCredentialBroker {
    client: Client,
    secret_name: String,
}

impl SecretCredentialBroker {
    pub fn new(client: Client, secret_name: impl Into<String>) -> Self {
        Self {
            client,
            secret_name: secret_name.into(),
        }
    }
}

#[async_trait]
impl CredentialBroker for SecretCredentialBroker {
    async fn issue_credentials(&self, tenant: &str) -> Result<ProviderCredentials> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), tenant);
        let secret = api
            .get(&self.secret_name)
            .await
            .map_err(|e| secret_read_error(e, tenant, &self.secret_name))?;

        debug!(namespace = %tenant, secret = %self.secret_name, "Loaded tenant credentials");
        credentials_from_secret(&secret.data.unwrap_or_default())
    }
}
