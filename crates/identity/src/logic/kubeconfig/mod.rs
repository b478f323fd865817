//! Kubeconfig document model.
//!
//! In memory the document is keyed by name like client-go's `api.Config`;
//! on the wire it uses kubectl's named-list form.

pub mod template;

use std::collections::BTreeMap;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use shared::error::CommonError;

const API_VERSION: &str = "v1";
const KIND: &str = "Config";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "KubeConfigWire", into = "KubeConfigWire")]
pub struct KubeConfig {
    pub clusters: BTreeMap<String, Cluster>,
    pub contexts: BTreeMap<String, Context>,
    pub auth_infos: BTreeMap<String, AuthInfo>,
    pub current_context: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    #[serde(default)]
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_server_name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub insecure_skip_tls_verify: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes"
    )]
    pub certificate_authority_data: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    /// Keys not modelled above, such as `disable-compression` or
    /// `extensions`, carried through unchanged.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Cluster {
    /// Whether the cluster names a CA, inline or by file.
    pub fn has_certificate_authority(&self) -> bool {
        self.certificate_authority_data
            .as_ref()
            .is_some_and(|data| !data.is_empty())
            || self
                .certificate_authority
                .as_ref()
                .is_some_and(|path| !path.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub cluster: String,
    #[serde(default, rename = "user")]
    pub auth_info: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_provider: Option<AuthProviderConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthProviderConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
}

impl KubeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Loads a (possibly partial) kubeconfig from disk.
    pub fn load(path: &Path) -> Result<Self, CommonError> {
        let yaml = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&yaml).map_err(|e| CommonError::InvalidRequest {
            msg: format!("cannot parse kubeconfig {}", path.display()),
            source: Some(e.into()),
        })?;
        Ok(config)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct KubeConfigWire {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    api_version: String,
    #[serde(default = "default_kind")]
    kind: String,
    #[serde(default)]
    preferences: BTreeMap<String, serde_yaml::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    clusters: Vec<NamedCluster>,
    #[serde(default, deserialize_with = "null_as_default")]
    contexts: Vec<NamedContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_context: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    users: Vec<NamedAuthInfo>,
}

#[derive(Serialize, Deserialize)]
struct NamedCluster {
    name: String,
    cluster: Cluster,
}

#[derive(Serialize, Deserialize)]
struct NamedContext {
    name: String,
    context: Context,
}

#[derive(Serialize, Deserialize)]
struct NamedAuthInfo {
    name: String,
    #[serde(default)]
    user: AuthInfo,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<KubeConfigWire> for KubeConfig {
    fn from(wire: KubeConfigWire) -> Self {
        KubeConfig {
            clusters: wire
                .clusters
                .into_iter()
                .map(|named| (named.name, named.cluster))
                .collect(),
            contexts: wire
                .contexts
                .into_iter()
                .map(|named| (named.name, named.context))
                .collect(),
            auth_infos: wire
                .users
                .into_iter()
                .map(|named| (named.name, named.user))
                .collect(),
            current_context: wire.current_context.filter(|name| !name.is_empty()),
        }
    }
}

impl From<KubeConfig> for KubeConfigWire {
    fn from(config: KubeConfig) -> Self {
        KubeConfigWire {
            api_version: default_api_version(),
            kind: default_kind(),
            preferences: BTreeMap::new(),
            clusters: config
                .clusters
                .into_iter()
                .map(|(name, cluster)| NamedCluster { name, cluster })
                .collect(),
            contexts: config
                .contexts
                .into_iter()
                .map(|(name, context)| NamedContext { name, context })
                .collect(),
            current_context: config.current_context,
            users: config
                .auth_infos
                .into_iter()
                .map(|(name, user)| NamedAuthInfo { name, user })
                .collect(),
        }
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(encoded) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        STANDARD
            .decode(encoded.trim())
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
