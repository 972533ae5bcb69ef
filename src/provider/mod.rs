//! Boundary to the infrastructure orchestration framework.
//!
//! Components never talk to AWS directly. They call the typed constructors on
//! [`Provider`] with a logical resource name (the framework's identity key)
//! and the resource arguments, and get back a handle whose attributes are
//! [`Output`]s. Whatever error the provider returns is handed back to the
//! caller unchanged.

use async_trait::async_trait;
use serde::Serialize;

use crate::output::Output;

pub mod plan;
#[cfg(test)]
pub mod recording;
pub mod resources;

use resources::{
    AliasArgs, Bucket, BucketArgs, Cluster, ClusterArgs, Instance, InstanceArgs, Key, KeyArgs,
    Role, RoleArgs, RolePolicyAttachment, RolePolicyAttachmentArgs, Secret, SecretArgs,
    SecretVersionArgs, Service, ServiceArgs, TaskDefinition, TaskDefinitionArgs,
};

pub type Result<T> = std::result::Result<T, ProvisionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Cluster,
    Role,
    RolePolicyAttachment,
    TaskDefinition,
    Service,
    Secret,
    SecretVersion,
    Instance,
    Key,
    Alias,
    Bucket,
}

impl ResourceKind {
    /// The framework type token, e.g. `aws:ecs/cluster:Cluster`.
    pub fn type_token(&self) -> &'static str {
        match self {
            ResourceKind::Cluster => "aws:ecs/cluster:Cluster",
            ResourceKind::Role => "aws:iam/role:Role",
            ResourceKind::RolePolicyAttachment => {
                "aws:iam/rolePolicyAttachment:RolePolicyAttachment"
            }
            ResourceKind::TaskDefinition => "aws:ecs/taskDefinition:TaskDefinition",
            ResourceKind::Service => "aws:ecs/service:Service",
            ResourceKind::Secret => "aws:secretsmanager/secret:Secret",
            ResourceKind::SecretVersion => "aws:secretsmanager/secretVersion:SecretVersion",
            ResourceKind::Instance => "aws:ec2/instance:Instance",
            ResourceKind::Key => "aws:kms/key:Key",
            ResourceKind::Alias => "aws:kms/alias:Alias",
            ResourceKind::Bucket => "aws:s3/bucket:Bucket",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_token())
    }
}

impl Serialize for ResourceKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.type_token())
    }
}

/// A failed resource operation.
///
/// This is `Clone` because it travels through shared [`Output`]s: every
/// consumer of a failed output sees the same error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    #[error("{kind} '{name}' failed: {message}")]
    Operation {
        kind: ResourceKind,
        name: String,
        message: String,
    },
    #[error("duplicate resource {kind} '{name}'")]
    Duplicate { kind: ResourceKind, name: String },
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },
}

impl ProvisionError {
    pub fn operation(kind: ResourceKind, name: &str, message: impl Into<String>) -> Self {
        ProvisionError::Operation {
            kind,
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Typed resource constructors of the orchestration framework.
///
/// `name` is always the logical resource name. Two resources of the same
/// kind may not share one inside a deployment.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn create_cluster(&self, name: &str, args: ClusterArgs) -> Result<Cluster>;

    async fn create_role(&self, name: &str, args: RoleArgs) -> Result<Role>;

    async fn attach_role_policy(
        &self,
        name: &str,
        args: RolePolicyAttachmentArgs,
    ) -> Result<RolePolicyAttachment>;

    async fn create_task_definition(
        &self,
        name: &str,
        args: TaskDefinitionArgs,
    ) -> Result<TaskDefinition>;

    async fn create_service(&self, name: &str, args: ServiceArgs) -> Result<Service>;

    async fn create_secret(&self, name: &str, args: SecretArgs) -> Result<Secret>;

    async fn create_secret_version(&self, name: &str, args: SecretVersionArgs) -> Result<()>;

    /// Looks up an existing secret by its Secrets Manager name and returns
    /// its id.
    async fn lookup_secret(&self, secret_name: &str) -> Result<String>;

    /// The secret string of the current version of an existing secret.
    async fn lookup_secret_version(&self, secret_id: &str) -> Result<String>;

    async fn create_instance(&self, name: &str, args: InstanceArgs) -> Result<Instance>;

    async fn create_kms_key(&self, name: &str, args: KeyArgs) -> Result<Key>;

    async fn create_kms_alias(&self, name: &str, args: AliasArgs) -> Result<()>;

    async fn create_bucket(&self, name: &str, args: BucketArgs) -> Result<Bucket>;

    /// Publishes a stack output for other stacks to consume.
    async fn export(&self, name: &str, value: Output<String>) -> Result<()>;
}
