//! Arguments and handles for every resource kind the components declare.
//!
//! Arguments take an [`Output`] wherever the value can come from another
//! resource. Handles carry the attributes the provider assigns on creation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::output::Output;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSetting {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ClusterArgs {
    pub name: String,
    pub settings: Vec<ClusterSetting>,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub arn: Output<String>,
}

#[derive(Debug, Clone)]
pub struct RoleArgs {
    /// JSON trust policy document.
    pub assume_role_policy: String,
}

#[derive(Debug, Clone)]
pub struct Role {
    pub name: Output<String>,
    pub arn: Output<String>,
}

#[derive(Debug, Clone)]
pub struct RolePolicyAttachmentArgs {
    pub role: Output<String>,
    pub policy_arn: String,
}

#[derive(Debug, Clone)]
pub struct RolePolicyAttachment {
    pub id: Output<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetworkMode {
    #[serde(rename = "awsvpc")]
    AwsVpc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LaunchType {
    #[serde(rename = "FARGATE")]
    Fargate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    Tcp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: PortProtocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentEntry {
    pub name: String,
    pub value: String,
    /// The value came from a secret and is kept out of anything printed.
    #[serde(skip)]
    pub secret: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretEntry {
    pub name: String,
    pub value_from: String,
}

/// One container of a task definition, in the ECS JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub port_mappings: Vec<PortMapping>,
    pub environment: Vec<EnvironmentEntry>,
    pub secrets: Vec<SecretEntry>,
}

#[derive(Debug, Clone)]
pub struct TaskDefinitionArgs {
    pub family: String,
    pub cpu: String,
    pub memory: String,
    pub network_mode: NetworkMode,
    pub requires_compatibilities: Vec<LaunchType>,
    pub execution_role_arn: Output<String>,
    pub container_definitions: Output<Vec<ContainerDefinition>>,
}

#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub family: String,
    /// Revision ARN, `...:task-definition/{family}:{revision}`.
    pub arn: Output<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkConfiguration {
    pub subnets: Vec<String>,
    pub assign_public_ip: bool,
}

#[derive(Debug, Clone)]
pub struct ServiceArgs {
    pub cluster: Output<String>,
    pub desired_count: u32,
    pub launch_type: LaunchType,
    pub task_definition: Output<String>,
    pub network_configuration: NetworkConfiguration,
}

#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct SecretArgs {
    /// Secrets Manager name. Autonamed from the logical name when absent.
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Secret {
    pub id: Output<String>,
    pub arn: Output<String>,
}

#[derive(Debug, Clone)]
pub struct SecretVersionArgs {
    pub secret_id: Output<String>,
    pub secret_string: Output<String>,
}

#[derive(Debug, Clone)]
pub struct InstanceArgs {
    pub instance_type: String,
    pub ami: String,
    pub subnet_id: String,
    pub vpc_security_group_ids: Vec<String>,
    pub key_name: Option<String>,
    pub user_data: Option<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Instance {
    pub id: Output<String>,
}

#[derive(Debug, Clone)]
pub struct KeyArgs {
    pub description: String,
    pub enable_key_rotation: bool,
}

#[derive(Debug, Clone)]
pub struct Key {
    pub id: Output<String>,
    pub arn: Output<String>,
}

#[derive(Debug, Clone)]
pub struct AliasArgs {
    pub name: String,
    pub target_key_id: Output<String>,
}

#[derive(Debug, Clone)]
pub struct ServerSideEncryption {
    pub kms_master_key_id: Output<String>,
    pub sse_algorithm: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicAccessBlock {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    pub fn all() -> Self {
        Self {
            block_public_acls: true,
            block_public_policy: true,
            ignore_public_acls: true,
            restrict_public_buckets: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BucketArgs {
    pub bucket: String,
    pub versioning: bool,
    pub server_side_encryption: Option<ServerSideEncryption>,
    pub block_public_access: PublicAccessBlock,
}

#[derive(Debug, Clone)]
pub struct Bucket {
    pub id: Output<String>,
}
