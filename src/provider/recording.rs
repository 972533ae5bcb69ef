//! Call-recording provider for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::output::Output;
use crate::provider::{
    Provider, ProvisionError, ResourceKind, Result,
    resources::{
        AliasArgs, Bucket, BucketArgs, Cluster, ClusterArgs, ContainerDefinition, Instance,
        InstanceArgs, Key, KeyArgs, LaunchType, NetworkConfiguration, NetworkMode, Role,
        RoleArgs, RolePolicyAttachment, RolePolicyAttachmentArgs, Secret, SecretArgs,
        SecretVersionArgs, Service, ServiceArgs, TaskDefinition, TaskDefinitionArgs,
    },
};

/// One provider call with its inputs resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateCluster {
        name: String,
        cluster_name: String,
        settings: Vec<(String, String)>,
    },
    CreateRole {
        name: String,
        assume_role_policy: String,
    },
    AttachRolePolicy {
        name: String,
        role: String,
        policy_arn: String,
    },
    CreateTaskDefinition {
        name: String,
        family: String,
        cpu: String,
        memory: String,
        network_mode: NetworkMode,
        requires_compatibilities: Vec<LaunchType>,
        execution_role_arn: String,
        containers: Vec<ContainerDefinition>,
    },
    CreateService {
        name: String,
        cluster: String,
        desired_count: u32,
        launch_type: LaunchType,
        task_definition: String,
        network_configuration: NetworkConfiguration,
    },
    CreateSecret {
        name: String,
        secret_name: Option<String>,
        description: Option<String>,
    },
    CreateSecretVersion {
        name: String,
        secret_id: String,
        secret_string: String,
    },
    LookupSecret {
        secret_name: String,
    },
    LookupSecretVersion {
        secret_id: String,
    },
    CreateInstance {
        name: String,
        instance_type: String,
        ami: String,
        subnet_id: String,
        tags: Vec<(String, String)>,
    },
    CreateKey {
        name: String,
        description: String,
        enable_key_rotation: bool,
    },
    CreateAlias {
        name: String,
        alias: String,
        target_key_id: String,
    },
    CreateBucket {
        name: String,
        bucket: String,
        versioning: bool,
        kms_master_key_id: Option<String>,
        sse_algorithm: Option<String>,
        block_all_public_access: bool,
    },
    Export {
        name: String,
        value: String,
    },
}

impl Call {
    /// Short label used to compare call sequences.
    pub fn label(&self) -> &'static str {
        match self {
            Call::CreateCluster { .. } => "create_cluster",
            Call::CreateRole { .. } => "create_role",
            Call::AttachRolePolicy { .. } => "attach_role_policy",
            Call::CreateTaskDefinition { .. } => "create_task_definition",
            Call::CreateService { .. } => "create_service",
            Call::CreateSecret { .. } => "create_secret",
            Call::CreateSecretVersion { .. } => "create_secret_version",
            Call::LookupSecret { .. } => "lookup_secret",
            Call::LookupSecretVersion { .. } => "lookup_secret_version",
            Call::CreateInstance { .. } => "create_instance",
            Call::CreateKey { .. } => "create_kms_key",
            Call::CreateAlias { .. } => "create_kms_alias",
            Call::CreateBucket { .. } => "create_bucket",
            Call::Export { .. } => "export",
        }
    }
}

/// Records every call and hands out predictable identifiers.
///
/// A failure can be injected for the n-th call (1-based) with a given label.
/// The failing call is recorded like any other.
#[derive(Default)]
pub struct RecordingProvider {
    calls: Mutex<Vec<Call>>,
    fail_on: Option<(&'static str, usize)>,
    secret_values: Mutex<HashMap<String, String>>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(label: &'static str, nth: usize) -> Self {
        Self {
            fail_on: Some((label, nth)),
            ..Self::default()
        }
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn labels(&self) -> Vec<&'static str> {
        self.calls.lock().await.iter().map(Call::label).collect()
    }

    async fn push(&self, kind: ResourceKind, name: &str, call: Call) -> Result<()> {
        let mut calls = self.calls.lock().await;
        let label = call.label();
        calls.push(call);
        if let Some((fail_label, nth)) = self.fail_on {
            let seen = calls.iter().filter(|c| c.label() == label).count();
            if fail_label == label && seen == nth {
                return Err(ProvisionError::operation(kind, name, "injected failure"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    async fn create_cluster(&self, name: &str, args: ClusterArgs) -> Result<Cluster> {
        let call = Call::CreateCluster {
            name: name.to_string(),
            cluster_name: args.name.clone(),
            settings: args
                .settings
                .iter()
                .map(|s| (s.name.clone(), s.value.clone()))
                .collect(),
        };
        self.push(ResourceKind::Cluster, name, call).await?;
        Ok(Cluster {
            arn: Output::known(format!("arn:cluster/{}", args.name)),
        })
    }

    async fn create_role(&self, name: &str, args: RoleArgs) -> Result<Role> {
        let call = Call::CreateRole {
            name: name.to_string(),
            assume_role_policy: args.assume_role_policy,
        };
        self.push(ResourceKind::Role, name, call).await?;
        Ok(Role {
            name: Output::known(format!("{name}-role")),
            arn: Output::known(format!("arn:role/{name}-role")),
        })
    }

    async fn attach_role_policy(
        &self,
        name: &str,
        args: RolePolicyAttachmentArgs,
    ) -> Result<RolePolicyAttachment> {
        let call = Call::AttachRolePolicy {
            name: name.to_string(),
            role: args.role.resolve().await?,
            policy_arn: args.policy_arn,
        };
        self.push(ResourceKind::RolePolicyAttachment, name, call)
            .await?;
        Ok(RolePolicyAttachment {
            id: Output::known(format!("{name}-attachment")),
        })
    }

    async fn create_task_definition(
        &self,
        name: &str,
        args: TaskDefinitionArgs,
    ) -> Result<TaskDefinition> {
        let call = Call::CreateTaskDefinition {
            name: name.to_string(),
            family: args.family.clone(),
            cpu: args.cpu,
            memory: args.memory,
            network_mode: args.network_mode,
            requires_compatibilities: args.requires_compatibilities,
            execution_role_arn: args.execution_role_arn.resolve().await?,
            containers: args.container_definitions.resolve().await?,
        };
        self.push(ResourceKind::TaskDefinition, name, call).await?;
        Ok(TaskDefinition {
            arn: Output::known(format!("arn:task-definition/{}:1", args.family)),
            family: args.family,
        })
    }

    async fn create_service(&self, name: &str, args: ServiceArgs) -> Result<Service> {
        let call = Call::CreateService {
            name: name.to_string(),
            cluster: args.cluster.resolve().await?,
            desired_count: args.desired_count,
            launch_type: args.launch_type,
            task_definition: args.task_definition.resolve().await?,
            network_configuration: args.network_configuration,
        };
        self.push(ResourceKind::Service, name, call).await?;
        Ok(Service {
            name: name.to_string(),
        })
    }

    async fn create_secret(&self, name: &str, args: SecretArgs) -> Result<Secret> {
        let secret_name = args.name.clone().unwrap_or_else(|| name.to_string());
        let call = Call::CreateSecret {
            name: name.to_string(),
            secret_name: args.name,
            description: args.description,
        };
        self.push(ResourceKind::Secret, name, call).await?;
        let arn = format!("arn:secret:{secret_name}");
        Ok(Secret {
            id: Output::known(arn.clone()),
            arn: Output::known(arn),
        })
    }

    async fn create_secret_version(&self, name: &str, args: SecretVersionArgs) -> Result<()> {
        let secret_id = args.secret_id.resolve().await?;
        let secret_string = args.secret_string.resolve().await?;
        let call = Call::CreateSecretVersion {
            name: name.to_string(),
            secret_id: secret_id.clone(),
            secret_string: secret_string.clone(),
        };
        self.push(ResourceKind::SecretVersion, name, call).await?;
        self.secret_values
            .lock()
            .await
            .insert(secret_id, secret_string);
        Ok(())
    }

    async fn lookup_secret(&self, secret_name: &str) -> Result<String> {
        let call = Call::LookupSecret {
            secret_name: secret_name.to_string(),
        };
        self.push(ResourceKind::Secret, secret_name, call).await?;
        Ok(format!("arn:secret:{secret_name}"))
    }

    async fn lookup_secret_version(&self, secret_id: &str) -> Result<String> {
        let call = Call::LookupSecretVersion {
            secret_id: secret_id.to_string(),
        };
        self.push(ResourceKind::SecretVersion, secret_id, call)
            .await?;
        Ok(self
            .secret_values
            .lock()
            .await
            .get(secret_id)
            .cloned()
            .unwrap_or_else(|| format!("value-of:{secret_id}")))
    }

    async fn create_instance(&self, name: &str, args: InstanceArgs) -> Result<Instance> {
        let call = Call::CreateInstance {
            name: name.to_string(),
            instance_type: args.instance_type,
            ami: args.ami,
            subnet_id: args.subnet_id,
            tags: args.tags.into_iter().collect(),
        };
        self.push(ResourceKind::Instance, name, call).await?;
        Ok(Instance {
            id: Output::known(format!("i-{name}")),
        })
    }

    async fn create_kms_key(&self, name: &str, args: KeyArgs) -> Result<Key> {
        let call = Call::CreateKey {
            name: name.to_string(),
            description: args.description,
            enable_key_rotation: args.enable_key_rotation,
        };
        self.push(ResourceKind::Key, name, call).await?;
        Ok(Key {
            id: Output::known(format!("{name}-id")),
            arn: Output::known(format!("arn:key/{name}-id")),
        })
    }

    async fn create_kms_alias(&self, name: &str, args: AliasArgs) -> Result<()> {
        let call = Call::CreateAlias {
            name: name.to_string(),
            alias: args.name,
            target_key_id: args.target_key_id.resolve().await?,
        };
        self.push(ResourceKind::Alias, name, call).await
    }

    async fn create_bucket(&self, name: &str, args: BucketArgs) -> Result<Bucket> {
        let (kms_master_key_id, sse_algorithm) = match args.server_side_encryption {
            Some(sse) => (
                Some(sse.kms_master_key_id.resolve().await?),
                Some(sse.sse_algorithm),
            ),
            None => (None, None),
        };
        let block = &args.block_public_access;
        let call = Call::CreateBucket {
            name: name.to_string(),
            bucket: args.bucket.clone(),
            versioning: args.versioning,
            kms_master_key_id,
            sse_algorithm,
            block_all_public_access: block.block_public_acls
                && block.block_public_policy
                && block.ignore_public_acls
                && block.restrict_public_buckets,
        };
        self.push(ResourceKind::Bucket, name, call).await?;
        Ok(Bucket {
            id: Output::known(args.bucket),
        })
    }

    async fn export(&self, name: &str, value: Output<String>) -> Result<()> {
        let call = Call::Export {
            name: name.to_string(),
            value: value.resolve().await?,
        };
        self.calls.lock().await.push(call);
        Ok(())
    }
}
