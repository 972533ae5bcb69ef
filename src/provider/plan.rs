//! Records a deployment as a plan instead of applying it.
//!
//! [`PlanProvider`] plays the part of the framework's preview step. Every
//! declared resource has its inputs resolved and is given AWS-shaped
//! identifiers, then lands in the plan in declaration order. Secret lookups
//! are answered from the secrets declared earlier in the same run.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::output::Output;
use crate::provider::{
    Provider, ProvisionError, ResourceKind, Result,
    resources::{
        AliasArgs, Bucket, BucketArgs, Cluster, ClusterArgs, ContainerDefinition, Instance,
        InstanceArgs, Key, KeyArgs, Role, RoleArgs, RolePolicyAttachment,
        RolePolicyAttachmentArgs, Secret, SecretArgs, SecretVersionArgs, Service, ServiceArgs,
        TaskDefinition, TaskDefinitionArgs,
    },
};

const REDACTED: &str = "[secret]";

#[derive(Debug, Clone, Serialize)]
pub struct PlannedResource {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub name: String,
    pub id: String,
    pub inputs: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub id: Uuid,
    pub stack: String,
    pub region: String,
    pub account_id: String,
    pub generated_at: String,
    pub resources: Vec<PlannedResource>,
    pub outputs: BTreeMap<String, String>,
}

#[derive(Debug)]
struct StoredSecret {
    id: String,
    name: String,
    secret_string: Option<String>,
}

#[derive(Debug, Default)]
struct PlanState {
    names: HashSet<(ResourceKind, String)>,
    resources: Vec<PlannedResource>,
    outputs: BTreeMap<String, String>,
    revisions: HashMap<String, u32>,
    secrets: Vec<StoredSecret>,
}

impl PlanState {
    fn record(
        &mut self,
        kind: ResourceKind,
        name: &str,
        id: &str,
        inputs: Value,
    ) -> Result<()> {
        if !self.names.insert((kind, name.to_string())) {
            return Err(ProvisionError::Duplicate {
                kind,
                name: name.to_string(),
            });
        }
        log::debug!("Planned {kind} '{name}' ({id})");
        self.resources.push(PlannedResource {
            kind,
            name: name.to_string(),
            id: id.to_string(),
            inputs,
        });
        Ok(())
    }
}

pub struct PlanProvider {
    stack: String,
    region: String,
    account_id: String,
    state: Mutex<PlanState>,
}

/// Blanks every environment value that came from a secret.
fn redact(containers: &mut [ContainerDefinition]) {
    containers
        .iter_mut()
        .flat_map(|c| c.environment.iter_mut())
        .filter(|e| e.secret)
        .for_each(|e| e.value = REDACTED.to_string());
}

/// Random lowercase hex of the given length (at most 12), like the suffixes
/// the framework appends when it autonames a resource.
fn random_suffix(len: usize) -> String {
    let id = Uuid::now_v7().simple().to_string();
    id[id.len() - len.min(12)..].to_string()
}

impl PlanProvider {
    pub fn new(stack: &str, region: &str, account_id: &str) -> Self {
        Self {
            stack: stack.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            state: Mutex::new(PlanState::default()),
        }
    }

    fn arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:aws:{service}:{}:{}:{resource}",
            self.region, self.account_id
        )
    }

    pub fn into_plan(self) -> Plan {
        let state = self.state.into_inner();
        Plan {
            id: Uuid::now_v7(),
            stack: self.stack,
            region: self.region,
            account_id: self.account_id,
            generated_at: Utc::now().to_rfc3339(),
            resources: state.resources,
            outputs: state.outputs,
        }
    }
}

#[async_trait]
impl Provider for PlanProvider {
    async fn create_cluster(&self, name: &str, args: ClusterArgs) -> Result<Cluster> {
        let arn = self.arn("ecs", &format!("cluster/{}", args.name));
        let inputs = json!({ "name": args.name, "settings": args.settings });
        self.state
            .lock()
            .await
            .record(ResourceKind::Cluster, name, &arn, inputs)?;
        Ok(Cluster {
            arn: Output::known(arn),
        })
    }

    async fn create_role(&self, name: &str, args: RoleArgs) -> Result<Role> {
        let role_name = format!("{name}-{}", random_suffix(7));
        let arn = format!("arn:aws:iam::{}:role/{role_name}", self.account_id);
        let policy: Value = serde_json::from_str(&args.assume_role_policy).map_err(|e| {
            ProvisionError::operation(
                ResourceKind::Role,
                name,
                format!("invalid assume role policy: {e}"),
            )
        })?;
        let inputs = json!({ "name": role_name, "assumeRolePolicy": policy });
        self.state
            .lock()
            .await
            .record(ResourceKind::Role, name, &arn, inputs)?;
        Ok(Role {
            name: Output::known(role_name),
            arn: Output::known(arn),
        })
    }

    async fn attach_role_policy(
        &self,
        name: &str,
        args: RolePolicyAttachmentArgs,
    ) -> Result<RolePolicyAttachment> {
        let role = args.role.resolve().await?;
        let id = format!("{role}-{}", random_suffix(12));
        let inputs = json!({ "role": role, "policyArn": args.policy_arn });
        self.state
            .lock()
            .await
            .record(ResourceKind::RolePolicyAttachment, name, &id, inputs)?;
        Ok(RolePolicyAttachment {
            id: Output::known(id),
        })
    }

    async fn create_task_definition(
        &self,
        name: &str,
        args: TaskDefinitionArgs,
    ) -> Result<TaskDefinition> {
        let execution_role_arn = args.execution_role_arn.resolve().await?;
        let mut containers = args.container_definitions.resolve().await?;
        redact(&mut containers);
        let container_definitions = serde_json::to_string(&containers).map_err(|e| {
            ProvisionError::operation(ResourceKind::TaskDefinition, name, e.to_string())
        })?;

        let mut state = self.state.lock().await;
        let revision = *state
            .revisions
            .entry(args.family.clone())
            .and_modify(|r| *r += 1)
            .or_insert(1);
        let arn = self.arn(
            "ecs",
            &format!("task-definition/{}:{revision}", args.family),
        );
        let inputs = json!({
            "family": args.family,
            "cpu": args.cpu,
            "memory": args.memory,
            "networkMode": args.network_mode,
            "requiresCompatibilities": args.requires_compatibilities,
            "executionRoleArn": execution_role_arn,
            "containerDefinitions": container_definitions,
        });
        if let Err(e) = state.record(ResourceKind::TaskDefinition, name, &arn, inputs) {
            // Roll the counter back, nothing was registered
            if let Some(r) = state.revisions.get_mut(&args.family) {
                *r -= 1;
            }
            return Err(e);
        }
        Ok(TaskDefinition {
            family: args.family,
            arn: Output::known(arn),
        })
    }

    async fn create_service(&self, name: &str, args: ServiceArgs) -> Result<Service> {
        let cluster = args.cluster.resolve().await?;
        let task_definition = args.task_definition.resolve().await?;
        let cluster_name = cluster.rsplit('/').next().unwrap_or(&cluster).to_string();
        let arn = self.arn("ecs", &format!("service/{cluster_name}/{name}"));
        let inputs = json!({
            "cluster": cluster,
            "desiredCount": args.desired_count,
            "launchType": args.launch_type,
            "taskDefinition": task_definition,
            "networkConfiguration": {
                "subnets": args.network_configuration.subnets,
                "assignPublicIp": args.network_configuration.assign_public_ip,
            },
        });
        self.state
            .lock()
            .await
            .record(ResourceKind::Service, name, &arn, inputs)?;
        Ok(Service {
            name: name.to_string(),
        })
    }

    async fn create_secret(&self, name: &str, args: SecretArgs) -> Result<Secret> {
        let secret_name = args
            .name
            .unwrap_or_else(|| format!("{name}-{}", random_suffix(7)));
        let arn = self.arn(
            "secretsmanager",
            &format!("secret:{secret_name}-{}", random_suffix(6)),
        );
        let inputs = json!({ "name": secret_name, "description": args.description });

        let mut state = self.state.lock().await;
        state.record(ResourceKind::Secret, name, &arn, inputs)?;
        state.secrets.push(StoredSecret {
            id: arn.clone(),
            name: secret_name,
            secret_string: None,
        });
        Ok(Secret {
            id: Output::known(arn.clone()),
            arn: Output::known(arn),
        })
    }

    async fn create_secret_version(&self, name: &str, args: SecretVersionArgs) -> Result<()> {
        let secret_id = args.secret_id.resolve().await?;
        let secret_string = args.secret_string.resolve().await?;
        let id = format!("{secret_id}|{}", Uuid::now_v7());
        let inputs = json!({ "secretId": secret_id, "secretString": REDACTED });

        let mut state = self.state.lock().await;
        let Some(index) = state.secrets.iter().position(|s| s.id == secret_id) else {
            return Err(ProvisionError::NotFound {
                kind: ResourceKind::Secret,
                name: secret_id,
            });
        };
        state.record(ResourceKind::SecretVersion, name, &id, inputs)?;
        state.secrets[index].secret_string = Some(secret_string);
        Ok(())
    }

    async fn lookup_secret(&self, secret_name: &str) -> Result<String> {
        let state = self.state.lock().await;
        state
            .secrets
            .iter()
            .find(|s| s.name == secret_name)
            .map(|s| s.id.clone())
            .ok_or_else(|| ProvisionError::NotFound {
                kind: ResourceKind::Secret,
                name: secret_name.to_string(),
            })
    }

    async fn lookup_secret_version(&self, secret_id: &str) -> Result<String> {
        let state = self.state.lock().await;
        state
            .secrets
            .iter()
            .find(|s| s.id == secret_id)
            .and_then(|s| s.secret_string.clone())
            .ok_or_else(|| ProvisionError::NotFound {
                kind: ResourceKind::SecretVersion,
                name: secret_id.to_string(),
            })
    }

    async fn create_instance(&self, name: &str, args: InstanceArgs) -> Result<Instance> {
        let id = format!("i-{}", random_suffix(12));
        let inputs = json!({
            "instanceType": args.instance_type,
            "ami": args.ami,
            "subnetId": args.subnet_id,
            "vpcSecurityGroupIds": args.vpc_security_group_ids,
            "keyName": args.key_name,
            "userData": args.user_data,
            "tags": args.tags,
        });
        self.state
            .lock()
            .await
            .record(ResourceKind::Instance, name, &id, inputs)?;
        Ok(Instance {
            id: Output::known(id),
        })
    }

    async fn create_kms_key(&self, name: &str, args: KeyArgs) -> Result<Key> {
        let id = Uuid::now_v7().to_string();
        let arn = self.arn("kms", &format!("key/{id}"));
        let inputs = json!({
            "description": args.description,
            "enableKeyRotation": args.enable_key_rotation,
        });
        self.state
            .lock()
            .await
            .record(ResourceKind::Key, name, &id, inputs)?;
        Ok(Key {
            id: Output::known(id),
            arn: Output::known(arn),
        })
    }

    async fn create_kms_alias(&self, name: &str, args: AliasArgs) -> Result<()> {
        let target_key_id = args.target_key_id.resolve().await?;
        let inputs = json!({ "name": args.name, "targetKeyId": target_key_id });
        self.state
            .lock()
            .await
            .record(ResourceKind::Alias, name, &args.name, inputs)
    }

    async fn create_bucket(&self, name: &str, args: BucketArgs) -> Result<Bucket> {
        let encryption = match args.server_side_encryption {
            Some(sse) => Some(json!({
                "kmsMasterKeyId": sse.kms_master_key_id.resolve().await?,
                "sseAlgorithm": sse.sse_algorithm,
            })),
            None => None,
        };
        let inputs = json!({
            "bucket": args.bucket,
            "versioning": { "enabled": args.versioning },
            "serverSideEncryption": encryption,
            "blockPublicAccess": args.block_public_access,
        });
        self.state
            .lock()
            .await
            .record(ResourceKind::Bucket, name, &args.bucket, inputs)?;
        Ok(Bucket {
            id: Output::known(args.bucket),
        })
    }

    async fn export(&self, name: &str, value: Output<String>) -> Result<()> {
        let value = if value.is_secret() {
            value.resolve().await?;
            REDACTED.to_string()
        } else {
            value.resolve().await?
        };
        log::info!("Export {name} = {value}");
        self.state
            .lock()
            .await
            .outputs
            .insert(name.to_string(), value);
        Ok(())
    }
}
