//! Multi-service Fargate platform: cluster, execution role and one task
//! definition plus service per [`ServiceConfig`].

use std::collections::BTreeMap;

use crate::output::Output;
use crate::provider::{
    Provider, ProvisionError, Result,
    resources::{
        Cluster, ClusterArgs, ClusterSetting, ContainerDefinition, EnvironmentEntry, LaunchType,
        NetworkConfiguration, NetworkMode, PortMapping, PortProtocol, Role, RoleArgs,
        RolePolicyAttachmentArgs, SecretEntry, ServiceArgs, TaskDefinition, TaskDefinitionArgs,
    },
};

pub const TASK_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";

const TASK_EXECUTION_TRUST_POLICY: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [{
        "Action": "sts:AssumeRole",
        "Principal": {
            "Service": "ecs-tasks.amazonaws.com"
        },
        "Effect": "Allow",
        "Sid": ""
    }]
}"#;

/// Every service runs this many copies.
const DESIRED_COUNT: u32 = 1;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service_name: String,
    pub image: String,
    pub port: u16,
    pub cpu: u32,
    pub memory: u32,
    pub env_vars: BTreeMap<String, Output<String>>,
    /// Secret name to the ARN the container reads it from.
    pub secrets: BTreeMap<String, Output<String>>,
}

#[derive(Debug, Clone)]
pub struct EcsArgs {
    pub customer_name: String,
    pub environment: String,
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
    pub services: Vec<ServiceConfig>,
}

impl EcsArgs {
    pub fn cluster_name(&self) -> String {
        format!("{}-{}-cluster", self.customer_name, self.environment)
    }

    pub fn family(&self, service: &ServiceConfig) -> String {
        format!(
            "{}-{}-{}",
            self.customer_name, service.service_name, self.environment
        )
    }
}

/// Provisions the cluster, the shared execution role and every service in
/// order. The first failing call stops the run and its error is returned
/// as is; resources created before it are left in place.
pub async fn new_ecs_cluster(
    provider: &dyn Provider,
    name: &str,
    args: &EcsArgs,
) -> Result<Cluster> {
    log::info!(
        "Provisioning ECS cluster {} with {} service(s) in {}",
        args.cluster_name(),
        args.services.len(),
        args.vpc_id
    );

    let cluster = provider
        .create_cluster(
            &format!("{name}-cluster"),
            ClusterArgs {
                name: args.cluster_name(),
                settings: vec![ClusterSetting {
                    name: "containerInsights".to_string(),
                    value: "enabled".to_string(),
                }],
            },
        )
        .await?;

    let execution_role = new_execution_role(provider, name).await?;

    for service in &args.services {
        let task_definition = new_task_definition(provider, name, args, service, &execution_role)
            .await?;

        let created = provider
            .create_service(
                &format!("{name}-{}", service.service_name),
                ServiceArgs {
                    cluster: cluster.arn.clone(),
                    desired_count: DESIRED_COUNT,
                    launch_type: LaunchType::Fargate,
                    task_definition: task_definition.arn.clone(),
                    network_configuration: NetworkConfiguration {
                        subnets: args.subnet_ids.clone(),
                        assign_public_ip: true,
                    },
                },
            )
            .await?;
        log::info!("Created service {}", created.name);
    }

    Ok(cluster)
}

/// The role ECS assumes to pull images and ship logs, with the managed
/// execution policy attached. The returned ARN only resolves once the
/// attachment exists.
pub async fn new_execution_role(provider: &dyn Provider, name: &str) -> Result<Role> {
    let role = provider
        .create_role(
            &format!("{name}-task-execution-role"),
            RoleArgs {
                assume_role_policy: TASK_EXECUTION_TRUST_POLICY.to_string(),
            },
        )
        .await?;

    let attachment = provider
        .attach_role_policy(
            &format!("{name}-task-execution-policy"),
            RolePolicyAttachmentArgs {
                role: role.name.clone(),
                policy_arn: TASK_EXECUTION_POLICY_ARN.to_string(),
            },
        )
        .await?;

    Ok(Role {
        arn: role.arn.depends_on(&attachment.id),
        ..role
    })
}

async fn new_task_definition(
    provider: &dyn Provider,
    name: &str,
    args: &EcsArgs,
    service: &ServiceConfig,
    execution_role: &Role,
) -> Result<TaskDefinition> {
    let task_definition = provider
        .create_task_definition(
            &format!("{name}-{}", service.service_name),
            TaskDefinitionArgs {
                family: args.family(service),
                cpu: service.cpu.to_string(),
                memory: service.memory.to_string(),
                network_mode: NetworkMode::AwsVpc,
                requires_compatibilities: vec![LaunchType::Fargate],
                execution_role_arn: execution_role.arn.clone(),
                container_definitions: container_definition(service).apply(|def| vec![def]),
            },
        )
        .await?;
    log::info!("Registered task definition {}", task_definition.family);
    Ok(task_definition)
}

/// Builds the container definition once every environment value and
/// secret reference is available. Entries follow key order. Environment
/// values read from secret outputs are flagged as secret.
pub fn container_definition(service: &ServiceConfig) -> Output<ContainerDefinition> {
    let (env_names, env_values): (Vec<_>, Vec<_>) = service
        .env_vars
        .iter()
        .map(|(k, v)| ((k.clone(), v.is_secret()), v.clone()))
        .unzip();
    let (secret_names, secret_values): (Vec<_>, Vec<_>) = service
        .secrets
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .unzip();

    let env_values = Output::all(env_values);
    let secret_values = Output::all(secret_values);
    let name = service.service_name.clone();
    let image = service.image.clone();
    let port = service.port;

    Output::from_future(async move {
        let environment = env_names
            .into_iter()
            .zip(env_values.resolve().await?)
            .map(|((name, secret), value)| EnvironmentEntry {
                name,
                value,
                secret,
            })
            .collect();
        let secrets = secret_names
            .into_iter()
            .zip(secret_values.resolve().await?)
            .map(|(name, value_from)| SecretEntry { name, value_from })
            .collect();

        Ok::<_, ProvisionError>(ContainerDefinition {
            name,
            image,
            port_mappings: vec![PortMapping {
                container_port: port,
                protocol: PortProtocol::Tcp,
            }],
            environment,
            secrets,
        })
    })
}
