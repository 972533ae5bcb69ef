//! Deployment entry points.
//!
//! A deployment is one `deployment.toml` (rendered with the vars files next
//! to it) describing a customer's stack. [`Deployment::apply`] walks it in a
//! fixed order: state backend, secrets, instances, then the ECS platform.

use std::collections::HashMap;
use std::path::Path;

use crate::components::{
    ec2::{self, Ec2InstanceArgs},
    ecs::{self, EcsArgs, ServiceConfig},
    secrets::{self, CustomerSecretArgs},
    state::{self, StateBackendArgs},
};
use crate::output::Output;
use crate::provider::{Provider, ProvisionError, ResourceKind, Result, resources::Secret};

pub mod file;
pub mod vars;

use file::{DeploymentFile, EcsEntry, ProviderSettings, ValueEntry};
use vars::{DeploymentConfigError, DeploymentVarsMaterialized, render_template};

#[derive(Debug, Clone)]
pub struct Deployment {
    file: DeploymentFile,
}

/// Secrets created by this deployment, keyed by (service, key).
type DeclaredSecrets = HashMap<(String, String), Secret>;

impl Deployment {
    pub fn load(config: &Path) -> std::result::Result<Self, DeploymentConfigError> {
        log::info!("Loading deployment from {config:?}");
        let vars = DeploymentVarsMaterialized::try_init(config)?;
        let content = std::fs::read_to_string(config)?;
        Self::from_template(config, &content, &vars)
    }

    fn from_template(
        path: &Path,
        content: &str,
        vars: &DeploymentVarsMaterialized,
    ) -> std::result::Result<Self, DeploymentConfigError> {
        let rendered = render_template(content, vars)
            .map_err(|e| DeploymentConfigError::Template((path.to_path_buf(), e)))?;
        let file: DeploymentFile =
            toml::from_str(&rendered).map_err(|e| DeploymentConfigError::Parse {
                path: path.to_path_buf(),
                line: e
                    .span()
                    .and_then(|span| rendered.get(..span.start))
                    .map_or(1, |head| head.matches('\n').count() + 1),
                message: e.message().to_string(),
            })?;
        file.validate()?;
        Ok(Self { file })
    }

    /// `{customer}-{environment}`
    pub fn stack_name(&self) -> String {
        format!("{}-{}", self.file.customer, self.file.environment)
    }

    pub fn provider_settings(&self) -> &ProviderSettings {
        &self.file.provider
    }

    /// Declares every resource of the deployment. Stops at the first error
    /// and returns it unchanged.
    pub async fn apply(&self, provider: &dyn Provider) -> Result<()> {
        let file = &self.file;
        log::info!("Applying deployment {}", self.stack_name());

        if let Some(backend) = &file.state_backend {
            state::new_state_backend(
                provider,
                &StateBackendArgs {
                    customer_name: file.customer.clone(),
                    account_id: file.provider.account_id.clone(),
                    bucket_name: backend.bucket.clone(),
                },
            )
            .await?;
        }

        let mut declared = DeclaredSecrets::new();
        for entry in &file.secrets {
            let secret = secrets::create_secret(
                provider,
                &CustomerSecretArgs {
                    customer_name: file.customer.clone(),
                    environment: file.environment.clone(),
                    service_name: entry.service.clone(),
                    secret_key: entry.key.clone(),
                    secret_value: entry.value.clone().map(Output::secret),
                },
            )
            .await?;
            if let Some(export) = &entry.export {
                provider.export(export, secret.arn.clone()).await?;
            }
            declared.insert((entry.service.clone(), entry.key.clone()), secret);
        }

        for instance in &file.instances {
            let created = ec2::new_instance(
                provider,
                &instance.name,
                &Ec2InstanceArgs {
                    instance_type: instance.instance_type.clone(),
                    ami_id: instance.ami.clone(),
                    subnet_id: instance.subnet_id.clone(),
                    security_group_ids: instance.security_group_ids.clone(),
                    key_name: instance.key_name.clone(),
                    user_data: instance.user_data.clone(),
                },
            )
            .await?;
            if let Some(export) = &instance.export {
                provider.export(export, created.id).await?;
            }
        }

        if let Some(ecs) = &file.ecs {
            let args = self.ecs_args(provider, ecs, &declared).await?;
            let name = ecs.name.as_deref().unwrap_or(&file.customer);
            ecs::new_ecs_cluster(provider, name, &args).await?;
        }

        log::info!("Deployment {} declared", self.stack_name());
        Ok(())
    }

    async fn ecs_args(
        &self,
        provider: &dyn Provider,
        ecs: &EcsEntry,
        declared: &DeclaredSecrets,
    ) -> Result<EcsArgs> {
        let mut services = Vec::with_capacity(ecs.services.len());
        for service in &ecs.services {
            let mut env_vars = std::collections::BTreeMap::new();
            for (key, value) in &service.env {
                let value = self
                    .value_output(provider, &service.name, value, declared)
                    .await?;
                env_vars.insert(key.clone(), value);
            }
            let mut secrets = std::collections::BTreeMap::new();
            for (key, value) in &service.secrets {
                let value = self
                    .value_output(provider, &service.name, value, declared)
                    .await?;
                secrets.insert(key.clone(), value);
            }
            services.push(ServiceConfig {
                service_name: service.name.clone(),
                image: service.image.clone(),
                port: service.port,
                cpu: service.cpu,
                memory: service.memory,
                env_vars,
                secrets,
            });
        }

        Ok(EcsArgs {
            customer_name: self.file.customer.clone(),
            environment: self.file.environment.clone(),
            vpc_id: ecs.vpc_id.clone(),
            subnet_ids: ecs.subnets.clone(),
            services,
        })
    }

    async fn value_output(
        &self,
        provider: &dyn Provider,
        service: &str,
        value: &ValueEntry,
        declared: &DeclaredSecrets,
    ) -> Result<Output<String>> {
        match value {
            ValueEntry::Literal(s) => Ok(Output::known(s.clone())),
            ValueEntry::SecretArn { secret } => declared
                .get(&(service.to_string(), secret.clone()))
                .map(|s| s.arn.clone())
                .ok_or_else(|| ProvisionError::NotFound {
                    kind: ResourceKind::Secret,
                    name: secrets::secret_path(
                        &self.file.customer,
                        &self.file.environment,
                        service,
                        secret,
                    ),
                }),
            ValueEntry::SecretValue {
                secret_value,
                service: owner,
            } => {
                secrets::get_secret(
                    provider,
                    &self.file.customer,
                    &self.file.environment,
                    owner.as_deref().unwrap_or(service),
                    secret_value,
                )
                .await
            }
        }
    }
}
