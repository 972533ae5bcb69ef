use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::vars::DeploymentConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentFile {
    pub customer: String,
    pub environment: String,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub state_backend: Option<StateBackendEntry>,
    #[serde(default, rename = "secret")]
    pub secrets: Vec<SecretDeclarationEntry>,
    #[serde(default, rename = "instance")]
    pub instances: Vec<InstanceEntry>,
    #[serde(default)]
    pub ecs: Option<EcsEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderSettings {
    pub region: String,
    pub account_id: String,
}

/// Presence of `[state_backend]` turns the backend on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StateBackendEntry {
    /// Overrides `deployment-state-{customer}-{account_id}`.
    #[serde(default)]
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretDeclarationEntry {
    pub service: String,
    pub key: String,
    /// Initial secret string. Usually `${ var }` from a vars file.
    #[serde(default)]
    pub value: Option<String>,
    /// Stack output name for the secret ARN.
    #[serde(default)]
    pub export: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceEntry {
    pub name: String,
    pub instance_type: String,
    pub ami: String,
    pub subnet_id: String,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default)]
    pub user_data: Option<String>,
    /// Stack output name for the instance id.
    #[serde(default)]
    pub export: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EcsEntry {
    /// Prefix for logical resource names. Defaults to the customer.
    #[serde(default)]
    pub name: Option<String>,
    pub vpc_id: String,
    #[serde(default)]
    pub subnets: Vec<String>,
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceEntry {
    pub name: String,
    pub image: String,
    pub port: u16,
    pub cpu: u32,
    pub memory: u32,
    #[serde(default)]
    pub env: BTreeMap<String, ValueEntry>,
    #[serde(default)]
    pub secrets: BTreeMap<String, ValueEntry>,
}

/// A value handed to a container, either written out or taken from a secret.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ValueEntry {
    Literal(String),
    /// ARN of a secret declared in this deployment for the same service.
    SecretArn { secret: String },
    /// Current value of an existing secret, looked up by path.
    SecretValue {
        secret_value: String,
        #[serde(default)]
        service: Option<String>,
    },
}

fn check_identifier(what: &str, value: &str) -> Result<(), DeploymentConfigError> {
    if value.trim().is_empty() {
        return Err(DeploymentConfigError::Invalid(format!("{what} is empty")));
    }
    if value.contains('/') || value.chars().any(char::is_whitespace) {
        return Err(DeploymentConfigError::Invalid(format!(
            "{what} '{value}' may not contain '/' or whitespace"
        )));
    }
    Ok(())
}

impl DeploymentFile {
    pub fn validate(&self) -> Result<(), DeploymentConfigError> {
        check_identifier("customer", &self.customer)?;
        check_identifier("environment", &self.environment)?;
        check_identifier("provider.region", &self.provider.region)?;
        check_identifier("provider.account_id", &self.provider.account_id)?;

        let mut declared = HashSet::new();
        for secret in &self.secrets {
            check_identifier("secret service", &secret.service)?;
            check_identifier("secret key", &secret.key)?;
            if !declared.insert((secret.service.as_str(), secret.key.as_str())) {
                return Err(DeploymentConfigError::Invalid(format!(
                    "secret {}/{} is declared twice",
                    secret.service, secret.key
                )));
            }
        }

        for instance in &self.instances {
            check_identifier("instance name", &instance.name)?;
        }

        let Some(ecs) = &self.ecs else {
            return Ok(());
        };
        if let Some(name) = &ecs.name {
            check_identifier("ecs.name", name)?;
        }
        if !ecs.services.is_empty() && ecs.subnets.is_empty() {
            return Err(DeploymentConfigError::Invalid(
                "ecs services need at least one subnet".to_string(),
            ));
        }

        let mut service_names = HashSet::new();
        for service in &ecs.services {
            check_identifier("service name", &service.name)?;
            if !service_names.insert(service.name.as_str()) {
                return Err(DeploymentConfigError::Invalid(format!(
                    "service {} is declared twice",
                    service.name
                )));
            }
            if service.cpu == 0 || service.memory == 0 || service.port == 0 {
                return Err(DeploymentConfigError::Invalid(format!(
                    "service {} needs a non-zero port, cpu and memory",
                    service.name
                )));
            }
            for value in service.env.values().chain(service.secrets.values()) {
                if let ValueEntry::SecretArn { secret } = value {
                    if !declared.contains(&(service.name.as_str(), secret.as_str())) {
                        return Err(DeploymentConfigError::Invalid(format!(
                            "service {} refers to undeclared secret {}",
                            service.name, secret
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
