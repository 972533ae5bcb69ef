use std::collections::BTreeMap;

use crate::provider::{
    Provider, Result,
    resources::{Instance, InstanceArgs},
};

/// Input parameters for an EC2 instance.
#[derive(Debug, Clone, Default)]
pub struct Ec2InstanceArgs {
    /// e.g. `t3.micro`
    pub instance_type: String,
    pub ami_id: String,
    pub subnet_id: String,
    pub security_group_ids: Vec<String>,
    /// Key pair for SSH access.
    pub key_name: Option<String>,
    pub user_data: Option<String>,
}

/// Creates an EC2 instance tagged with its own name.
pub async fn new_instance(
    provider: &dyn Provider,
    name: &str,
    args: &Ec2InstanceArgs,
) -> Result<Instance> {
    log::info!("Creating instance {name} ({})", args.instance_type);
    provider
        .create_instance(
            name,
            InstanceArgs {
                instance_type: args.instance_type.clone(),
                ami: args.ami_id.clone(),
                subnet_id: args.subnet_id.clone(),
                vpc_security_group_ids: args.security_group_ids.clone(),
                key_name: args.key_name.clone(),
                user_data: args.user_data.clone(),
                tags: BTreeMap::from([("Name".to_string(), name.to_string())]),
            },
        )
        .await
}
