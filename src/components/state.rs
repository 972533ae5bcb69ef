//! Encrypted bucket that holds deployment state for a customer.

use crate::provider::{
    Provider, Result,
    resources::{AliasArgs, Bucket, BucketArgs, KeyArgs, PublicAccessBlock, ServerSideEncryption},
};

#[derive(Debug, Clone)]
pub struct StateBackendArgs {
    pub customer_name: String,
    pub account_id: String,
    pub bucket_name: Option<String>,
}

/// KMS key with rotation, an alias for it, and a versioned bucket encrypted
/// with the key and closed to the public. The bucket name and key
/// identifiers are exported for other stacks.
pub async fn new_state_backend(
    provider: &dyn Provider,
    args: &StateBackendArgs,
) -> Result<Bucket> {
    let customer = &args.customer_name;
    log::info!("Creating state backend for {customer}");

    let key = provider
        .create_kms_key(
            &format!("{customer}-state-key"),
            KeyArgs {
                description: format!("KMS key for {customer} deployment state"),
                enable_key_rotation: true,
            },
        )
        .await?;

    provider
        .create_kms_alias(
            &format!("{customer}-state-key-alias"),
            AliasArgs {
                name: format!("alias/{customer}-deployment-state"),
                target_key_id: key.id.clone(),
            },
        )
        .await?;

    let bucket = provider
        .create_bucket(
            &format!("{customer}-state-bucket"),
            BucketArgs {
                bucket: args
                    .bucket_name
                    .clone()
                    .unwrap_or_else(|| format!("deployment-state-{customer}-{}", args.account_id)),
                versioning: true,
                server_side_encryption: Some(ServerSideEncryption {
                    kms_master_key_id: key.id.clone(),
                    sse_algorithm: "aws:kms".to_string(),
                }),
                block_public_access: PublicAccessBlock::all(),
            },
        )
        .await?;

    provider
        .export("stateBucketName", bucket.id.clone())
        .await?;
    provider.export("stateKmsKeyId", key.id.clone()).await?;
    provider.export("stateKmsKeyArn", key.arn.clone()).await?;

    Ok(bucket)
}
