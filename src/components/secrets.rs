use crate::output::Output;
use crate::provider::{
    Provider, Result,
    resources::{Secret, SecretArgs, SecretVersionArgs},
};

#[derive(Debug, Clone)]
pub struct CustomerSecretArgs {
    pub customer_name: String,
    pub environment: String,
    pub service_name: String,
    pub secret_key: String,
    /// Initial value. Without one, only the secret container is created.
    pub secret_value: Option<Output<String>>,
}

/// Secrets Manager name: `/{customer}/{environment}/{service}/{key}`.
pub fn secret_path(
    customer_name: &str,
    environment: &str,
    service_name: &str,
    key: &str,
) -> String {
    format!("/{customer_name}/{environment}/{service_name}/{key}")
}

/// Creates a secret in AWS Secrets Manager and stores its value.
pub async fn create_secret(provider: &dyn Provider, args: &CustomerSecretArgs) -> Result<Secret> {
    let path = secret_path(
        &args.customer_name,
        &args.environment,
        &args.service_name,
        &args.secret_key,
    );
    let name = format!(
        "{}-{}-{}",
        args.customer_name, args.service_name, args.secret_key
    );
    log::info!("Creating secret {path}");

    let secret = provider
        .create_secret(
            &name,
            SecretArgs {
                name: Some(path),
                description: Some(format!(
                    "Secret for {} {}",
                    args.customer_name, args.service_name
                )),
            },
        )
        .await?;

    if let Some(value) = &args.secret_value {
        provider
            .create_secret_version(
                &format!("{name}-value"),
                SecretVersionArgs {
                    secret_id: secret.id.clone(),
                    secret_string: value.clone(),
                },
            )
            .await?;
    }

    Ok(secret)
}

/// Reads the current value of an existing secret. The value is marked
/// secret so it never shows up in a plan or a log line.
pub async fn get_secret(
    provider: &dyn Provider,
    customer_name: &str,
    environment: &str,
    service_name: &str,
    key: &str,
) -> Result<Output<String>> {
    let path = secret_path(customer_name, environment, service_name, key);
    let secret_id = provider.lookup_secret(&path).await?;
    let secret_string = provider.lookup_secret_version(&secret_id).await?;
    Ok(Output::secret(secret_string))
}
