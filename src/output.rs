//! Deferred resource values.
//!
//! An [`Output`] is a value that may only exist once some other resource has
//! been created, like the ARN of a secret that a task definition refers to.
//! It wraps a shared future, so it can be cloned into as many resource
//! arguments as needed and is resolved at most once. Nothing in this crate
//! forces an output inline: values are combined with [`Output::apply`] and
//! [`Output::all`] and only awaited by whoever consumes the finished argument.

use std::future::Future;

use futures_util::future::{self, BoxFuture, FutureExt, Shared};

use crate::provider::ProvisionError;

pub struct Output<T> {
    inner: Shared<BoxFuture<'static, Result<T, ProvisionError>>>,
    secret: bool,
}

impl<T> Clone for Output<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            secret: self.secret,
        }
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// An output whose value is already known.
    pub fn known(value: T) -> Self {
        Self::from_future(future::ready(Ok(value)))
    }

    /// A known value that must never be shown. Everything derived from it
    /// stays secret.
    pub fn secret(value: T) -> Self {
        Self {
            secret: true,
            ..Self::known(value)
        }
    }

    pub fn from_future<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T, ProvisionError>> + Send + 'static,
    {
        Self {
            inner: fut.boxed().shared(),
            secret: false,
        }
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }

    /// Waits for the value. Every clone observes the same result.
    pub async fn resolve(&self) -> Result<T, ProvisionError> {
        self.inner.clone().await
    }

    /// Derives a new output from this one without waiting for it.
    pub fn apply<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let inner = self.inner.clone();
        Output {
            secret: self.secret,
            ..Output::from_future(async move { inner.await.map(f) })
        }
    }

    /// This output, resolved only once `other` has resolved. A failure of
    /// `other` is passed on.
    pub fn depends_on<U>(&self, other: &Output<U>) -> Output<T>
    where
        U: Clone + Send + Sync + 'static,
    {
        let inner = self.inner.clone();
        let other = other.inner.clone();
        Output {
            secret: self.secret,
            ..Output::from_future(async move {
                other.await?;
                inner.await
            })
        }
    }

    /// Combines a list of outputs into one output of all values, in order.
    /// The first failure wins.
    pub fn all(outputs: Vec<Output<T>>) -> Output<Vec<T>> {
        let secret = outputs.iter().any(Output::is_secret);
        Output {
            secret,
            ..Output::from_future(future::try_join_all(
                outputs.into_iter().map(|output| output.inner),
            ))
        }
    }

    /// The value, if this output has already been resolved successfully.
    pub fn peek(&self) -> Option<&T> {
        self.inner.peek().and_then(|result| result.as_ref().ok())
    }
}

impl<T> std::fmt::Debug for Output<T>
where
    T: std::fmt::Debug + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.peek() {
            Some(_) if self.secret => f.write_str("Output([secret])"),
            Some(value) => f.debug_tuple("Output").field(value).finish(),
            None => f.write_str("Output(<pending>)"),
        }
    }
}

impl From<String> for Output<String> {
    fn from(value: String) -> Self {
        Output::known(value)
    }
}

impl From<&str> for Output<String> {
    fn from(value: &str) -> Self {
        Output::known(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::provider::ResourceKind;

    #[tokio::test]
    async fn test_known_and_apply() {
        let arn = Output::from("arn:aws:secretsmanager:us-west-2:1:secret:db");
        let upper = arn.apply(|s| s.to_uppercase());
        assert_eq!(
            upper.resolve().await.unwrap(),
            "ARN:AWS:SECRETSMANAGER:US-WEST-2:1:SECRET:DB"
        );
        // The source is still usable after deriving from it
        assert_eq!(
            arn.resolve().await.unwrap(),
            "arn:aws:secretsmanager:us-west-2:1:secret:db"
        );
    }

    #[tokio::test]
    async fn test_clones_share_a_single_evaluation() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let output = Output::from_future(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("value".to_string())
        });
        let other = output.clone();

        assert_eq!(output.resolve().await.unwrap(), "value");
        assert_eq!(other.resolve().await.unwrap(), "value");
        assert_eq!(polls.load(Ordering::SeqCst), 1);
        assert_eq!(other.peek().map(String::as_str), Some("value"));
    }

    #[tokio::test]
    async fn test_deferred_value_is_not_forced() {
        let (tx, rx) = tokio::sync::oneshot::channel::<String>();
        let pending = Output::from_future(async move {
            rx.await.map_err(|_| {
                ProvisionError::operation(ResourceKind::Secret, "db", "sender dropped")
            })
        });
        let derived = pending.apply(|s| format!("{s}!"));
        assert!(derived.peek().is_none());

        tx.send("ready".to_string()).unwrap();
        assert_eq!(derived.resolve().await.unwrap(), "ready!");
    }

    #[tokio::test]
    async fn test_secrecy_follows_derived_values() {
        let password = Output::secret("hunter2".to_string());
        let url = password.apply(|p| format!("postgres://app:{p}@db"));
        assert!(url.is_secret());
        assert!(!Output::from("plain").apply(|s| s.len()).is_secret());

        let combined = Output::all(vec![Output::from("a"), password.clone()]);
        assert!(combined.is_secret());
        assert!(!Output::all(vec![Output::from("a")]).is_secret());

        assert_eq!(password.resolve().await.unwrap(), "hunter2");
        assert_eq!(format!("{password:?}"), "Output([secret])");
    }

    #[tokio::test]
    async fn test_depends_on_waits_and_propagates_failure() {
        let (tx, rx) = tokio::sync::oneshot::channel::<String>();
        let attachment = Output::from_future(async move {
            rx.await.map_err(|_| {
                ProvisionError::operation(ResourceKind::RolePolicyAttachment, "exec", "dropped")
            })
        });
        let arn = Output::from("arn:role/exec").depends_on(&attachment);
        tx.send("exec-attachment".to_string()).unwrap();
        assert_eq!(arn.resolve().await.unwrap(), "arn:role/exec");

        let err = ProvisionError::operation(ResourceKind::RolePolicyAttachment, "exec", "denied");
        let failed = Output::<String>::from_future(future::ready(Err(err.clone())));
        let gated = Output::from("arn:role/exec").depends_on(&failed);
        assert_eq!(gated.resolve().await.unwrap_err(), err);
    }

    #[tokio::test]
    async fn test_all_keeps_order_and_propagates_first_error() {
        let values = Output::all(vec![Output::from("a"), Output::from("b"), Output::from("c")]);
        assert_eq!(values.resolve().await.unwrap(), vec!["a", "b", "c"]);

        let err = ProvisionError::operation(ResourceKind::Secret, "api-key", "access denied");
        let failing = Output::all(vec![
            Output::from("a"),
            Output::from_future(future::ready(Err(err.clone()))),
        ]);
        assert_eq!(failing.resolve().await.unwrap_err(), err);
    }
}
