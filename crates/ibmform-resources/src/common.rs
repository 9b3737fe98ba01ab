//! Helpers shared by the resource implementations

use crate::context::Context;
use ibmform_client::vpc::IdRef;
use ibmform_client::{env_tags, with_env_tags};
use ibmform_provider::flex::flatten_string_set;
use ibmform_provider::{Attribute, ProviderError, ResourceData, Result, Validator};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// States an object may pass through before it disappears
pub(crate) const DELETE_PENDING: &[&str] = &[
    "deleting",
    "delete_pending",
    "pending",
    "available",
    "stable",
    "running",
    "stopping",
    "stopped",
    "active",
    "updating",
    "update_pending",
    "suspended",
];

pub(crate) fn resource_group_attr() -> Attribute {
    Attribute::string()
        .optional()
        .computed()
        .force_new()
        .describe("Resource group ID")
}

pub(crate) fn tags_attr() -> Attribute {
    Attribute::string_set()
        .optional()
        .computed()
        .validate(Validator::StringLenBetween(1, 128))
        .describe("User tags attached to the resource")
}

pub(crate) fn crn_attr() -> Attribute {
    Attribute::string().computed().describe("CRN of the resource")
}

pub(crate) fn status_attr() -> Attribute {
    Attribute::string().computed().describe("Status of the resource")
}

/// Resource group from the resource, falling back to the provider default
pub(crate) fn resource_group(ctx: &Context, d: &ResourceData) -> Option<IdRef> {
    d.get_str("resource_group")
        .map(str::to_string)
        .or_else(|| ctx.default_resource_group())
        .map(IdRef::new)
}

/// DELETE a VPC object, treating an already missing object as deleted
///
/// Returns false when the object was gone before the call.
pub(crate) async fn delete_vpc_object(ctx: &Context, path: &str) -> Result<bool> {
    match ctx.vpc().delete(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => {
            tracing::debug!("{} already deleted", path);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Fetch a VPC object for `read`, clearing the id when it no longer exists
pub(crate) async fn read_or_clear<T>(ctx: &Context, d: &mut ResourceData, path: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    let found = ctx.vpc().find::<T>(path).await?;
    if found.is_none() {
        tracing::warn!("{} not found, removing from state", path);
        d.clear_id();
    }
    Ok(found)
}

/// Poll a VPC object until it reaches one of `target`
///
/// A `failed` state ends the wait with an error.
pub(crate) async fn wait_for_state<T>(
    ctx: &Context,
    path: &str,
    pending: &[&str],
    target: &[&str],
    timeout: Duration,
    state_of: fn(&T) -> &str,
) -> Result<T>
where
    T: DeserializeOwned + Send,
{
    let vpc = ctx.vpc();
    let client = &vpc;
    tracing::info!("Waiting for {} to become {:?}", path, target);

    let object = ctx
        .state_change(pending, target, timeout)
        .wait_for(move || async move {
            let object: Option<T> = client.find(path).await.map_err(ProviderError::from)?;
            let state = object
                .as_ref()
                .map(|o| state_of(o).to_string())
                .unwrap_or_default();
            Ok::<_, ProviderError>((object, state))
        })
        .await?
        .ok_or_else(|| ProviderError::ResourceNotFound(path.to_string()))?;

    if state_of(&object) == "failed" {
        return Err(ProviderError::api(format!("{} entered the failed state", path)));
    }
    Ok(object)
}

/// Poll a VPC object until it returns 404
pub(crate) async fn wait_for_deleted<T>(
    ctx: &Context,
    path: &str,
    timeout: Duration,
    state_of: fn(&T) -> &str,
) -> Result<()>
where
    T: DeserializeOwned + Send,
{
    let vpc = ctx.vpc();
    let client = &vpc;
    tracing::info!("Waiting for {} to be deleted", path);

    ctx.state_change(DELETE_PENDING, &[], timeout)
        .wait_for(move || async move {
            let object: Option<T> = client.find(path).await.map_err(ProviderError::from)?;
            let state = object
                .as_ref()
                .map(|o| state_of(o).to_string())
                .unwrap_or_default();
            Ok::<_, ProviderError>((object, state))
        })
        .await?;
    Ok(())
}

/// Attach the desired tags (plus `IC_ENV_TAGS`) after create or update
pub(crate) async fn apply_tags(ctx: &Context, d: &mut ResourceData, crn: &str) -> Result<()> {
    if !d.is_new_resource() && !d.has_change("tags") {
        return Ok(());
    }
    let desired = with_env_tags(&d.get_string_list("tags"));
    if d.is_new_resource() && desired.is_empty() {
        return Ok(());
    }
    ctx.tagging().reconcile(crn, &desired).await?;
    Ok(())
}

/// Read attached tags, hiding environment tags the configuration does not list
pub(crate) async fn read_tags(ctx: &Context, d: &mut ResourceData, crn: &str) {
    match ctx.tagging().list(crn).await {
        Ok(tags) => {
            let configured = d.get_string_list("tags");
            let hidden = env_tags();
            let visible: Vec<String> = tags
                .into_iter()
                .filter(|t| configured.contains(t) || !hidden.contains(t))
                .collect();
            d.set("tags", flatten_string_set(visible));
        }
        Err(e) => tracing::warn!("Failed to read tags of {}: {}", crn, e),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::context::{Context, Polling};
    use ibmform_client::config::Endpoints;
    use ibmform_client::{ClientConfig, IamAuthenticator, Session};
    use ibmform_provider::RetryConfig;
    use serde_json::{Map, Value, json};
    use std::time::Duration;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn context(server: &MockServer) -> Context {
        let config = ClientConfig::default()
            .with_endpoints(Endpoints::single(&server.uri()))
            .with_resource_group("rg-default")
            .with_retry(RetryConfig::none());
        let session =
            Session::with_authenticator(config, IamAuthenticator::with_token("test-token")).unwrap();
        Context::new(session).with_polling(Polling::every(Duration::from_millis(1)))
    }

    /// Context for tests that never reach the network
    pub(crate) fn offline_context() -> Context {
        let config = ClientConfig::default()
            .with_endpoints(Endpoints::single("http://127.0.0.1:9"))
            .with_resource_group("rg-default");
        let session = Session::with_authenticator(config, IamAuthenticator::with_token("t")).unwrap();
        Context::new(session)
    }

    /// Accept every tagging call, reporting no attached tags
    pub(crate) async fn mount_tags(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v3/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/v3/tags/(attach|detach)$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(server)
            .await;
    }

    pub(crate) fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }
}
