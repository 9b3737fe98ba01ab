//! Global Tagging API client

use crate::config::env_fallback;
use crate::error::Result;
use crate::session::{AuthScheme, Session};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;

const ENV_TAGS_VAR: &str = "IC_ENV_TAGS";

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    items: Vec<TagItem>,
}

#[derive(Debug, Deserialize)]
struct TagItem {
    name: String,
}

/// Environment tags added to every tagged resource (`IC_ENV_TAGS`, comma separated)
pub fn env_tags() -> Vec<String> {
    env_fallback(&[ENV_TAGS_VAR])
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Desired tags merged with the environment tags, sorted and de-duplicated
pub fn with_env_tags(desired: &[String]) -> Vec<String> {
    let mut tags: BTreeSet<String> = desired.iter().cloned().collect();
    tags.extend(env_tags());
    tags.into_iter().collect()
}

/// Client for user tags attached by CRN
#[derive(Clone)]
pub struct TaggingClient {
    session: Session,
    base: String,
}

impl TaggingClient {
    pub fn new(session: Session) -> Self {
        let base = session.config().endpoints.tagging.clone();
        Self { session, base }
    }

    pub async fn list(&self, crn: &str) -> Result<Vec<String>> {
        let request = self
            .session
            .http()
            .get(format!("{}/v3/tags", self.base))
            .query(&[("attached_to", crn), ("tag_type", "user"), ("limit", "1000")]);
        let list: TagList = self.session.json(request, AuthScheme::Bearer).await?;
        Ok(list.items.into_iter().map(|t| t.name).collect())
    }

    pub async fn attach(&self, crn: &str, tags: &[String]) -> Result<()> {
        self.change("attach", crn, tags).await
    }

    pub async fn detach(&self, crn: &str, tags: &[String]) -> Result<()> {
        self.change("detach", crn, tags).await
    }

    async fn change(&self, action: &str, crn: &str, tags: &[String]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        tracing::debug!("Tags {} {:?} on {}", action, tags, crn);
        let request = self
            .session
            .http()
            .post(format!("{}/v3/tags/{}", self.base, action))
            .query(&[("tag_type", "user")])
            .json(&json!({
                "resources": [{ "resource_id": crn }],
                "tag_names": tags,
            }));
        self.session.empty(request, AuthScheme::Bearer).await
    }

    /// Make the attached user tags equal to `desired`
    pub async fn reconcile(&self, crn: &str, desired: &[String]) -> Result<Vec<String>> {
        let wanted: BTreeSet<String> = desired.iter().cloned().collect();
        let current: BTreeSet<String> = self.list(crn).await?.into_iter().collect();
        let add: Vec<String> = wanted.difference(&current).cloned().collect();
        let remove: Vec<String> = current.difference(&wanted).cloned().collect();

        self.detach(crn, &remove).await?;
        self.attach(crn, &add).await?;
        Ok(wanted.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::test_session;
    use serial_test::serial;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    #[serial]
    fn test_env_tags() {
        temp_env::with_var(ENV_TAGS_VAR, Some(" env:prod, ,team:net "), || {
            assert_eq!(env_tags(), vec!["env:prod", "team:net"]);
        });
        temp_env::with_var_unset(ENV_TAGS_VAR, || {
            assert!(env_tags().is_empty());
        });
    }

    #[test]
    #[serial]
    fn test_with_env_tags() {
        temp_env::with_var(ENV_TAGS_VAR, Some("env:prod"), || {
            let desired = vec!["team:net".to_string(), "env:prod".to_string()];
            assert_eq!(with_env_tags(&desired), vec!["env:prod", "team:net"]);
        });
    }

    #[tokio::test]
    async fn test_reconcile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/tags"))
            .and(query_param("attached_to", "crn:v1:vpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "old"}, {"name": "keep"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v3/tags/detach"))
            .and(body_json(json!({"resources": [{"resource_id": "crn:v1:vpc"}], "tag_names": ["old"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v3/tags/attach"))
            .and(body_json(json!({"resources": [{"resource_id": "crn:v1:vpc"}], "tag_names": ["new"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let tagging = test_session(&server).tagging();
        let desired = vec!["keep".to_string(), "new".to_string()];
        let result = tagging.reconcile("crn:v1:vpc", &desired).await.unwrap();
        assert_eq!(result, vec!["keep", "new"]);
    }
}
