use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::types::{PrNode, PrPage, RepoId};
use super::{DiffSource, FetchError, PagedQuerySource};

const USER_AGENT: &str = "pr-dataset";

const PULL_REQUESTS_QUERY: &str = r#"
query($owner:String!,$name:String!,$first:Int!,$after:String) {
  repository(owner:$owner, name:$name) {
    pullRequests(first:$first, after:$after,
                 orderBy:{field:UPDATED_AT,direction:DESC}) {
      pageInfo { endCursor, hasNextPage }
      nodes {
        number
        title
        body
      }
    }
  }
}
"#;

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct GraphQlData {
    repository: Option<RepositoryNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    pull_requests: PullRequestConnection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestConnection {
    page_info: PageInfo,
    nodes: Vec<Option<PullRequestNode>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    has_next_page: bool,
}

#[derive(Deserialize)]
struct PullRequestNode {
    number: u64,
    title: Option<String>,
    body: Option<String>,
}

/// GitHub API client serving both the GraphQL pull request listing and
/// the REST diff endpoint.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    /// `api_url` is the REST base, e.g. `https://api.github.com`.
    pub fn new(api_url: &str, token: String) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

/// Turn a non-success response into `FetchError::Status`, keeping the body
/// for diagnostics.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FetchError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl PagedQuerySource for GitHubClient {
    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn fetch_page(
        &self,
        repo: &RepoId,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<PrPage, FetchError> {
        let variables = json!({
            "owner": repo.owner,
            "name": repo.name,
            "first": page_size,
            "after": cursor,
        });

        debug!("requesting pull request page");
        let response = self
            .http
            .post(format!("{}/graphql", self.api_url))
            .bearer_auth(&self.token)
            .json(&json!({ "query": PULL_REQUESTS_QUERY, "variables": variables }))
            .send()
            .await?;
        let payload = check_status(response).await?.json::<GraphQlResponse>().await?;

        if let Some(errors) = payload.errors.filter(|errors| !errors.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(FetchError::GraphQl(messages.join("; ")));
        }

        let connection = payload
            .data
            .and_then(|data| data.repository)
            .ok_or_else(|| FetchError::RepositoryNotFound(repo.to_string()))?
            .pull_requests;

        let nodes: Vec<PrNode> = connection
            .nodes
            .into_iter()
            .flatten()
            .map(|node| PrNode {
                number: node.number,
                title: node.title.unwrap_or_default(),
                body: node.body.unwrap_or_default(),
            })
            .collect();
        debug!(nodes = nodes.len(), has_next_page = connection.page_info.has_next_page, "received page");

        Ok(PrPage {
            nodes,
            end_cursor: connection.page_info.end_cursor,
            has_next_page: connection.page_info.has_next_page,
        })
    }
}

#[async_trait]
impl DiffSource for GitHubClient {
    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn fetch_diff(&self, repo: &RepoId, number: u64) -> Result<String, FetchError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.api_url, repo.owner, repo.name, number
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.diff")
            .send()
            .await?;
        let diff = check_status(response).await?.text().await?;
        debug!(diff_bytes = diff.len(), "received diff");
        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo() -> RepoId {
        RepoId::parse("org/repo").unwrap()
    }

    fn page_body(numbers: &[u64], cursor: Option<&str>, has_next: bool) -> serde_json::Value {
        let nodes: Vec<_> = numbers
            .iter()
            .map(|n| json!({ "number": n, "title": format!("PR {}", n), "body": null }))
            .collect();
        json!({
            "data": {
                "repository": {
                    "pullRequests": {
                        "pageInfo": { "endCursor": cursor, "hasNextPage": has_next },
                        "nodes": nodes
                    }
                }
            }
        })
    }

    #[tokio::test]
    async fn test_fetch_page_sends_variables_and_parses_nodes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "variables": { "owner": "org", "name": "repo", "first": 2, "after": "abc" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&[7, 8], Some("def"), true)))
            .expect(1)
            .mount(&server)
            .await;

        let client = GitHubClient::new(&server.uri(), "test-token".to_string()).unwrap();
        let page = client.fetch_page(&repo(), 2, Some("abc")).await.unwrap();

        assert_eq!(page.nodes.len(), 2);
        assert_eq!(page.nodes[0].number, 7);
        assert_eq!(page.nodes[0].title, "PR 7");
        assert_eq!(page.nodes[0].body, "");
        assert_eq!(page.end_cursor.as_deref(), Some("def"));
        assert!(page.has_next_page);
    }

    #[tokio::test]
    async fn test_fetch_page_error_envelope_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{ "message": "Could not resolve to a Repository" }]
            })))
            .mount(&server)
            .await;

        let client = GitHubClient::new(&server.uri(), "t".to_string()).unwrap();
        let err = client.fetch_page(&repo(), 10, None).await.unwrap_err();
        match err {
            FetchError::GraphQl(message) => assert!(message.contains("Could not resolve")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_page_http_status_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;

        let client = GitHubClient::new(&server.uri(), "t".to_string()).unwrap();
        let err = client.fetch_page(&repo(), 10, None).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_fetch_page_missing_repository() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "repository": null } })))
            .mount(&server)
            .await;

        let client = GitHubClient::new(&server.uri(), "t".to_string()).unwrap();
        let err = client.fetch_page(&repo(), 10, None).await.unwrap_err();
        assert!(matches!(err, FetchError::RepositoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_diff_requests_diff_media_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/org/repo/pulls/42"))
            .and(header("accept", "application/vnd.github.diff"))
            .respond_with(ResponseTemplate::new(200).set_body_string("diff --git a/x b/x\n"))
            .mount(&server)
            .await;

        let client = GitHubClient::new(&server.uri(), "t".to_string()).unwrap();
        let diff = client.fetch_diff(&repo(), 42).await.unwrap();
        assert!(diff.starts_with("diff --git"));
    }

    #[tokio::test]
    async fn test_fetch_diff_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/org/repo/pulls/1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = GitHubClient::new(&server.uri(), "t".to_string()).unwrap();
        assert!(client.fetch_diff(&repo(), 1).await.is_err());
    }
}
