//! GitHub backend: issues in a repository, via the GraphQL API.
//!
//! Records are issues; a record id is the issue's GraphQL node id. Listing
//! reads `issues { totalCount }` first and then pages through that many
//! node ids, so a repository that changes between the reads yields a list
//! of a different length. That is accepted, not retried.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use postmirror_core::{Credential, RecordId, Scope};

use crate::directory::RemoteDirectory;
use crate::error::{ApiError, RemoteError};

/// GitHub refuses `first` values above this.
pub const PAGE_SIZE: usize = 100;

const USER_AGENT: &str = concat!("postmirror/", env!("CARGO_PKG_VERSION"));

const VIEWER_QUERY: &str = "query Viewer { viewer { login } }";

const REPOSITORY_ID_QUERY: &str = "query RepositoryId($owner: String!, $name: String!) { \
     repository(owner: $owner, name: $name) { id } }";

const ISSUE_COUNT_QUERY: &str = "query IssueCount($owner: String!, $name: String!) { \
     repository(owner: $owner, name: $name) { issues { totalCount } } }";

const ISSUE_PAGE_QUERY: &str =
    "query IssuePage($owner: String!, $name: String!, $first: Int!, $after: String) { \
     repository(owner: $owner, name: $name) { \
     issues(first: $first, after: $after) { nodes { id } pageInfo { hasNextPage endCursor } } } }";

const CREATE_ISSUE_MUTATION: &str = "mutation CreateIssue($input: CreateIssueInput!) { \
     createIssue(input: $input) { issue { id } } }";

const DELETE_ISSUE_MUTATION: &str = "mutation DeleteIssue($input: DeleteIssueInput!) { \
     deleteIssue(input: $input) { repository { issues { totalCount } } } }";

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ViewerData {
    viewer: Login,
}

#[derive(Debug, Deserialize)]
struct Login {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryData<R> {
    repository: Option<R>,
}

#[derive(Debug, Deserialize)]
struct Node {
    id: String,
}

#[derive(Debug, Deserialize)]
struct IssueCount {
    issues: TotalCount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalCount {
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct IssuePageRepository {
    issues: IssueConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueConnection {
    #[serde(default)]
    nodes: Vec<Node>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateIssueData {
    create_issue: CreatedIssue,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    issue: Node,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteIssueData {
    delete_issue: DeletedIssue,
}

#[derive(Debug, Deserialize)]
struct DeletedIssue {
    repository: IssueCount,
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// One page of node ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Page {
    pub ids: Vec<RecordId>,
    pub next_cursor: Option<String>,
}

/// Fetch up to `reported` ids, `PAGE_SIZE` at a time.
///
/// Stops early when the store says there is nothing more, so a collection
/// that shrank after the count was read gives a shorter list.
pub(crate) fn collect_pages<F>(reported: usize, mut fetch_page: F) -> Result<Vec<RecordId>, ApiError>
where
    F: FnMut(usize, Option<&str>) -> Result<Page, ApiError>,
{
    let mut ids = Vec::with_capacity(reported);
    let mut after: Option<String> = None;

    while ids.len() < reported {
        let want = (reported - ids.len()).min(PAGE_SIZE);
        let page = fetch_page(want, after.as_deref())?;
        if page.ids.is_empty() {
            break;
        }
        ids.extend(page.ids);
        match page.next_cursor {
            Some(cursor) => after = Some(cursor),
            None => break,
        }
    }

    Ok(ids)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Issues of a GitHub repository as a [`RemoteDirectory`].
pub struct GithubDirectory {
    agent: ureq::Agent,
    endpoint: String,
    credential: Credential,
    /// Repository node ids, looked up once per scope.
    repository_ids: Mutex<HashMap<Scope, String>>,
}

impl GithubDirectory {
    /// `timeout` bounds every request, so a stuck call fails its own task.
    pub fn new(endpoint: impl Into<String>, credential: Credential, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            endpoint: endpoint.into(),
            credential,
            repository_ids: Mutex::new(HashMap::new()),
        }
    }

    fn graphql<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, ApiError> {
        tracing::debug!(endpoint = %self.endpoint, query = operation_name(query), "graphql request");
        let response = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &self.credential.bearer())
            .send_json(json!({ "query": query, "variables": variables }))?;

        let envelope: Envelope<T> = response.into_json().map_err(ApiError::Decode)?;
        if !envelope.errors.is_empty() {
            let messages: Vec<_> = envelope.errors.into_iter().map(|e| e.message).collect();
            return Err(ApiError::GraphQl(messages.join("; ")));
        }
        envelope.data.ok_or(ApiError::MissingData("data"))
    }

    fn repository_id(&self, scope: &Scope) -> Result<String, ApiError> {
        if let Some(id) = self.cached_repository_id(scope) {
            return Ok(id);
        }

        let data: RepositoryData<Node> =
            self.graphql(REPOSITORY_ID_QUERY, scope_variables(scope))?;
        let id = data
            .repository
            .ok_or_else(|| ApiError::NotFound(format!("repository {scope}")))?
            .id;

        self.repository_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scope.clone(), id.clone());
        Ok(id)
    }

    fn cached_repository_id(&self, scope: &Scope) -> Option<String> {
        self.repository_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope)
            .cloned()
    }

    fn issue_count(&self, scope: &Scope) -> Result<usize, ApiError> {
        let data: RepositoryData<IssueCount> =
            self.graphql(ISSUE_COUNT_QUERY, scope_variables(scope))?;
        let repository = data
            .repository
            .ok_or_else(|| ApiError::NotFound(format!("repository {scope}")))?;
        usize::try_from(repository.issues.total_count)
            .map_err(|_| ApiError::Rejected("issue count does not fit in usize".to_owned()))
    }

    fn issue_page(&self, scope: &Scope, first: usize, after: Option<&str>) -> Result<Page, ApiError> {
        let mut variables = scope_variables(scope);
        variables["first"] = json!(first);
        variables["after"] = json!(after);

        let data: RepositoryData<IssuePageRepository> =
            self.graphql(ISSUE_PAGE_QUERY, variables)?;
        let connection = data
            .repository
            .ok_or_else(|| ApiError::NotFound(format!("repository {scope}")))?
            .issues;

        let next_cursor = if connection.page_info.has_next_page {
            connection.page_info.end_cursor
        } else {
            None
        };
        Ok(Page {
            ids: connection.nodes.into_iter().map(|n| RecordId::from(n.id)).collect(),
            next_cursor,
        })
    }
}

impl RemoteDirectory for GithubDirectory {
    fn list_record_ids(&self, scope: &Scope) -> Result<Vec<RecordId>, RemoteError> {
        let list_err = |source| RemoteError::List {
            scope: scope.clone(),
            source,
        };

        let reported = self.issue_count(scope).map_err(list_err)?;
        let ids = collect_pages(reported, |first, after| self.issue_page(scope, first, after))
            .map_err(list_err)?;

        if ids.len() != reported {
            tracing::warn!(
                scope = %scope,
                reported,
                fetched = ids.len(),
                "issue count changed while listing"
            );
        }
        Ok(ids)
    }

    fn create_record(&self, scope: &Scope, title: &str, body: &str) -> Result<RecordId, RemoteError> {
        let create_err = |source| RemoteError::Create {
            title: title.to_owned(),
            source,
        };

        let repository_id = self.repository_id(scope).map_err(create_err)?;
        let input = json!({
            "input": {
                "repositoryId": repository_id,
                "title": title,
                "body": body,
            }
        });
        let data: CreateIssueData = self
            .graphql(CREATE_ISSUE_MUTATION, input)
            .map_err(create_err)?;
        Ok(RecordId::from(data.create_issue.issue.id))
    }

    fn delete_record(&self, id: &RecordId) -> Result<u64, RemoteError> {
        let input = json!({ "input": { "issueId": id.as_str() } });
        let data: DeleteIssueData = self
            .graphql(DELETE_ISSUE_MUTATION, input)
            .map_err(|source| RemoteError::Delete {
                id: id.clone(),
                source,
            })?;
        tracing::debug!(
            record = %id,
            remaining = data.delete_issue.repository.issues.total_count,
            "issue deleted"
        );
        Ok(data.delete_issue.repository.issues.total_count)
    }

    fn default_owner(&self) -> Result<String, RemoteError> {
        let data: ViewerData = self
            .graphql(VIEWER_QUERY, json!({}))
            .map_err(RemoteError::Owner)?;
        Ok(data.viewer.login)
    }
}

fn scope_variables(scope: &Scope) -> Value {
    json!({ "owner": scope.owner, "name": scope.repository })
}

/// `query IssueCount(...)` → `IssueCount`, for logs.
fn operation_name(query: &str) -> &str {
    query
        .split(|c: char| c == '(' || c == '{')
        .next()
        .and_then(|head| head.split_whitespace().nth(1))
        .unwrap_or("anonymous")
}
