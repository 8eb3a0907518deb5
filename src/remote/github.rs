use super::{BlobPayload, CommitSummary, Committer, RemoteRepository, TreeEntry};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

/// 基于 REST 内容接口的 GitHub 仓库
pub struct GitHubRemote {
    http: Client,
    api_base: String,
    owner: String,
    repo: String,
    committer: Option<Committer>,
    name: String,
}

impl GitHubRemote {
    pub fn new(
        api_base: &str,
        owner: &str,
        repo: &str,
        token: &str,
        committer: Option<Committer>,
    ) -> SyncResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("gitvault"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        if !token.is_empty() {
            let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| SyncError::Settings("访问令牌包含非法字符".to_string()))?;
            auth.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth);
        }

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| SyncError::RemoteUnavailable(format!("创建 HTTP 客户端失败: {}", e)))?;

        let api_base = api_base.trim_end_matches('/').to_string();
        let name = format!("github:{}/{}", owner, repo);

        Ok(Self {
            http,
            api_base,
            owner: owner.to_string(),
            repo: repo.to_string(),
            committer,
            name,
        })
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!("{}/repos/{}/{}{}", self.api_base, self.owner, self.repo, suffix)
    }

    fn contents_url(&self, path: &str) -> String {
        self.repo_url(&format!("/contents/{}", encode_path(path)))
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> SyncResult<Response> {
        request
            .send()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(format!("{} 请求失败: {}", what, e)))
    }

    async fn parse<T: DeserializeOwned>(resp: Response, what: &str) -> SyncResult<T> {
        resp.json()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(format!("{} 响应解析失败: {}", what, e)))
    }
}

/// 逐段编码路径，保留分隔符
pub(crate) fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// 非 2xx 响应转换为错误
async fn failure(resp: Response, what: &str) -> SyncError {
    let status = resp.status();
    let rate_limited = resp
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        == Some("0");
    let body = resp.text().await.unwrap_or_default();
    if rate_limited {
        return SyncError::RemoteUnavailable(format!("{} 触发限流 ({})", what, status));
    }
    SyncError::RemoteUnavailable(format!("{} 失败 ({}): {}", what, status, body))
}

/// 写操作的状态码：409/422 说明提交的 sha 已过期或缺失
pub(crate) fn is_conflict_status(status: StatusCode) -> bool {
    status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
    author: Option<GitActor>,
}

#[derive(Debug, Deserialize)]
struct GitActor {
    name: Option<String>,
    date: Option<String>,
}

impl From<CommitItem> for CommitSummary {
    fn from(item: CommitItem) -> Self {
        let (author, date) = match item.commit.author {
            Some(actor) => (actor.name, actor.date),
            None => (None, None),
        };
        CommitSummary {
            sha: item.sha,
            message: item.commit.message,
            author,
            date,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    sha: String,
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: ShaOnly,
}

#[derive(Debug, Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    committer: Option<&'a Committer>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    message: &'a str,
    sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    committer: Option<&'a Committer>,
}

#[derive(Debug, Serialize)]
struct CreateBlobRequest<'a> {
    content: &'a str,
    encoding: &'a str,
}

fn first_commit(items: Vec<CommitItem>) -> SyncResult<String> {
    items
        .into_iter()
        .next()
        .map(|c| c.sha)
        .ok_or(SyncError::EmptyRepository)
}

impl BlobResponse {
    fn into_payload(self) -> BlobPayload {
        let content_base64 = if self.encoding.is_empty() || self.encoding == "base64" {
            self.content
        } else {
            super::encode_content(self.content.as_bytes())
        };
        BlobPayload {
            sha: self.sha,
            content_base64,
        }
    }
}

#[async_trait]
impl RemoteRepository for GitHubRemote {
    async fn latest_commit(&self) -> SyncResult<String> {
        let url = self.repo_url("/commits");
        let resp = self
            .send(self.http.get(&url).query(&[("per_page", "1")]), "获取最新提交")
            .await?;

        // 空仓库返回 409 Git Repository is empty
        if resp.status() == StatusCode::CONFLICT {
            return Err(SyncError::EmptyRepository);
        }
        if !resp.status().is_success() {
            return Err(failure(resp, "获取最新提交").await);
        }

        let items: Vec<CommitItem> = Self::parse(resp, "获取最新提交").await?;
        first_commit(items)
    }

    async fn get_tree(&self, commit: &str) -> SyncResult<Vec<TreeEntry>> {
        let url = self.repo_url(&format!("/git/trees/{}", commit));
        let resp = self
            .send(self.http.get(&url).query(&[("recursive", "1")]), "获取文件树")
            .await?;
        if !resp.status().is_success() {
            return Err(failure(resp, "获取文件树").await);
        }

        let tree: TreeResponse = Self::parse(resp, "获取文件树").await?;
        if tree.truncated {
            warn!("{} 的文件树被截断，部分文件不会被同步", self.name);
        }
        debug!("文件树包含 {} 个条目", tree.tree.len());
        Ok(tree.tree)
    }

    async fn get_blob(&self, locator: &str) -> SyncResult<BlobPayload> {
        let url = if locator.starts_with("http://") || locator.starts_with("https://") {
            locator.to_string()
        } else {
            self.repo_url(&format!("/git/blobs/{}", locator))
        };
        let resp = self.send(self.http.get(&url), "获取 blob").await?;
        if !resp.status().is_success() {
            return Err(failure(resp, "获取 blob").await);
        }

        let blob: BlobResponse = Self::parse(resp, "获取 blob").await?;
        Ok(blob.into_payload())
    }

    async fn put_content(
        &self,
        path: &str,
        content_base64: &str,
        message: &str,
        existing_sha: Option<&str>,
    ) -> SyncResult<String> {
        let body = PutRequest {
            message,
            content: content_base64,
            sha: existing_sha,
            committer: self.committer.as_ref(),
        };
        let resp = self
            .send(self.http.put(self.contents_url(path)).json(&body), "上传文件")
            .await?;

        if is_conflict_status(resp.status()) {
            return Err(SyncError::ConcurrencyConflict {
                path: path.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(failure(resp, &format!("上传 {}", path)).await);
        }

        let put: PutResponse = Self::parse(resp, "上传文件").await?;
        Ok(put.content.sha)
    }

    async fn delete_content(
        &self,
        path: &str,
        message: &str,
        existing_sha: &str,
    ) -> SyncResult<()> {
        let body = DeleteRequest {
            message,
            sha: existing_sha,
            committer: self.committer.as_ref(),
        };
        let resp = self
            .send(self.http.delete(self.contents_url(path)).json(&body), "删除文件")
            .await?;

        if is_conflict_status(resp.status()) {
            return Err(SyncError::ConcurrencyConflict {
                path: path.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(failure(resp, &format!("删除 {}", path)).await);
        }
        Ok(())
    }

    async fn create_blob(&self, content_base64: &str) -> SyncResult<String> {
        let body = CreateBlobRequest {
            content: content_base64,
            encoding: "base64",
        };
        let resp = self
            .send(self.http.post(self.repo_url("/git/blobs")).json(&body), "创建 blob")
            .await?;
        if !resp.status().is_success() {
            return Err(failure(resp, "创建 blob").await);
        }

        let created: ShaOnly = Self::parse(resp, "创建 blob").await?;
        Ok(created.sha)
    }

    async fn list_commits(&self, limit: u32) -> SyncResult<Vec<CommitSummary>> {
        let per_page = limit.clamp(1, 100).to_string();
        let resp = self
            .send(
                self.http
                    .get(self.repo_url("/commits"))
                    .query(&[("per_page", per_page.as_str())]),
                "获取提交列表",
            )
            .await?;

        if resp.status() == StatusCode::CONFLICT {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(failure(resp, "获取提交列表").await);
        }

        let items: Vec<CommitItem> = Self::parse(resp, "获取提交列表").await?;
        Ok(items.into_iter().map(CommitSummary::from).collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
