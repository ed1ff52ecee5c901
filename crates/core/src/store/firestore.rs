use crate::config::FirebaseConfig;
use crate::session::SessionReport;
use crate::store::value::{decode_fields, encode_fields, timestamp};
use crate::store::{newest_first, ReportStore, StoreError};
use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

const LOG_TARGET: &str = "store::firestore";

pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

const PAGE_SIZE: &str = "100";

/// Most writes a single commit accepts.
const MAX_WRITES_PER_COMMIT: usize = 500;

const AUTO_ID_LEN: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(default)]
    create_time: Option<String>,
}

impl Document {
    fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    fn into_report(self) -> Result<SessionReport, StoreError> {
        let id = self.id().to_owned();
        let mut plain = decode_fields(&self.fields)?;
        plain.insert("id".to_owned(), Value::String(id));
        if !plain.contains_key("createdAt") {
            if let Some(created) = self.create_time {
                plain.insert("createdAt".to_owned(), Value::String(created));
            }
        }
        serde_json::from_value(Value::Object(plain))
            .map_err(|e| StoreError::Codec(format!("report {}: {e}", self.name)))
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ListDocuments {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Reports under `users/{uid}/interviews`, accessed with the signed-in user's id token.
#[derive(Clone)]
pub struct FirestoreReportStore {
    client: Client,
    base_url: String,
    project_id: String,
    id_token: String,
}

impl FirestoreReportStore {
    pub fn new<S: Into<String>>(config: &FirebaseConfig, id_token: S) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: LOG_TARGET, error = %e, "falling back to default http client");
                Client::new()
            });
        Self {
            client,
            base_url: DEFAULT_FIRESTORE_BASE_URL.to_owned(),
            project_id: config.project_id.clone(),
            id_token: id_token.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }

    fn database(&self) -> String {
        format!("projects/{}/databases/(default)", self.project_id)
    }

    fn documents_url(&self, path: &str) -> Result<Url, StoreError> {
        Url::parse(&format!("{}/{}/documents/{}", self.base_url, self.database(), path))
            .map_err(|e| StoreError::Url(e.to_string()))
    }

    fn commit_url(&self) -> Result<Url, StoreError> {
        Url::parse(&format!("{}/{}/documents:commit", self.base_url, self.database()))
            .map_err(|e| StoreError::Url(e.to_string()))
    }

    fn interview_name(&self, uid: &str, id: &str) -> String {
        format!("{}/documents/users/{uid}/interviews/{id}", self.database())
    }

    /// Applies `writes` atomically.
    async fn commit(&self, writes: Vec<Value>) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.commit_url()?)
            .bearer_auth(&self.id_token)
            .json(&serde_json::json!({ "writes": writes }))
            .send()
            .await?;
        Self::checked(response).await?;
        Ok(())
    }

    async fn checked(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_owned());
        Err(StoreError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn list(&self, uid: &str) -> Result<Vec<Document>, StoreError> {
        let mut docs = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = self.documents_url(&format!("users/{uid}/interviews"))?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", PAGE_SIZE);
                if let Some(token) = page_token.as_deref() {
                    query.append_pair("pageToken", token);
                }
            }
            let response = self
                .client
                .get(url)
                .bearer_auth(&self.id_token)
                .send()
                .await?;
            let page: ListDocuments = Self::checked(response).await?.json().await?;
            docs.extend(page.documents);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(docs),
            }
        }
    }

    /// Writes `users/{uid}` unless it already exists. Returns whether it was created.
    pub async fn create_user_profile(
        &self,
        uid: &str,
        profile: &UserProfile,
    ) -> Result<bool, StoreError> {
        let mut url = self.documents_url("users")?;
        url.query_pairs_mut().append_pair("documentId", uid);

        let now = timestamp(Utc::now());
        let mut fields = encode_fields(&Map::from_iter([
            ("firstName".to_owned(), Value::String(profile.first_name.clone())),
            ("lastName".to_owned(), Value::String(profile.last_name.clone())),
            ("email".to_owned(), Value::String(profile.email.clone())),
        ]));
        fields.insert("createdAt".to_owned(), now.clone());
        fields.insert("updatedAt".to_owned(), now);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.id_token)
            .json(&serde_json::json!({ "fields": fields }))
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            tracing::debug!(target: LOG_TARGET, uid, "user profile already exists");
            return Ok(false);
        }
        Self::checked(response).await?;
        Ok(true)
    }
}

impl ReportStore for FirestoreReportStore {
    fn save<'a>(
        &'a self,
        uid: &'a str,
        report: &'a SessionReport,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        async move {
            let mut plain = match serde_json::to_value(report) {
                Ok(Value::Object(map)) => map,
                Ok(other) => return Err(StoreError::Codec(format!("report encoded as {other}"))),
                Err(e) => return Err(StoreError::Codec(e.to_string())),
            };
            plain.remove("id");
            plain.remove("createdAt");

            // createdAt is stamped by the server so history order does not depend on the
            // client clock.
            let id = auto_id();
            let write = serde_json::json!({
                "update": {
                    "name": self.interview_name(uid, &id),
                    "fields": encode_fields(&plain),
                },
                "updateTransforms": [
                    { "fieldPath": "createdAt", "setToServerValue": "REQUEST_TIME" }
                ],
                "currentDocument": { "exists": false },
            });
            self.commit(vec![write]).await?;
            tracing::info!(target: LOG_TARGET, uid, id = %id, "saved interview report");
            Ok(id)
        }
        .boxed()
    }

    fn history<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, Result<Vec<SessionReport>, StoreError>> {
        async move {
            let mut reports = self
                .list(uid)
                .await?
                .into_iter()
                .map(Document::into_report)
                .collect::<Result<Vec<_>, _>>()?;
            newest_first(&mut reports);
            Ok(reports)
        }
        .boxed()
    }

    fn clear<'a>(&'a self, uid: &'a str) -> BoxFuture<'a, Result<usize, StoreError>> {
        async move {
            let docs = self.list(uid).await?;
            if docs.is_empty() {
                return Ok(0);
            }
            if docs.len() > MAX_WRITES_PER_COMMIT {
                tracing::warn!(
                    target: LOG_TARGET,
                    uid,
                    documents = docs.len(),
                    "history exceeds one commit; clearing in several batches"
                );
            }
            for batch in docs.chunks(MAX_WRITES_PER_COMMIT) {
                let writes = batch
                    .iter()
                    .map(|doc| serde_json::json!({ "delete": doc.name }))
                    .collect();
                self.commit(writes).await?;
            }
            tracing::info!(target: LOG_TARGET, uid, removed = docs.len(), "cleared interview history");
            Ok(docs.len())
        }
        .boxed()
    }
}

/// Random document id in the style of Firestore client-generated ids.
fn auto_id() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}
