use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{json_body, ApiClient, ApiError, ApiResult, RequestOptions};
use crate::auth::utils::truncate_body;
use crate::auth::CompanyId;

use super::{Document, DocumentSchema};

/// Largest page the document endpoints accept.
pub const MAX_LIMIT: usize = 100;

/// Options used to constrain document list queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    pub limit: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<String>,
}

impl DocumentQuery {
    pub fn recent(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Effective page size: zero means the maximum, anything larger is capped.
    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            MAX_LIMIT
        } else {
            self.limit.min(MAX_LIMIT)
        }
    }

    fn into_options(self, schema: &DocumentSchema, company_id: CompanyId) -> RequestOptions {
        let limit = self.effective_limit();
        let mut options = RequestOptions::document()
            .query("company_id", company_id)
            .query("limit", limit);

        if let Some(start) = self.start_date {
            options = options.query(schema.start_date_param, start.format("%Y-%m-%d"));
        }
        if let Some(end) = self.end_date {
            options = options.query(schema.end_date_param, end.format("%Y-%m-%d"));
        }
        if let Some(status) = self.status.filter(|s| !s.trim().is_empty()) {
            options = options.query(schema.status_param, status);
        }
        options
    }
}

/// Result of a list call. Failures degrade to an empty list with the cause attached.
#[derive(Debug, Default)]
pub struct Listing {
    pub documents: Vec<Document>,
    pub diagnostic: Option<ApiError>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Fetches documents of the kind described by its schema.
#[derive(Clone)]
pub struct DocumentService {
    client: ApiClient,
    schema: &'static DocumentSchema,
}

impl DocumentService {
    pub fn new(client: ApiClient, schema: &'static DocumentSchema) -> Self {
        Self { client, schema }
    }

    pub fn schema(&self) -> &'static DocumentSchema {
        self.schema
    }

    pub async fn list(&self, company_id: CompanyId, query: DocumentQuery) -> Listing {
        match self.try_list(company_id, query).await {
            Ok(documents) => {
                debug!(kind = %self.schema.kind, count = documents.len(), "listed documents");
                Listing {
                    documents,
                    diagnostic: None,
                }
            }
            Err(err) => {
                warn!(kind = %self.schema.kind, error = %err, "document list failed");
                Listing {
                    documents: Vec::new(),
                    diagnostic: Some(err),
                }
            }
        }
    }

    async fn try_list(
        &self,
        company_id: CompanyId,
        query: DocumentQuery,
    ) -> ApiResult<Vec<Document>> {
        let options = query.into_options(self.schema, company_id);
        let response = self.client.get(self.schema.path, &options).await?;
        let body = json_body(response).await?;

        match body.get(self.schema.list_key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(entries)) => Ok(entries
                .iter()
                .filter_map(|entry| entry.as_object().cloned().map(Document))
                .collect()),
            Some(_) => Err(ApiError::UnexpectedShape {
                key: self.schema.list_key,
            }),
        }
    }

    /// Fetch one document. A non-JSON or malformed body, or a response without the detail
    /// key, is reported as [`ApiError::NotFound`] carrying the raw body.
    pub async fn detail(&self, company_id: CompanyId, id: &str) -> ApiResult<Document> {
        let path = format!("{}/{}", self.schema.path, id);
        let options = RequestOptions::document().query("company_id", company_id);
        let response = self.client.get(&path, &options).await?;

        let body = match json_body(response).await {
            Ok(body) => body,
            Err(ApiError::Decode { body, .. } | ApiError::UnexpectedContentType { body, .. }) => {
                return Err(ApiError::NotFound { body })
            }
            Err(err) => return Err(err),
        };

        match body.get(self.schema.detail_key) {
            Some(Value::Object(fields)) => Ok(Document(fields.clone())),
            _ => Err(ApiError::NotFound {
                body: truncate_body(&body.to_string()),
            }),
        }
    }
}
