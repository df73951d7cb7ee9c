use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;

use super::{Filter, Query, Record, RecordStore, StoreError, Table};

/// Record store backed by a PostgREST-compatible HTTP API (e.g. a hosted
/// Supabase project). Column defaults, ids and timestamps are assigned by
/// the remote database.
pub struct RestStore {
    api_key: Option<String>,
    base_url: String,
    client: Client,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self, StoreError> {
        let client = Client::builder().build()?;
        Ok(Self {
            api_key: api_key.map(|s| s.to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.as_str())
    }

    fn request(&self, method: Method, table: Table) -> RequestBuilder {
        let builder = self.client.request(method, self.table_url(table));
        match self.api_key {
            Some(ref key) => builder.header("apikey", key).bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl RecordStore for RestStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Record>, StoreError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(&query.filters));
        if let Some(ref order) = query.order {
            let direction = if order.descending { "desc" } else { "asc" };
            params.push(("order".to_string(), format!("{}.{direction}", order.column)));
        }

        let response = self
            .request(Method::GET, table)
            .query(&params)
            .send()
            .await?;
        read_records(response).await
    }

    async fn insert(&self, table: Table, record: Record) -> Result<Record, StoreError> {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&[record])
            .send()
            .await?;

        read_records(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend {
                status: StatusCode::OK.as_u16(),
                message: format!("insert into {table} returned no representation"),
            })
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Record,
    ) -> Result<Vec<Record>, StoreError> {
        let response = self
            .request(Method::PATCH, table)
            .header("Prefer", "return=representation")
            .query(&filter_params(filters))
            .json(&patch)
            .send()
            .await?;
        read_records(response).await
    }
}

/// PostgREST horizontal filters: `column=eq.value`, `column=is.null`.
fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| {
            let operand = match &f.value {
                Value::Null => "is.null".to_string(),
                Value::String(s) => format!("eq.{s}"),
                other => format!("eq.{other}"),
            };
            (f.column.clone(), operand)
        })
        .collect()
}

async fn read_records(response: Response) -> Result<Vec<Record>, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let message = response.text().await.unwrap_or_default();
    match status {
        StatusCode::CONFLICT => Err(StoreError::Conflict(message)),
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            Err(StoreError::Unavailable(message))
        }
        _ => Err(StoreError::Backend {
            status: status.as_u16(),
            message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query as UrlQuery;
    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    fn header(headers: &HeaderMap, name: &str) -> Value {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map_or(Value::Null, Value::from)
    }

    /// Echoes what a PostgREST server would have received.
    async fn select_notes(
        headers: HeaderMap,
        UrlQuery(params): UrlQuery<HashMap<String, String>>,
    ) -> Json<Value> {
        Json(json!([{
            "params": params,
            "apikey": header(&headers, "apikey"),
            "authorization": header(&headers, "authorization"),
        }]))
    }

    async fn insert_note(headers: HeaderMap, Json(rows): Json<Value>) -> (StatusCode, Json<Value>) {
        let mut row = rows[0].clone();
        row["id"] = json!("n1");
        row["prefer"] = header(&headers, "prefer");
        (StatusCode::CREATED, Json(json!([row])))
    }

    async fn update_subjects(
        UrlQuery(params): UrlQuery<HashMap<String, String>>,
        Json(patch): Json<Value>,
    ) -> Json<Value> {
        Json(json!([{ "params": params, "patch": patch }]))
    }

    async fn mock_store() -> RestStore {
        let app = Router::new()
            .route("/rest/v1/notes", get(select_notes).post(insert_note).patch(|| async {
                (StatusCode::SERVICE_UNAVAILABLE, "upstream unavailable")
            }))
            .route(
                "/rest/v1/subjects",
                axum::routing::post(|| async {
                    (StatusCode::CONFLICT, "duplicate key value violates unique constraint")
                })
                .patch(update_subjects),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        RestStore::new(&format!("http://{addr}/"), Some("anon-key")).unwrap()
    }

    #[tokio::test]
    async fn select_sends_filters_order_and_key() {
        let store = mock_store().await;
        let query = Query::new()
            .eq("is_approved", true)
            .eq("subject_id", "s1")
            .order_by("created_at", true);

        let rows = store.select(Table::Notes, &query).await.unwrap();
        assert_eq!(rows.len(), 1);
        let params = &rows[0]["params"];
        assert_eq!(params["select"], "*");
        assert_eq!(params["order"], "created_at.desc");
        assert_eq!(params["is_approved"], "eq.true");
        assert_eq!(params["subject_id"], "eq.s1");
        assert_eq!(rows[0]["apikey"], "anon-key");
        assert_eq!(rows[0]["authorization"], "Bearer anon-key");
    }

    #[tokio::test]
    async fn insert_asks_for_the_persisted_row() {
        let store = mock_store().await;
        let mut record = Record::new();
        record.insert("title".into(), json!("Trees"));

        let row = store.insert(Table::Notes, record).await.unwrap();
        assert_eq!(row["id"], "n1");
        assert_eq!(row["title"], "Trees");
        assert_eq!(row["prefer"], "return=representation");
    }

    #[tokio::test]
    async fn update_sends_filters_and_patch() {
        let store = mock_store().await;
        let mut patch = Record::new();
        patch.insert("color".into(), json!("#0ea5e9"));

        let rows = store
            .update(Table::Subjects, &[Filter::eq("code", "BCA-401")], patch)
            .await
            .unwrap();
        assert_eq!(rows[0]["params"]["code"], "eq.BCA-401");
        assert_eq!(rows[0]["patch"]["color"], "#0ea5e9");
    }

    #[tokio::test]
    async fn error_statuses_map_to_store_errors() {
        let store = mock_store().await;

        let conflict = store.insert(Table::Subjects, Record::new()).await;
        match conflict {
            Err(StoreError::Conflict(message)) => assert!(message.contains("duplicate key")),
            other => panic!("unexpected result: {other:?}"),
        }

        let unavailable = store
            .update(Table::Notes, &[Filter::eq("id", "n1")], Record::new())
            .await;
        match unavailable {
            Err(e @ StoreError::Unavailable(_)) => assert!(e.is_unavailable()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn filters_render_as_postgrest_operators() {
        let params = filter_params(&[
            Filter::eq("subject_id", "abc"),
            Filter::eq("is_approved", true),
            Filter::eq("user_id", Value::Null),
        ]);

        assert_eq!(
            params,
            vec![
                ("subject_id".to_string(), "eq.abc".to_string()),
                ("is_approved".to_string(), "eq.true".to_string()),
                ("user_id".to_string(), "is.null".to_string()),
            ]
        );
    }

    #[test]
    fn table_urls_ignore_trailing_slash() {
        let store = RestStore::new("https://example.supabase.co/", Some("anon")).unwrap();
        assert_eq!(
            store.table_url(Table::Notes),
            "https://example.supabase.co/rest/v1/notes"
        );
    }
}
