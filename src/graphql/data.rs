use std::sync::Arc;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use crate::core::{DataApi, DataError, RecordKind};
use crate::records::Filter;
use super::client::GraphQlClient;

/// Page size requested by list queries.
const LIST_PAGE_SIZE: u32 = 1000;

fn selection_set(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Course => "id name createdAt updatedAt",
        RecordKind::Class => {
            "id courseId name description url author image transcript subtitle class_flag createdAt updatedAt"
        }
        RecordKind::Comment => "id classId content commentVersion createdAt updatedAt",
        RecordKind::Reward => "id userId classId point createdAt updatedAt",
    }
}

fn mutation(action: &str, kind: RecordKind) -> (String, String) {
    let field = format!("{}{}", action.to_lowercase(), kind.as_str());
    let query = format!(
        "mutation {action}{kind}($input: {action}{kind}Input!) {{ {field}(input: $input) {{ {selection} }} }}",
        action = action,
        kind = kind.as_str(),
        field = field,
        selection = selection_set(kind),
    );
    (query, field)
}

fn get_query(kind: RecordKind) -> (String, String) {
    let field = format!("get{}", kind.as_str());
    let query = format!(
        "query Get{kind}($id: ID!) {{ {field}(id: $id) {{ {selection} }} }}",
        kind = kind.as_str(),
        field = field,
        selection = selection_set(kind),
    );
    (query, field)
}

fn list_query(kind: RecordKind) -> (String, String) {
    let field = format!("list{}", kind.plural());
    let query = format!(
        "query List{plural}($filter: Model{kind}FilterInput, $limit: Int, $nextToken: String) {{ \
         {field}(filter: $filter, limit: $limit, nextToken: $nextToken) {{ items {{ {selection} }} nextToken }} }}",
        plural = kind.plural(),
        kind = kind.as_str(),
        field = field,
        selection = selection_set(kind),
    );
    (query, field)
}

/// Generated CRUD operations of the hosted data API.
#[derive(Clone)]
pub struct GraphQlDataApi {
    client: Arc<GraphQlClient>,
}

impl GraphQlDataApi {
    pub fn new(client: Arc<GraphQlClient>) -> Self {
        Self { client }
    }

    async fn run(&self, query: &str, variables: Value, field: &str) -> Result<Value, DataError> {
        Ok(self.client.execute(query, variables, field).await?)
    }
}

fn with_id(id: &str, patch: Value) -> Value {
    let mut input = match patch {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    input.insert("id".to_string(), Value::String(id.to_string()));
    Value::Object(input)
}

#[async_trait]
impl DataApi for GraphQlDataApi {
    async fn create(&self, kind: RecordKind, input: Value) -> Result<Value, DataError> {
        let (query, field) = mutation("Create", kind);
        let value = self.run(&query, json!({ "input": input }), &field).await?;
        if value.is_null() {
            return Err(crate::core::GraphQlError::EmptyData(field).into());
        }
        Ok(value)
    }

    async fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Value>, DataError> {
        let (query, field) = get_query(kind);
        let value = self.run(&query, json!({ "id": id }), &field).await?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn list(&self, kind: RecordKind, filter: &Filter) -> Result<Vec<Value>, DataError> {
        let (query, field) = list_query(kind);
        let mut items = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let variables = json!({
                "filter": filter.to_graphql(),
                "limit": LIST_PAGE_SIZE,
                "nextToken": next_token,
            });
            let mut page = self.run(&query, variables, &field).await?;

            if let Some(Value::Array(batch)) = page.get_mut("items").map(Value::take) {
                items.extend(batch.into_iter().filter(|item| !item.is_null()));
            }

            next_token = page
                .get("nextToken")
                .and_then(Value::as_str)
                .map(String::from);
            if next_token.is_none() {
                break;
            }
        }

        Ok(items)
    }

    async fn update(&self, kind: RecordKind, id: &str, patch: Value) -> Result<Value, DataError> {
        let (query, field) = mutation("Update", kind);
        let value = self.run(&query, json!({ "input": with_id(id, patch) }), &field).await?;
        if value.is_null() {
            return Err(DataError::NotFound { kind, id: id.to_string() });
        }
        Ok(value)
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), DataError> {
        let (query, field) = mutation("Delete", kind);
        let value = self.run(&query, json!({ "input": { "id": id } }), &field).await?;
        if value.is_null() {
            return Err(DataError::NotFound { kind, id: id.to_string() });
        }
        Ok(())
    }
}
