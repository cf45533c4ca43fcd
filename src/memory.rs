//! In-process document collection.
//!
//! Documents are JSON objects. Filters understand plain equality, the
//! comparison operators `$eq $ne $gt $gte $lt $lte`, set membership
//! `$in $nin`, `$exists`, `$regex`, and `$and`/`$or` composition. Field
//! names may be dotted paths into nested objects.

use crate::backend::{DocumentStore, FindOptions};
use crate::context::QueryContext;
use crate::error::{QueryError, QueryResult};
use crate::scope::Document;
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub struct MemoryCollection<R> {
    documents: Arc<RwLock<Vec<Value>>>,
    _entity: PhantomData<fn() -> R>,
}

impl<R> Clone for MemoryCollection<R> {
    fn clone(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
            _entity: PhantomData,
        }
    }
}

impl<R> Default for MemoryCollection<R> {
    fn default() -> Self {
        Self {
            documents: Arc::new(RwLock::new(Vec::new())),
            _entity: PhantomData,
        }
    }
}

impl<R> MemoryCollection<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one document
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not serialize to a JSON object
    pub async fn insert<T: Serialize>(&self, document: &T) -> QueryResult<()> {
        let value = serde_json::to_value(document)?;
        if !value.is_object() {
            return Err(QueryError::Backend(
                "Documents must serialize to JSON objects".to_string(),
            ));
        }
        self.documents.write().await.push(value);
        Ok(())
    }

    /// Insert many documents
    ///
    /// # Errors
    ///
    /// Returns the first serialization error; earlier documents stay inserted
    pub async fn insert_many<'a, T, I>(&self, documents: I) -> QueryResult<()>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        for document in documents {
            self.insert(document).await?;
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl<R> DocumentStore<R> for MemoryCollection<R>
where
    R: DeserializeOwned + Send + 'static,
{
    async fn find(
        &self,
        ctx: &QueryContext,
        filter: &Document,
        options: FindOptions,
    ) -> QueryResult<Vec<R>> {
        if ctx.is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        let mut matched: Vec<Value> = {
            let documents = self.documents.read().await;
            let mut matched = Vec::new();
            for doc in documents.iter() {
                if matches_document(doc, filter)? {
                    matched.push(doc.clone());
                }
            }
            matched
        };
        debug!("Query {} matched {} documents", ctx.id(), matched.len());

        if let Some(sort) = options.sort.as_ref().filter(|s| !s.is_empty()) {
            let keys = sort_keys(sort)?;
            matched.sort_by(|a, b| compare_by_keys(a, b, &keys));
        }

        let skip = usize::try_from(options.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| serde_json::from_value(doc).map_err(QueryError::from))
            .collect()
    }

    async fn count_documents(&self, ctx: &QueryContext, filter: &Document) -> QueryResult<u64> {
        if ctx.is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        let documents = self.documents.read().await;
        let mut total = 0_u64;
        for doc in documents.iter() {
            if matches_document(doc, filter)? {
                total += 1;
            }
        }
        Ok(total)
    }
}

/// Resolve a dotted path inside a document
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, key| current.get(key))
}

fn matches_document(doc: &Value, filter: &Document) -> QueryResult<bool> {
    for (key, condition) in filter.entries() {
        if !matches_entry(doc, key, condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_entry(doc: &Value, key: &str, condition: &Value) -> QueryResult<bool> {
    match key {
        "$and" => {
            for sub in sub_filters(key, condition)? {
                if !matches_document(doc, &sub)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "$or" => {
            for sub in sub_filters(key, condition)? {
                if matches_document(doc, &sub)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        op if op.starts_with('$') => Err(QueryError::Backend(format!(
            "Unsupported top-level operator: {op}"
        ))),
        field => matches_condition(lookup(doc, field), condition),
    }
}

fn sub_filters(op: &str, condition: &Value) -> QueryResult<Vec<Document>> {
    let Value::Array(items) = condition else {
        return Err(QueryError::Backend(format!("{op} expects an array")));
    };
    items
        .iter()
        .cloned()
        .map(Document::from_json)
        .collect::<QueryResult<Vec<_>>>()
        .map_err(|_| QueryError::Backend(format!("{op} expects an array of objects")))
}

fn is_operator_object(condition: &Value) -> bool {
    condition
        .as_object()
        .is_some_and(|map| !map.is_empty() && map.keys().all(|k| k.starts_with('$')))
}

fn matches_condition(field: Option<&Value>, condition: &Value) -> QueryResult<bool> {
    if !is_operator_object(condition) {
        return Ok(field.is_some_and(|v| values_equal(v, condition)));
    }

    let Some(operators) = condition.as_object() else {
        return Ok(false);
    };
    for (op, operand) in operators {
        let matched = match op.as_str() {
            "$eq" => field.is_some_and(|v| values_equal(v, operand)),
            "$ne" => field.map_or(true, |v| !values_equal(v, operand)),
            "$gt" => compare_field(field, operand, |o| o == Ordering::Greater),
            "$gte" => compare_field(field, operand, |o| o != Ordering::Less),
            "$lt" => compare_field(field, operand, |o| o == Ordering::Less),
            "$lte" => compare_field(field, operand, |o| o != Ordering::Greater),
            "$in" => {
                let set = operand_array(op, operand)?;
                field.is_some_and(|v| set.iter().any(|item| values_equal(v, item)))
            }
            "$nin" => {
                let set = operand_array(op, operand)?;
                field.map_or(true, |v| !set.iter().any(|item| values_equal(v, item)))
            }
            "$exists" => field.is_some() == truthy(operand),
            "$regex" => {
                let pattern = operand
                    .as_str()
                    .ok_or_else(|| QueryError::Backend("$regex expects a string".to_string()))?;
                let re = Regex::new(pattern)
                    .map_err(|e| QueryError::Backend(format!("Invalid $regex pattern: {e}")))?;
                field.and_then(Value::as_str).is_some_and(|s| re.is_match(s))
            }
            other => {
                return Err(QueryError::Backend(format!("Unsupported operator: {other}")));
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn operand_array<'a>(op: &str, operand: &'a Value) -> QueryResult<&'a Vec<Value>> {
    operand
        .as_array()
        .ok_or_else(|| QueryError::Backend(format!("{op} expects an array")))
}

/// Equality where `25` and `25.0` are the same number
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Ordering::Equal,
        _ => a == b,
    }
}

/// `false`, `0` and `null` are false, anything else is true
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

/// Ordered comparisons only apply between values of the same kind
fn compare_field(field: Option<&Value>, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match field {
        Some(value) if type_rank(value) == type_rank(operand) => accept(compare_values(value, operand)),
        _ => false,
    }
}

/// Cross-type ordering: null, numbers, strings, objects, arrays, booleans
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| compare_values(l, r))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Sort keys as (path, descending)
fn sort_keys(sort: &Document) -> QueryResult<Vec<(String, bool)>> {
    sort.entries()
        .map(|(key, direction)| match direction.as_i64() {
            Some(1) => Ok((key.to_string(), false)),
            Some(-1) => Ok((key.to_string(), true)),
            _ => Err(QueryError::Backend(format!(
                "Sort direction for '{key}' must be 1 or -1"
            ))),
        })
        .collect()
}

fn compare_by_keys(a: &Value, b: &Value, keys: &[(String, bool)]) -> Ordering {
    for (path, descending) in keys {
        let ordering = match (lookup(a, path), lookup(b, path)) {
            (Some(x), Some(y)) => compare_values(x, y),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ordering = if *descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Person {
        id: u32,
        name: String,
        age: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        city: Option<String>,
    }

    fn person(id: u32, name: &str, age: u32, city: Option<&str>) -> Person {
        Person {
            id,
            name: name.to_string(),
            age,
            city: city.map(str::to_string),
        }
    }

    async fn collection() -> MemoryCollection<Person> {
        let people = MemoryCollection::new();
        people
            .insert_many(&[
                person(1, "Alice", 25, Some("Lisbon")),
                person(2, "Bob", 30, Some("Porto")),
                person(3, "Carol", 35, None),
                person(4, "Dave", 30, Some("Lisbon")),
            ])
            .await
            .unwrap();
        people
    }

    fn filter(value: Value) -> Document {
        Document::from_json(value).unwrap()
    }

    async fn ids(people: &MemoryCollection<Person>, f: Value, options: FindOptions) -> Vec<u32> {
        people
            .find(&QueryContext::new(), &filter(f), options)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect()
    }

    #[tokio::test]
    async fn test_equality_and_count() {
        let people = collection().await;
        let ctx = QueryContext::new();

        assert_eq!(ids(&people, json!({"name": "Alice"}), FindOptions::default()).await, vec![1]);
        assert_eq!(
            people
                .count_documents(&ctx, &filter(json!({"city": "Lisbon"})))
                .await
                .unwrap(),
            2
        );
        assert_eq!(people.len().await, 4);
    }

    #[tokio::test]
    async fn test_operators() {
        let people = collection().await;
        let none = FindOptions::default;

        assert_eq!(ids(&people, json!({"age": {"$gte": 30}}), none()).await, vec![2, 3, 4]);
        assert_eq!(ids(&people, json!({"age": {"$gt": 25, "$lt": 35}}), none()).await, vec![2, 4]);
        assert_eq!(ids(&people, json!({"name": {"$in": ["Bob", "Dave"]}}), none()).await, vec![2, 4]);
        assert_eq!(ids(&people, json!({"city": {"$exists": false}}), none()).await, vec![3]);
        assert_eq!(ids(&people, json!({"city": {"$ne": "Lisbon"}}), none()).await, vec![2, 3]);
        assert_eq!(ids(&people, json!({"name": {"$regex": "^[AC]"}}), none()).await, vec![1, 3]);
        assert_eq!(
            ids(&people, json!({"$or": [{"age": 25}, {"name": "Carol"}]}), none()).await,
            vec![1, 3]
        );
    }

    #[tokio::test]
    async fn test_sort_skip_limit() {
        let people = collection().await;
        let options = FindOptions {
            sort: Some(Document::ordered([("age", json!(-1)), ("id", json!(1))])),
            skip: Some(1),
            limit: Some(2),
        };

        assert_eq!(ids(&people, json!({}), options).await, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_bad_sort_direction() {
        let people = collection().await;
        let options = FindOptions {
            sort: Some(Document::ordered([("age", json!("desc"))])),
            ..FindOptions::default()
        };

        let result: QueryResult<Vec<Person>> = people
            .find(&QueryContext::new(), &Document::default(), options)
            .await;
        assert!(matches!(result, Err(QueryError::Backend(_))));
    }

    #[tokio::test]
    async fn test_numbers_compare_by_value() {
        let people: MemoryCollection<Value> = MemoryCollection::new();
        people.insert(&json!({"id": 1, "age": 25})).await.unwrap();
        let ctx = QueryContext::new();

        for f in [
            json!({"age": 25.0}),
            json!({"age": {"$eq": 25.0}}),
            json!({"age": {"$in": [25.0, 40]}}),
        ] {
            assert_eq!(people.count_documents(&ctx, &filter(f)).await.unwrap(), 1);
        }
        for f in [
            json!({"age": {"$ne": 25.0}}),
            json!({"age": {"$nin": [25.0]}}),
        ] {
            assert_eq!(people.count_documents(&ctx, &filter(f)).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_exists_operand_truthiness() {
        let people: MemoryCollection<Value> = MemoryCollection::new();
        people.insert(&json!({"id": 1, "age": 25})).await.unwrap();
        let ctx = QueryContext::new();

        for missing in [json!(false), json!(0), json!(null)] {
            let f = filter(json!({"city": {"$exists": missing}}));
            assert_eq!(people.count_documents(&ctx, &f).await.unwrap(), 1);
        }
        for present in [json!(true), json!(1), json!("yes")] {
            let f = filter(json!({"age": {"$exists": present}}));
            assert_eq!(people.count_documents(&ctx, &f).await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_nested_paths() {
        let people: MemoryCollection<Value> = MemoryCollection::new();
        people
            .insert(&json!({"id": 1, "address": {"city": "Lisbon"}}))
            .await
            .unwrap();
        people
            .insert(&json!({"id": 2, "address": {"city": "Porto"}}))
            .await
            .unwrap();

        let found = people
            .find(
                &QueryContext::new(),
                &filter(json!({"address.city": "Porto"})),
                FindOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(found, vec![json!({"id": 2, "address": {"city": "Porto"}})]);
    }

    #[tokio::test]
    async fn test_rejects_non_objects() {
        let people: MemoryCollection<Value> = MemoryCollection::new();
        assert!(people.insert(&json!([1, 2, 3])).await.is_err());
        assert!(people.is_empty().await);
    }
}
