//! The GraphQL client.
//!
//! Owns the fragment registry and the merge buffer, composes documents
//! through `fraql_core` and dispatches them over the built-in transport.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{ClientError, ClientResult, TransportError};
use crate::http::HttpClient;
use fraql_core::{
    build_query, clean_keys, merge_operations, with_operation, ComposeError, FragmentMap,
    FragmentRegistry, OperationKind, PendingOperation, Variables,
};

/// HTTP method used for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Post,
    Get,
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// HTTP method for every request.
    pub method: Method,
    /// Send the request body as JSON; `false` falls back to
    /// `application/x-www-form-urlencoded`.
    pub as_json: bool,
    /// Wrap every operation in an `(@autodeclare)` parameter list.
    pub always_autodeclare: bool,
    /// Default headers sent with every request.
    pub headers: IndexMap<String, String>,
    /// Initial fragment tree.
    pub fragments: Value,
    /// Socket timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for retryable transport failures.
    pub max_retries: u32,
    /// Retry delay base in milliseconds; exponential backoff applies.
    pub retry_delay_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            method: Method::Post,
            as_json: true,
            always_autodeclare: false,
            headers: IndexMap::new(),
            fragments: Value::Null,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

impl ClientOptions {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn as_json(mut self, as_json: bool) -> Self {
        self.as_json = as_json;
        self
    }

    pub fn always_autodeclare(mut self, always: bool) -> Self {
        self.always_autodeclare = always;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn fragments(mut self, tree: Value) -> Self {
        self.fragments = tree;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_delay_ms(mut self, delay: u64) -> Self {
        self.retry_delay_ms = delay;
        self
    }
}

/// A GraphQL request body.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub query: String,
    pub variables: Value,
}

/// A GraphQL response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub data: Option<Value>,
    pub errors: Option<Vec<GraphqlError>>,
}

/// One entry of the envelope's `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<HashMap<String, Value>>,
}

struct Shared {
    url: RwLock<String>,
    headers: RwLock<IndexMap<String, String>>,
    registry: RwLock<FragmentRegistry>,
    merges: Mutex<HashMap<String, Vec<PendingOperation>>>,
}

/// The fraql client. Cheap to clone; clones share the fragment registry
/// and the merge buffer.
///
/// Composition is a pure, synchronous function of the registry and the
/// call inputs. The locks exist only so registration and buffered merges
/// can run behind `&self`; resolution never blocks on anything but a
/// concurrent `fragment` registration.
#[derive(Clone)]
pub struct GraphqlClient {
    shared: Arc<Shared>,
    options: ClientOptions,
}

impl GraphqlClient {
    /// Creates a client with default options and no fragments.
    pub fn new(url: impl Into<String>) -> Self {
        let shared = Shared {
            url: RwLock::new(url.into()),
            headers: RwLock::new(IndexMap::new()),
            registry: RwLock::new(FragmentRegistry::default()),
            merges: Mutex::new(HashMap::new()),
        };
        Self {
            shared: Arc::new(shared),
            options: ClientOptions::default(),
        }
    }

    /// Creates a client, registering `options.fragments`.
    pub fn with_options(url: impl Into<String>, options: ClientOptions) -> ClientResult<Self> {
        let registry = FragmentRegistry::new(options.fragments.clone())
            .map_err(ClientError::Compose)?;
        let shared = Shared {
            url: RwLock::new(url.into()),
            headers: RwLock::new(options.headers.clone()),
            registry: RwLock::new(registry),
            merges: Mutex::new(HashMap::new()),
        };
        Ok(Self {
            shared: Arc::new(shared),
            options,
        })
    }

    /// Prepares a query operation.
    pub fn query(&self, body: impl Into<String>) -> Operation {
        self.operation(OperationKind::Query, body)
    }

    /// Prepares a mutation.
    pub fn mutate(&self, body: impl Into<String>) -> Operation {
        self.operation(OperationKind::Mutation, body)
    }

    /// Prepares a subscription operation (dispatched like any other; no
    /// streaming transport is involved).
    pub fn subscribe(&self, body: impl Into<String>) -> Operation {
        self.operation(OperationKind::Subscription, body)
    }

    fn operation(&self, kind: OperationKind, body: impl Into<String>) -> Operation {
        Operation {
            client: self.clone(),
            kind,
            body: body.into(),
            declare: self.options.always_autodeclare,
            headers: IndexMap::new(),
        }
    }

    /// Sends raw operation text as-is (still resolving fragments and any
    /// declare marker) with an empty variable bag.
    pub async fn run(&self, query: &str) -> ClientResult<Value> {
        self.send_document(query, &Variables::new()).await
    }

    /// Registers new fragments: deep-merges `tree` into the registry.
    pub fn fragment(&self, tree: Value) -> ClientResult<()> {
        write_lock(&self.shared.registry)
            .register(tree)
            .map_err(ClientError::Compose)
    }

    /// Returns the trimmed definition for a dotted fragment path.
    pub fn fragment_definition(&self, path: &str) -> ClientResult<String> {
        read_lock(&self.shared.registry)
            .definition(path)
            .map(str::to_string)
            .map_err(ClientError::Compose)
    }

    /// Snapshot of the flat `name -> definition` registry view.
    pub fn fragments(&self) -> FragmentMap {
        read_lock(&self.shared.registry).fragments().clone()
    }

    /// Merges `new_headers` into the default headers.
    pub fn headers(&self, new_headers: IndexMap<String, String>) {
        write_lock(&self.shared.headers).extend(new_headers);
    }

    pub fn url(&self) -> String {
        read_lock(&self.shared.url).clone()
    }

    pub fn set_url(&self, url: impl Into<String>) {
        *write_lock(&self.shared.url) = url.into();
    }

    /// Composes the final document without dispatching it.
    pub fn build_query(&self, query: &str, variables: &Variables) -> ClientResult<String> {
        let registry = read_lock(&self.shared.registry);
        build_query(query, variables, &registry).map_err(ClientError::Compose)
    }

    /// Sends everything buffered under `bucket` as one request.
    ///
    /// On failure the buffered operations go back into the bucket, ahead
    /// of anything merged in the meantime, so the commit can be retried.
    pub async fn commit(&self, bucket: &str) -> ClientResult<Value> {
        let operations = lock(&self.shared.merges).remove(bucket).unwrap_or_default();
        if operations.is_empty() {
            return Err(ComposeError::EmptyMerge(bucket.to_string()).into());
        }
        let (merged_query, merged_variables) = merge_operations(&operations);
        match self.send_document(&merged_query, &merged_variables).await {
            Ok(data) => Ok(data),
            Err(err) => {
                let mut merges = lock(&self.shared.merges);
                let slot = merges.entry(bucket.to_string()).or_default();
                let mut restored = operations;
                restored.append(slot);
                *slot = restored;
                Err(err)
            }
        }
    }

    fn buffer_merge(&self, bucket: &str, operation: PendingOperation) {
        lock(&self.shared.merges)
            .entry(bucket.to_string())
            .or_default()
            .push(operation);
    }

    async fn send_document(&self, query: &str, variables: &Variables) -> ClientResult<Value> {
        let document = self.build_query(query, variables)?;
        let wire_variables = clean_keys(variables);
        self.dispatch(&document, &wire_variables, &IndexMap::new())
            .await
    }

    async fn dispatch(
        &self,
        document: &str,
        variables: &Variables,
        extra_headers: &IndexMap<String, String>,
    ) -> ClientResult<Value> {
        let variables = serde_json::to_value(variables)
            .map_err(|e| TransportError::serialize(e.to_string()))?;

        let mut headers = read_lock(&self.shared.headers).clone();
        headers.extend(extra_headers.clone());

        let url = self.url();
        let http = HttpClient::new(self.options.timeout);

        debug!(
            query = first_line(document),
            variables = variables.to_string().as_str(),
            "sending request"
        );

        let mut attempt = 0;
        let response = loop {
            let result = match self.options.method {
                Method::Get => {
                    http.get(&url, &form_body(document, &variables), &headers).await
                }
                Method::Post if self.options.as_json => {
                    let body = serde_json::to_string(&Request {
                        query: document.to_string(),
                        variables: variables.clone(),
                    })
                    .map_err(|e| TransportError::serialize(e.to_string()))?;
                    http.post(&url, &body, "application/json", &headers).await
                }
                Method::Post => {
                    http.post(
                        &url,
                        &form_body(document, &variables),
                        "application/x-www-form-urlencoded",
                        &headers,
                    )
                    .await
                }
            };

            match result {
                Ok(response) => break response,
                Err(transport) if transport.is_retryable() && attempt < self.options.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(self.options.retry_delay_ms, attempt);
                    debug!(attempt, delay_ms = delay, "retrying after transport failure");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(transport) => {
                    error!(code = transport.code.as_str(), "request failed");
                    return Err(transport.into());
                }
            }
        };

        if response.status != 200 {
            return Err(ClientError::Http {
                status: response.status,
                body: response.body,
            });
        }

        let envelope: Response = serde_json::from_str(&response.body)
            .map_err(|e| TransportError::deserialize(e.to_string()))?;

        if let Some(errors) = envelope.errors {
            if !errors.is_empty() {
                return Err(ClientError::Graphql { errors });
            }
        }
        envelope.data.ok_or_else(|| {
            TransportError::invalid_response("envelope carried neither data nor errors").into()
        })
    }
}

/// A prepared operation bound to a client.
#[derive(Clone)]
pub struct Operation {
    client: GraphqlClient,
    kind: OperationKind,
    body: String,
    declare: bool,
    headers: IndexMap<String, String>,
}

impl Operation {
    /// Wraps the operation in an `(@autodeclare)` parameter list.
    pub fn declared(mut self) -> Self {
        self.declare = true;
        self
    }

    /// Adds a header for this operation only.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// The raw operation text before fragment resolution.
    pub fn raw_query(&self) -> String {
        with_operation(self.kind, &self.body, self.declare)
    }

    /// Composes and dispatches with the given variables.
    pub async fn send(&self, variables: Variables) -> ClientResult<Value> {
        let document = self.client.build_query(&self.raw_query(), &variables)?;
        let wire_variables = clean_keys(&variables);
        self.client
            .dispatch(&document, &wire_variables, &self.headers)
            .await
    }

    /// Dispatches with an empty variable bag.
    pub async fn run(&self) -> ClientResult<Value> {
        self.send(Variables::new()).await
    }

    /// Buffers this operation under `bucket` instead of sending it.
    /// Nothing goes on the wire until [`GraphqlClient::commit`].
    pub fn merge(&self, bucket: &str, variables: Variables) {
        self.merge_with_alias(bucket, merge_alias(), variables);
    }

    /// [`Operation::merge`] with a caller-chosen namespace alias, for
    /// deterministic documents.
    pub fn merge_with_alias(&self, bucket: &str, alias: impl Into<String>, variables: Variables) {
        self.client.buffer_merge(
            bucket,
            PendingOperation {
                alias: alias.into(),
                query: self.raw_query(),
                variables,
            },
        );
    }
}

/// Exponential backoff delay for retry `attempt` (1-based). The exponent
/// is capped so arbitrarily large retry budgets cannot overflow.
fn backoff_delay(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(16))
}

/// Namespace alias for one buffered operation: `merge` plus four digits.
fn merge_alias() -> String {
    format!("merge{:04}", rand::thread_rng().gen_range(0..10_000))
}

/// `query=<document>&variables=<json>`, percent-encoded; used for GET
/// query strings and form-encoded POST bodies alike.
fn form_body(document: &str, variables: &Value) -> String {
    format!(
        "query={}&variables={}",
        urlencoding::encode(document),
        urlencoding::encode(&variables.to_string())
    )
}

fn first_line(document: &str) -> &str {
    document.lines().next().unwrap_or_default()
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> GraphqlClient {
        GraphqlClient::with_options(
            "http://localhost:4000/graphql",
            ClientOptions::default().fragments(json!({
                "user": "on User {name}",
                "auth": {"user": "on User {token, ...user}"}
            })),
        )
        .unwrap()
    }

    #[test]
    fn options_builder() {
        let options = ClientOptions::default()
            .method(Method::Get)
            .as_json(false)
            .always_autodeclare(true)
            .header("Authorization", "Bearer token")
            .timeout(Duration::from_secs(10))
            .max_retries(5);

        assert_eq!(options.method, Method::Get);
        assert!(!options.as_json);
        assert!(options.always_autodeclare);
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.max_retries, 5);
        assert!(options.headers.contains_key("Authorization"));
    }

    #[test]
    fn operations_carry_keyword_and_marker() {
        let client = client();
        assert_eq!(client.query("{ x }").raw_query(), "query { x } ");
        assert_eq!(client.mutate("{ w }").raw_query(), "mutation { w } ");
        assert_eq!(
            client.query("x { y }").declared().raw_query(),
            "query (@autodeclare) { x { y } }"
        );
    }

    #[test]
    fn fragment_registration_and_lookup() {
        let client = client();
        client
            .fragment(json!({"auth": {"error": "on Error {messages}"}}))
            .unwrap();

        assert_eq!(
            client.fragment_definition("auth.error").unwrap(),
            "fragment auth_error on Error {messages}"
        );
        assert_eq!(
            client.fragments().get("auth_user").map(String::as_str),
            Some("\nfragment auth_user on User {token, ...user}")
        );

        let err = client.fragment_definition("nope").unwrap_err();
        assert_eq!(
            err,
            ClientError::Compose(ComposeError::FragmentNotFound("nope".to_string()))
        );
    }

    #[test]
    fn build_query_composes_without_dispatch() {
        let client = client();
        let variables = Variables::from([("id".to_string(), json!(7))]);
        let document = client
            .build_query("query (@autodeclare) { x(id: $id) { ...user } }", &variables)
            .unwrap();
        assert_eq!(
            document,
            "query ($id: ID!) { x(id: $id) { ... user } }\n\nfragment user on User {name}"
        );
    }

    #[test]
    fn url_and_headers_are_updatable() {
        let client = client();
        assert_eq!(client.url(), "http://localhost:4000/graphql");
        client.set_url("http://localhost:8080/graphql");
        assert_eq!(client.url(), "http://localhost:8080/graphql");

        client.headers(IndexMap::from([(
            "User-Agent".to_string(),
            "fraql".to_string(),
        )]));
        assert!(read_lock(&client.shared.headers).contains_key("User-Agent"));
    }

    #[test]
    fn merge_buffers_without_sending() {
        let client = client();
        client.query("{ post(id: $id) { id } }").merge_with_alias(
            "buildPage",
            "merge1234",
            Variables::from([("id".to_string(), json!(123))]),
        );

        let merges = lock(&client.shared.merges);
        let buffered = merges.get("buildPage").unwrap();
        assert_eq!(buffered.len(), 1);
        assert_eq!(buffered[0].alias, "merge1234");
    }

    #[tokio::test]
    async fn commit_of_empty_bucket_fails() {
        let client = client();
        let err = client.commit("nothing").await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Compose(ComposeError::EmptyMerge("nothing".to_string()))
        );
    }

    #[test]
    fn always_autodeclare_marks_every_operation() {
        let client = GraphqlClient::with_options(
            "http://localhost:4000/graphql",
            ClientOptions::default().always_autodeclare(true),
        )
        .unwrap();

        assert_eq!(
            client.query("x { y }").raw_query(),
            "query (@autodeclare) { x { y } }"
        );
        assert_eq!(
            client.mutate("w { z }").raw_query(),
            "mutation (@autodeclare) { w { z } }"
        );
    }

    #[test]
    fn backoff_grows_without_overflowing() {
        assert_eq!(backoff_delay(100, 1), 100);
        assert_eq!(backoff_delay(100, 2), 200);
        assert_eq!(backoff_delay(100, 3), 400);
        // the exponent caps, so huge retry budgets saturate instead of
        // panicking in debug builds
        assert_eq!(backoff_delay(100, 1_000), backoff_delay(100, 17));
        let _ = backoff_delay(u64::MAX, u32::MAX);
    }

    #[test]
    fn random_aliases_have_the_expected_shape() {
        let alias = merge_alias();
        assert!(alias.starts_with("merge"));
        assert_eq!(alias.len(), "merge".len() + 4);
    }

    #[test]
    fn form_bodies_are_percent_encoded() {
        let body = form_body("query { x }", &json!({"a": 1}));
        assert_eq!(body, "query=query%20%7B%20x%20%7D&variables=%7B%22a%22%3A1%7D");
    }
}
