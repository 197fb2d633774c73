//! Demo schema served by the binary.
//!
//! | Field                                     | Behaviour                                  |
//! |-------------------------------------------|--------------------------------------------|
//! | `Query.hello(name)`                       | `"Hello {name}!"`                          |
//! | `Query.connectionParams`                  | payload sent with `connection_init`        |
//! | `Subscription.example`                    | `"Hi"` once after a delay, then ends       |
//! | `Subscription.echo(message, delayMs)`     | `message` once after `delayMs`, then ends  |
//! | `Subscription.exampleError`               | one field error, then ends                 |
//! | `Subscription.counter(upTo, intervalMs)`  | 0, 1, 2, ... (forever without `upTo`)      |

use std::time::Duration;

use async_graphql::{Context, EmptyMutation, Json, Object, Schema, Subscription};
use futures_util::Stream;
use futures_util::stream;
use serde_json::Value;

use super::schema::SchemaEngine;
use super::types::RequestContext;

/// Demo schema type.
pub type DemoSchema = Schema<QueryRoot, EmptyMutation, SubscriptionRoot>;

/// Engine serving [`DemoSchema`].
pub type DemoEngine = SchemaEngine<QueryRoot, EmptyMutation, SubscriptionRoot>;

/// Query root of the demo schema.
#[derive(Debug, Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Greets `name`, or the world.
    async fn hello(&self, name: Option<String>) -> String {
        format!("Hello {}!", name.as_deref().unwrap_or("world"))
    }

    /// Payload the client sent with `connection_init`.
    async fn connection_params(&self, ctx: &Context<'_>) -> Option<Json<Value>> {
        ctx.data_opt::<RequestContext>()
            .and_then(|context| context.connection_params.clone())
            .map(Json)
    }
}

/// Subscription root of the demo schema.
#[derive(Debug)]
pub struct SubscriptionRoot {
    example_delay: Duration,
}

#[Subscription]
impl SubscriptionRoot {
    /// `"Hi"` once, then ends.
    async fn example(&self) -> impl Stream<Item = String> {
        let delay = self.example_delay;
        stream::once(async move {
            tokio::time::sleep(delay).await;
            "Hi".to_string()
        })
    }

    /// `message` once after `delay_ms`, then ends.
    async fn echo(
        &self,
        #[graphql(default)] message: String,
        #[graphql(default)] delay_ms: u64,
    ) -> impl Stream<Item = String> {
        stream::once(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            message
        })
    }

    /// A single field error.
    async fn example_error(&self) -> impl Stream<Item = async_graphql::Result<String>> {
        stream::iter([Err(async_graphql::Error::new("This is an example"))])
    }

    /// Counts from 0, one value per interval, stopping before `up_to`.
    async fn counter(
        &self,
        up_to: Option<u64>,
        #[graphql(default = 1000)] interval_ms: u64,
    ) -> impl Stream<Item = u64> {
        let interval = Duration::from_millis(interval_ms);
        stream::unfold(0_u64, move |n| async move {
            if up_to.is_some_and(|limit| n >= limit) {
                return None;
            }
            if n > 0 {
                tokio::time::sleep(interval).await;
            }
            Some((n, n + 1))
        })
    }
}

/// Builds the demo schema. `example_delay` is how long `example` waits
/// before yielding.
#[must_use]
pub fn demo_schema(example_delay: Duration) -> DemoSchema {
    Schema::build(QueryRoot, EmptyMutation, SubscriptionRoot { example_delay }).finish()
}

/// Builds an engine serving [`demo_schema`].
pub async fn demo_engine(example_delay: Duration) -> DemoEngine {
    SchemaEngine::new(demo_schema(example_delay)).await
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::engine::{Execution, GraphQLEngine, GraphQLRequest, GraphQLResponse};
    use futures_util::StreamExt;
    use serde_json::json;

    async fn execute(query: &str, context: RequestContext) -> Execution {
        demo_engine(Duration::from_millis(10))
            .await
            .execute(GraphQLRequest::new(query), context)
            .await
    }

    async fn stream_of(query: &str) -> Vec<GraphQLResponse> {
        let Execution::Stream(stream) = execute(query, RequestContext::default()).await else {
            panic!("expected a stream for {query}");
        };
        stream
            .filter_map(|item| async move { item.ok() })
            .collect()
            .await
    }

    #[tokio::test]
    async fn example_yields_hi_once() {
        let results = stream_of("subscription { example }").await;
        assert_eq!(
            results,
            vec![GraphQLResponse::from_data(json!({"example": "Hi"}))]
        );
    }

    #[tokio::test]
    async fn example_error_is_a_field_error() {
        let results = stream_of("subscription { exampleError }").await;
        let [result] = results.as_slice() else {
            panic!("expected one result, got {results:?}");
        };
        assert_eq!(result.data, None);
        let messages: Vec<&str> = result
            .errors
            .iter()
            .flatten()
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(messages, vec!["This is an example"]);
    }

    #[tokio::test]
    async fn bounded_counter_ends() {
        let results = stream_of("subscription { counter(upTo: 3, intervalMs: 1) }").await;
        let values: Vec<Option<Value>> = results.into_iter().map(|r| r.data).collect();
        assert_eq!(
            values,
            vec![
                Some(json!({"counter": 0})),
                Some(json!({"counter": 1})),
                Some(json!({"counter": 2})),
            ]
        );
    }

    #[tokio::test]
    async fn hello_defaults_to_world() {
        let Execution::Single(response) = execute("{ hello }", RequestContext::default()).await
        else {
            panic!("expected a single result");
        };
        assert_eq!(response.data, Some(json!({"hello": "Hello world!"})));
    }

    #[tokio::test]
    async fn the_same_field_can_be_aliased_twice() {
        let Execution::Single(response) = execute(
            "{ a: hello(name: \"a\") b: hello(name: \"b\") c: hello }",
            RequestContext::default(),
        )
        .await
        else {
            panic!("expected a single result");
        };
        assert_eq!(
            response,
            GraphQLResponse::from_data(
                json!({"a": "Hello a!", "b": "Hello b!", "c": "Hello world!"})
            )
        );
    }

    #[tokio::test]
    async fn connection_params_come_from_the_request_context() {
        let context = RequestContext {
            connection_params: Some(json!({"authToken": "abc"})),
            ..RequestContext::default()
        };
        let Execution::Single(response) = execute("{ connectionParams }", context).await else {
            panic!("expected a single result");
        };
        assert_eq!(
            response.data,
            Some(json!({"connectionParams": {"authToken": "abc"}}))
        );
    }
}
