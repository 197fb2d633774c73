//! [`GraphQLEngine`] backed by an `async-graphql` [`Schema`].
//!
//! Parsing and execution are delegated to `async-graphql`. `validate` adds a
//! cheap up-front pass so request-level problems can be answered with a
//! single `error` frame: a nesting-depth guard, a syntax check and a
//! root-field check against the schema's root types.

use std::collections::HashSet;
use std::fmt;

use async_graphql::parser::types::{ExecutableDocument, OperationType, Selection};
use async_graphql::parser::{self, Pos};
use async_graphql::{ObjectType, Schema, ServerError, SubscriptionType, Variables};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;

use super::GraphQLEngine;
use super::types::{
    Execution, GraphQLError, GraphQLRequest, GraphQLResponse, PathSegment, RequestContext,
    SourceLocation,
};

/// Deepest `{`/`[`/`(` nesting accepted in a document.
pub const MAX_NESTING_DEPTH: usize = 64;

const ROOT_TYPES_QUERY: &str = "{ __schema { \
    queryType { name fields(includeDeprecated: true) { name } } \
    mutationType { name fields(includeDeprecated: true) { name } } \
    subscriptionType { name fields(includeDeprecated: true) { name } } } }";

/// Engine serving an `async-graphql` schema.
///
/// The [`RequestContext`] of every request is added to the request data, so
/// resolvers can read it with `ctx.data_opt::<RequestContext>()`.
pub struct SchemaEngine<Query, Mutation, Subscription> {
    schema: Schema<Query, Mutation, Subscription>,
    roots: RootTypes,
}

impl<Query, Mutation, Subscription> fmt::Debug for SchemaEngine<Query, Mutation, Subscription> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaEngine")
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

impl<Query, Mutation, Subscription> SchemaEngine<Query, Mutation, Subscription>
where
    Query: ObjectType + 'static,
    Mutation: ObjectType + 'static,
    Subscription: SubscriptionType + 'static,
{
    /// Wraps `schema`, introspecting its root types once.
    pub async fn new(schema: Schema<Query, Mutation, Subscription>) -> Self {
        let response = schema.execute(ROOT_TYPES_QUERY).await;
        let roots = match response
            .data
            .into_json()
            .and_then(serde_json::from_value::<Introspection>)
        {
            Ok(introspection) => RootTypes::from(introspection.schema),
            Err(e) => {
                tracing::warn!(error = %e, "root type introspection failed");
                RootTypes::default()
            }
        };
        Self { schema, roots }
    }
}

#[async_trait]
impl<Query, Mutation, Subscription> GraphQLEngine for SchemaEngine<Query, Mutation, Subscription>
where
    Query: ObjectType + 'static,
    Mutation: ObjectType + 'static,
    Subscription: SubscriptionType + 'static,
{
    fn validate(&self, query: &str) -> Result<(), Vec<GraphQLError>> {
        check_nesting(query).map_err(|e| vec![e])?;
        let document = parser::parse_query(query).map_err(|e| vec![syntax_error(query, &e)])?;
        let errors = self.roots.check(&document);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    async fn execute(&self, request: GraphQLRequest, context: RequestContext) -> Execution {
        let subscription = operation_type(&request) == Some(OperationType::Subscription);
        let request = into_request(request, context);
        if subscription {
            let results = self
                .schema
                .execute_stream(request)
                .map(|response| Ok(from_response(response)));
            Execution::Stream(results.boxed())
        } else {
            Execution::Single(from_response(self.schema.execute(request).await))
        }
    }
}

#[derive(Debug, Deserialize)]
struct Introspection {
    #[serde(rename = "__schema")]
    schema: IntrospectedRoots,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectedRoots {
    query_type: Option<IntrospectedType>,
    mutation_type: Option<IntrospectedType>,
    subscription_type: Option<IntrospectedType>,
}

#[derive(Debug, Deserialize)]
struct IntrospectedType {
    name: String,
    #[serde(default)]
    fields: Option<Vec<IntrospectedField>>,
}

#[derive(Debug, Deserialize)]
struct IntrospectedField {
    name: String,
}

#[derive(Debug)]
struct RootType {
    name: String,
    fields: HashSet<String>,
}

impl RootType {
    fn from_introspection(introspected: Option<IntrospectedType>) -> Option<Self> {
        let introspected = introspected?;
        let fields: HashSet<String> = introspected
            .fields
            .unwrap_or_default()
            .into_iter()
            .map(|field| field.name)
            .collect();
        (!fields.is_empty()).then_some(Self {
            name: introspected.name,
            fields,
        })
    }
}

/// Root types of a schema and their field names.
#[derive(Debug, Default)]
struct RootTypes {
    query: Option<RootType>,
    mutation: Option<RootType>,
    subscription: Option<RootType>,
}

impl From<IntrospectedRoots> for RootTypes {
    fn from(roots: IntrospectedRoots) -> Self {
        Self {
            query: RootType::from_introspection(roots.query_type),
            mutation: RootType::from_introspection(roots.mutation_type),
            subscription: RootType::from_introspection(roots.subscription_type),
        }
    }
}

impl RootTypes {
    fn get(&self, kind: OperationType) -> Option<&RootType> {
        match kind {
            OperationType::Query => self.query.as_ref(),
            OperationType::Mutation => self.mutation.as_ref(),
            OperationType::Subscription => self.subscription.as_ref(),
        }
    }

    fn check(&self, document: &ExecutableDocument) -> Vec<GraphQLError> {
        let mut errors = Vec::new();

        for (name, operation) in document.operations.iter() {
            let kind = operation.node.ty;
            let Some(root) = self.get(kind) else {
                let plural = match kind {
                    OperationType::Query => "queries",
                    OperationType::Mutation => "mutations",
                    OperationType::Subscription => "subscriptions",
                };
                errors.push(
                    GraphQLError::new(format!("Schema is not configured for {plural}."))
                        .at(location(operation.pos)),
                );
                continue;
            };

            let fields: Vec<_> = operation
                .node
                .selection_set
                .node
                .items
                .iter()
                .filter_map(|selection| match &selection.node {
                    Selection::Field(field) => Some(field),
                    _ => None,
                })
                .collect();

            if kind == OperationType::Subscription
                && let Some(extra) = fields.get(1)
            {
                let message = match name {
                    Some(name) => {
                        format!("Subscription '{name}' must select only one top level field.")
                    }
                    None => {
                        "Anonymous Subscription must select only one top level field.".to_string()
                    }
                };
                errors.push(GraphQLError::new(message).at(location(extra.pos)));
            }

            for field in fields {
                let field_name = field.node.name.node.as_str();
                if field_name.starts_with("__") {
                    if kind == OperationType::Subscription {
                        errors.push(
                            GraphQLError::new(
                                "Subscription must not select an introspection top level field.",
                            )
                            .at(location(field.pos)),
                        );
                    }
                    continue;
                }
                if !root.fields.contains(field_name) {
                    let message = match kind {
                        OperationType::Subscription => {
                            format!("The subscription field '{field_name}' is not defined.")
                        }
                        _ => format!("Cannot query field '{field_name}' on type '{}'.", root.name),
                    };
                    errors.push(GraphQLError::new(message).at(location(field.pos)));
                }
            }
        }
        errors
    }
}

/// Rejects documents nested deeper than [`MAX_NESTING_DEPTH`].
///
/// A linear scan over brackets outside strings and comments, run before the
/// recursive parser ever sees the document.
fn check_nesting(query: &str) -> Result<(), GraphQLError> {
    let mut depth = 0_usize;
    let mut line = 1;
    let mut column = 0;
    let mut in_string = false;
    let mut in_comment = false;
    let mut escaped = false;

    for c in query.chars() {
        if c == '\n' {
            line += 1;
            column = 0;
            in_comment = false;
            continue;
        }
        column += 1;

        if in_comment {
            continue;
        }
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '#' => in_comment = true,
            '"' => in_string = true,
            '{' | '[' | '(' => {
                depth += 1;
                if depth > MAX_NESTING_DEPTH {
                    return Err(GraphQLError::new(format!(
                        "Document nesting exceeds the maximum depth of {MAX_NESTING_DEPTH}."
                    ))
                    .at(SourceLocation::new(line, column)));
                }
            }
            '}' | ']' | ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

fn syntax_error(query: &str, error: &parser::Error) -> GraphQLError {
    let message = match error {
        parser::Error::Syntax { start, .. } if rest_is_blank(query, *start) => {
            "Syntax Error: Unexpected <EOF>.".to_string()
        }
        parser::Error::Syntax { message, .. } => format!("Syntax Error: {}", describe(message)),
        other => other.to_string(),
    };
    let locations: Vec<SourceLocation> = error.positions().map(location).collect();
    GraphQLError {
        message,
        locations: (!locations.is_empty()).then_some(locations),
        path: None,
    }
}

/// Returns `true` if nothing but whitespace follows `pos`.
fn rest_is_blank(query: &str, pos: Pos) -> bool {
    query
        .split('\n')
        .skip(pos.line.saturating_sub(1))
        .enumerate()
        .all(|(i, line)| {
            let skip = if i == 0 { pos.column.saturating_sub(1) } else { 0 };
            line.chars().skip(skip).all(char::is_whitespace)
        })
}

/// Condenses a multi-line parser diagnostic to its `= expected ...` line.
fn describe(message: &str) -> String {
    let detail = message
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("= "))
        .unwrap_or_else(|| message.trim());
    let mut chars = detail.chars();
    match chars.next() {
        Some(first) => format!(
            "{}{}.",
            first.to_uppercase(),
            chars.as_str().trim_end_matches('.')
        ),
        None => "Invalid document.".to_string(),
    }
}

fn location(pos: Pos) -> SourceLocation {
    SourceLocation::new(pos.line, pos.column)
}

/// Type of the operation `request` selects, if it can be determined.
fn operation_type(request: &GraphQLRequest) -> Option<OperationType> {
    let document = parser::parse_query(&request.query).ok()?;
    let mut operations = document.operations.iter();
    let selected = match request.operation_name.as_deref() {
        Some(wanted) => operations.find(|(name, _)| name.is_some_and(|n| n.as_str() == wanted)),
        None => operations.next(),
    };
    selected.map(|(_, operation)| operation.node.ty)
}

fn into_request(request: GraphQLRequest, context: RequestContext) -> async_graphql::Request {
    let mut converted = async_graphql::Request::new(request.query).data(context);
    if let Some(variables) = request.variables {
        converted = converted.variables(Variables::from_json(Value::Object(variables)));
    }
    if let Some(name) = request.operation_name {
        converted = converted.operation_name(name);
    }
    converted
}

fn from_response(response: async_graphql::Response) -> GraphQLResponse {
    let data = match response.data.into_json() {
        Ok(Value::Null) => None,
        Ok(data) => Some(data),
        Err(e) => {
            tracing::warn!(error = %e, "result data is not representable as JSON");
            None
        }
    };
    let errors: Vec<GraphQLError> = response.errors.into_iter().map(from_server_error).collect();
    GraphQLResponse {
        data,
        errors: (!errors.is_empty()).then_some(errors),
    }
}

fn from_server_error(error: ServerError) -> GraphQLError {
    let locations: Vec<SourceLocation> = error.locations.into_iter().map(location).collect();
    let path: Vec<PathSegment> = error
        .path
        .into_iter()
        .map(|segment| match segment {
            async_graphql::PathSegment::Field(name) => PathSegment::Field(name),
            async_graphql::PathSegment::Index(index) => PathSegment::Index(index),
        })
        .collect();
    GraphQLError {
        message: error.message,
        locations: (!locations.is_empty()).then_some(locations),
        path: (!path.is_empty()).then_some(path),
    }
}
