//! Request assembly and dispatch.
//!
//! The kind of call made and the rule for reading its answer are decided
//! together, so the caller never re-inspects the shape afterwards.

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use crate::client::{BlockingCompletions, ClientError, Completions};
use crate::model::{assemble, ChatCompletion, ChatRequest, Role};
use crate::shape::{Extractor, Shape};

/// Build the request for `contents` without sending it.
pub fn prepare<'a, R, C>(contents: C, roles: R, model: &str, shape: &Shape, tokens: u32) -> (ChatRequest, Extractor)
where
    R: IntoIterator<Item = Role>,
    C: IntoIterator<Item = &'a Option<String>>,
{
    let (response_format, extractor) = shape.plan();
    let request = ChatRequest {
        model: model.to_string(),
        messages: assemble(contents, roles),
        max_completion_tokens: tokens,
        response_format,
    };

    debug!(
        model = %request.model,
        messages = request.messages.len(),
        shape = shape.label(),
        max_completion_tokens = tokens,
        "Dispatching chat completion"
    );

    (request, extractor)
}

/// Issue the call through `client`; the pending completion comes back with
/// the extractor that reads it.
pub fn dispatch<'a, 'c, K, R, C>(
    client: &'a K,
    contents: C,
    roles: R,
    model: &str,
    shape: &Shape,
    tokens: u32,
) -> (BoxFuture<'a, Result<ChatCompletion, ClientError>>, Extractor)
where
    K: Completions + ?Sized,
    R: IntoIterator<Item = Role>,
    C: IntoIterator<Item = &'c Option<String>>,
{
    let (request, extractor) = prepare(contents, roles, model, shape, tokens);
    let pending = async move { client.complete(&request).await }.boxed();
    (pending, extractor)
}

/// Blocking twin of [`dispatch`]: the call has completed when it returns.
pub fn dispatch_blocking<'c, K, R, C>(
    client: &K,
    contents: C,
    roles: R,
    model: &str,
    shape: &Shape,
    tokens: u32,
) -> (Result<ChatCompletion, ClientError>, Extractor)
where
    K: BlockingCompletions + ?Sized,
    R: IntoIterator<Item = Role>,
    C: IntoIterator<Item = &'c Option<String>>,
{
    let (request, extractor) = prepare(contents, roles, model, shape, tokens);
    (client.complete(&request), extractor)
}
