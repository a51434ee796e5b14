//! `completion/complete` (spec.md §3 method identity list). Unlike
//! tools/prompts/resources this method has no registry of its own — a
//! server wires a single callback that answers completion requests for
//! whichever prompt arguments or resource templates it supports.

use crate::error::ServerResult;
use crate::handler_context::HandlerContext;
use async_trait::async_trait;
use conduit_protocol::completion::{CompleteParams, CompleteResult};

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, params: CompleteParams, ctx: HandlerContext) -> ServerResult<CompleteResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_protocol::completion::Completion;
    use conduit_protocol::ClientCapabilities;

    struct StaticProvider;

    #[async_trait]
    impl CompletionProvider for StaticProvider {
        async fn complete(&self, _params: CompleteParams, _ctx: HandlerContext) -> ServerResult<CompleteResult> {
            Ok(CompleteResult {
                completion: Completion { values: vec!["a".into(), "b".into()], total: Some(2), has_more: Some(false) },
            })
        }
    }

    #[tokio::test]
    async fn a_provider_answers_with_its_candidate_values() {
        let provider = StaticProvider;
        let params = CompleteParams {
            r#ref: conduit_protocol::completion::CompletionReference::Prompt { name: "greet".into() },
            argument: conduit_protocol::completion::CompletionArgument { name: "name".into(), value: "a".into() },
        };
        let ctx = HandlerContext::new(1.into(), ClientCapabilities::default());
        let result = provider.complete(params, ctx).await.unwrap();
        assert_eq!(result.completion.values, vec!["a", "b"]);
    }
}
