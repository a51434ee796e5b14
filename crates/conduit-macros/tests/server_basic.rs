//! Exercises `#[server]`/`#[tool]`/`#[prompt]`/`#[resource]` together,
//! mirroring the crate-level doc example: build a small server struct,
//! assemble it into a `Router`, and drive a tool/prompt/resource call
//! through the generated registrations.

use conduit_protocol::envelope::RequestId;
use conduit_protocol::ClientCapabilities;
use conduit_server::HandlerContext;
use std::sync::Arc;

#[derive(Clone)]
struct Calculator;

#[conduit_macros::server(name = "calculator", version = "1.0.0", description = "adds things")]
impl Calculator {
    #[tool("Add two numbers")]
    async fn add(&self, a: i32, b: i32) -> conduit_core::Result<i32> {
        Ok(a + b)
    }

    #[prompt("Describe an addition")]
    async fn describe(&self, operation: String) -> conduit_core::Result<String> {
        Ok(format!("performs {operation}"))
    }

    #[resource("calc://status")]
    async fn status(&self) -> conduit_core::Result<String> {
        Ok("ready".to_string())
    }
}

fn ctx() -> HandlerContext {
    HandlerContext::new(RequestId::Integer(1), ClientCapabilities::default())
}

#[tokio::test]
async fn into_router_registers_the_tagged_tool_prompt_and_resource() {
    let router = Arc::new(Calculator).into_router().expect("no duplicate names");
    assert!(router.tools.has("add"));
    assert!(router.prompts.has("describe"));
    assert!(router.resources.has("calc://status"));
}

#[tokio::test]
async fn the_generated_tool_handler_computes_the_real_result() {
    let calculator = Arc::new(Calculator);
    let router = calculator.into_router().unwrap();
    let result = router.tools.execute("add", serde_json::json!({"a": 2, "b": 3}), ctx()).await.unwrap();
    assert_eq!(result.structured_content, Some(serde_json::json!(5)));
}

#[tokio::test]
async fn the_generated_resource_handler_reads_through_to_the_method() {
    let calculator = Arc::new(Calculator);
    let router = calculator.into_router().unwrap();
    let result = router.resources.execute("calc://status", ctx()).await.unwrap();
    assert_eq!(result.contents.len(), 1);
}
