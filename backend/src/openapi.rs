//! OpenAPI documentation configuration.

use sse_mcp_types::{Claims, TokenResponse};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::hello,
        crate::health,
        crate::api::token::issue_token,
        crate::api::sse::open_stream,
        crate::api::message::post_message,
    ),
    components(schemas(TokenResponse, Claims)),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Credential issuance"),
        (name = "mcp", description = "MCP session stream and message routing"),
        (name = "System", description = "Liveness endpoints")
    ),
    info(
        title = "SSE MCP Server API",
        version = "0.1.0",
        description = "JWT-gated Model Context Protocol server over HTTP+SSE",
        license(
            name = "MIT OR Apache-2.0"
        )
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` JWT security scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
