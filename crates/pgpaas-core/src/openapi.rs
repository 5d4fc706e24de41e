//! OpenAPI schema utilities for merging API documentation from several crates

use utoipa::openapi::OpenApi;

/// Merges additional OpenAPI schemas into `base`.
///
/// Paths, component schemas, responses and tags are combined. When two
/// schemas define the same path or component, the later one wins.
pub fn merge_openapi_schemas(mut base: OpenApi, schemas: Vec<OpenApi>) -> OpenApi {
    for schema in schemas {
        base.paths.paths.extend(schema.paths.paths);

        if let Some(components) = schema.components {
            let base_components = base.components.get_or_insert_with(Default::default);
            base_components.schemas.extend(components.schemas);
            base_components.responses.extend(components.responses);
        }

        if let Some(tags) = schema.tags {
            let base_tags = base.tags.get_or_insert_with(Vec::new);
            base_tags.extend(tags);
        }
    }

    base
}
