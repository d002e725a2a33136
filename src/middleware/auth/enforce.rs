/*
 * Responsibility
 * - Put a ProtectedOperation in front of a single route (route_layer)
 * - Expose path parameters, and query parameters the operation declares, as named arguments (#name)
 * - Reject with 401/403 before the handler runs
 */
use axum::{
    body::Body,
    extract::{RawPathParams, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use crate::error::AppError;
use crate::services::authz::{Arguments, ProtectedOperation};

/// Guard one method route with `op`.
///
/// ```ignore
/// .route("/users/{userId}", enforce::protect(get(get_user), op))
/// ```
pub fn protect<S>(route: MethodRouter<S>, op: ProtectedOperation) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.route_layer(middleware::from_fn_with_state(op, enforce_middleware))
}

async fn enforce_middleware(
    State(op): State<ProtectedOperation>,
    params: RawPathParams,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let args = request_arguments(&op, &params, req.uri().query());
    op.authorize(&args)?;
    Ok(next.run(req).await)
}

/// Path parameters are always bound (the route template names them). Query
/// parameters are bound only when the operation declares them, so a caller
/// cannot introduce an argument the rule reads. A path segment wins on a clash.
fn request_arguments(
    op: &ProtectedOperation,
    params: &RawPathParams,
    query: Option<&str>,
) -> Arguments {
    let mut args = Arguments::new();
    if let Some(query) = query {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if op.declares(&name) {
                args.insert(name.into_owned(), value.into_owned());
            }
        }
    }
    for (name, value) in params.iter() {
        args.insert(name, value);
    }
    args
}
