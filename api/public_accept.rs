//! GET /api/publicAccept: accept a quote and redirect to the status page.

use std::sync::LazyLock;

use http_body_util::BodyExt;
use hyper::Response;
use vercel_runtime::{Error, Request, ResponseBody};

use quote_relay::handlers::actions;
use quote_relay::{AppError, AppState, Config, Inbound, Reply, logging};

static STATE: LazyLock<Result<AppState, AppError>> = LazyLock::new(AppState::from_env);

async fn handler(request: Request) -> Result<Response<ResponseBody>, Error> {
    let state = match STATE.as_ref() {
        Ok(state) => state,
        Err(error) => return Reply::from(error).into_response(),
    };

    let (parts, body) = request.into_parts();
    let body = body.collect().await?.to_bytes();
    actions::accept(state, Inbound::from_parts(parts, body)).await.into_response()
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logging::init(&Config::from_env());
    if let Err(error) = STATE.as_ref() {
        tracing::error!(%error, "function state could not be built");
    }
    vercel_runtime::run(vercel_runtime::service_fn::<_, (Request,)>(handler)).await
}
