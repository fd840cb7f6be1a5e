//! Request counting per route.
//!
//! Endpoints are keyed by their route pattern (`GET /api/v1/attempts/{id}`)
//! rather than the concrete path, so ids do not create one entry each.
//! Requests that match no route all land in `"{method} <unmatched>"`.

use crate::state::AppState;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};

const UNMATCHED_ROUTE: &str = "<unmatched>";

pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService { service }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();

        let app_state = req.app_data::<web::Data<AppState>>().cloned();
        if let Some(state) = &app_state {
            state.increment_request_count();
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration_ms = start_time.elapsed().as_millis() as u64;

            let (is_error, route) = match &result {
                Ok(response) => (
                    response.status().is_client_error() || response.status().is_server_error(),
                    response.request().match_pattern(),
                ),
                Err(_) => (true, None),
            };
            let endpoint = format!("{} {}", method, route.as_deref().unwrap_or(UNMATCHED_ROUTE));

            if let Some(state) = app_state {
                state.record_endpoint_request(&endpoint, duration_ms, is_error);
                if is_error {
                    state.increment_error_count();
                }
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use actix_web::{test, App, HttpResponse};

    #[actix_web::test]
    async fn test_groups_by_route_pattern() {
        let state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .wrap(MetricsMiddleware)
                .route("/items/{id}", web::get().to(|| async { HttpResponse::NotFound().finish() })),
        )
        .await;

        for id in ["a", "b"] {
            let req = test::TestRequest::get().uri(&format!("/items/{}", id)).to_request();
            test::call_service(&app, req).await;
        }

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.request_count, 2);
        assert_eq!(metrics.error_count, 2);
        assert_eq!(metrics.endpoint_metrics["GET /items/{id}"].request_count, 2);
    }

    #[actix_web::test]
    async fn test_unmatched_paths_share_one_entry() {
        let state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .wrap(MetricsMiddleware)
                .configure(crate::handlers::configure),
        )
        .await;

        for i in 0..50 {
            let req = test::TestRequest::get().uri(&format!("/random/{}", i)).to_request();
            assert_eq!(test::call_service(&app, req).await.status(), 404);
        }
        let req = test::TestRequest::post().uri("/nowhere").to_request();
        test::call_service(&app, req).await;

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.endpoint_metrics.len(), 2);
        assert_eq!(metrics.endpoint_metrics["GET <unmatched>"].request_count, 50);
        assert_eq!(metrics.endpoint_metrics["POST <unmatched>"].error_count, 1);
    }
}
