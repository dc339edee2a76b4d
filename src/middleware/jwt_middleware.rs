/// Access Guard Middleware
///
/// Runs the access guard for every request in the wrapped scope and injects
/// the verified identity into request extensions for route handlers.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{AccessGuard, GuardDecision, RouteAccess};
use crate::error::AppError;

/// Guard middleware for a scope whose routes share one declared access level.
pub struct AccessGuardMiddleware {
    guard: AccessGuard,
    access: RouteAccess,
}

impl AccessGuardMiddleware {
    pub fn new(guard: AccessGuard, access: RouteAccess) -> Self {
        Self { guard, access }
    }

    pub fn public(guard: AccessGuard) -> Self {
        Self::new(guard, RouteAccess::Public)
    }

    pub fn protected(guard: AccessGuard) -> Self {
        Self::new(guard, RouteAccess::Protected)
    }
}

impl<S, B> Transform<S, ServiceRequest> for AccessGuardMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AccessGuardMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AccessGuardMiddlewareService {
            service: Rc::new(service),
            guard: self.guard.clone(),
            access: self.access,
        }))
    }
}

pub struct AccessGuardMiddlewareService<S> {
    service: Rc<S>,
    guard: AccessGuard,
    access: RouteAccess,
}

impl<S, B> Service<ServiceRequest> for AccessGuardMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let authorization = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match self.guard.check(self.access, authorization) {
            Ok(GuardDecision::Public) => {
                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Ok(GuardDecision::Verified(user)) => {
                req.extensions_mut().insert(user);
                tracing::debug!(user_id = %user.user_id, "Access token verified");

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => {
                tracing::warn!(path = %req.path(), "Rejected unauthenticated request");
                Box::pin(async move { Err(AppError::Auth(e).into()) })
            }
        }
    }
}
