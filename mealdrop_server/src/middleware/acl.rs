//! Authentication and access control middleware.
//!
//! [`JwtAuthFactory`] sits on a scope: it verifies the bearer token and parks the decoded
//! [`JwtClaims`] in the request extensions. [`AclMiddlewareFactory`] sits on individual resources
//! inside that scope and checks the parked claims against the roles the route requires. A valid
//! token with the wrong role gets 403; a missing or invalid token gets 401.

use std::pin::Pin;
use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorInternalServerError,
    web,
    Error,
    HttpMessage,
};
use futures::future::{ok, Ready};
use futures::Future;
use mealdrop_engine::db_types::Role;

use crate::{
    auth::{JwtClaims, TokenVerifier},
    errors::AuthError,
};

//----------------------------------- JwtAuthFactory ----------------------------------------------

pub struct JwtAuthFactory;

impl<S, B> Transform<S, ServiceRequest> for JwtAuthFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(JwtAuthService { service: Rc::new(service) })
    }
}

pub struct JwtAuthService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let verifier = req
                .app_data::<web::Data<TokenVerifier>>()
                .ok_or_else(|| {
                    log::error!("🔑️ No token verifier registered on the app");
                    ErrorInternalServerError("No token verifier registered on the app")
                })?
                .clone();
            let claims = verify_bearer(&req, &verifier)?;
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

fn verify_bearer(req: &ServiceRequest, verifier: &TokenVerifier) -> Result<JwtClaims, AuthError> {
    let token = crate::auth::bearer_token(req.request())?;
    verifier.verify(token)
}

//----------------------------------- AclMiddlewareFactory ----------------------------------------

pub struct AclMiddlewareFactory {
    required_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    /// Requires the caller to hold one of `required_roles`. An empty list means any authenticated
    /// caller.
    pub fn new(required_roles: &[Role]) -> Self {
        AclMiddlewareFactory { required_roles: required_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AclMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { required_roles: self.required_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required_roles = self.required_roles.clone();
        Box::pin(async move {
            let claims = req
                .extensions()
                .get::<JwtClaims>()
                .cloned()
                .ok_or(AuthError::MissingToken)?;
            if required_roles.is_empty() || required_roles.contains(&claims.role) {
                service.call(req).await
            } else {
                log::debug!("🔑️ {} holds {} but the route requires {required_roles:?}", claims.sub, claims.role);
                Err(AuthError::InsufficientPermissions(format!("this route is not available to the {} role", claims.role)).into())
            }
        })
    }
}
