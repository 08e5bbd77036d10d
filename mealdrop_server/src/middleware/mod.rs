mod acl;

pub use acl::{AclMiddlewareFactory, JwtAuthFactory};
