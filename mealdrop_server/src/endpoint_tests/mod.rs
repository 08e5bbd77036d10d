mod helpers;
mod mocks;

mod auth;
mod orders;
mod shops;
