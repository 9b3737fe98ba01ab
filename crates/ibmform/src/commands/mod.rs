pub mod apply;
pub mod auth;
pub mod destroy;
pub mod import;
pub mod plan;
pub mod providers;
pub mod schema;
pub mod state;
pub mod validate;
