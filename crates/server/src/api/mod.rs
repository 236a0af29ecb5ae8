pub mod extract;
pub mod handlers;
pub mod invoices;
pub mod routes;

pub use routes::create_router;
