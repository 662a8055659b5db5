//! The request pipeline: transport, client, handler stack and executor.

mod client;
mod requests;
mod stack;
mod transport;

pub use client::HttpClient;
pub use requests::RequestExecutor;
pub use stack::{HandlerStack, Middleware, MiddlewareStack, layer_names};
pub use transport::{BoxedService, HyperTransport, ServiceFuture, Transport};
