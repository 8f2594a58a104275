//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! The route table holds handlers of *different* types in a single
//! `HashMap<String, Route>`. Each one is hidden behind the [`ErasedHandler`]
//! trait object so the table can store them uniformly:
//!
//! ```text
//! async fn get(req: Request) -> Data<Vec<Task>> { … }   ← user writes this
//!        ↓ Routes::on("/api/task/get", get)
//! get.into_boxed_handler()                              ← Handler blanket impl
//!        ↓
//! Rc::new(FnHandler(get))                               ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Rc<dyn ErasedHandler>
//! handler.call(req)  at request time                    ← one vtable dispatch
//!        ↓
//! Box::pin(async { get(req).await.into_reply() })       ← BoxFuture
//! ```
//!
//! Whatever the handler returns, a response, plain data or a `Result` of
//! either, ends up as the same `Result<Reply, Error>` future, so the chain
//! never has to tell synchronous and asynchronous work apart.

use std::future::Future;
use std::rc::Rc;

use crate::middleware::BoxFuture;
use crate::request::Request;
use crate::response::IntoReply;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared by every request hitting its route.
#[doc(hidden)]
pub type BoxedHandler = Rc<dyn ErasedHandler + 'static>;

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure with the shape:
///
/// ```text
/// Fn(Request) -> impl Future<Output = impl IntoReply>
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + 'static,
    Fut: Future<Output = R> + 'static,
    R: IntoReply + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + 'static,
    Fut: Future<Output = R> + 'static,
    R: IntoReply + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Rc::new(FnHandler(self))
    }
}

/// Newtype bridging a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut,
    Fut: Future<Output = R> + 'static,
    R: IntoReply + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_reply() })
    }
}
