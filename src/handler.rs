//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The route table needs to hold handlers of *different* types in a single
//! collection. Rust collections can only hold one concrete type, so we use
//! **trait objects** (`dyn ErasedHandler`) to hide the concrete handler type
//! behind a common interface and store everything uniformly.
//!
//! The chain from user code to vtable call is:
//!
//! ```text
//! async fn show(ctx: Arc<Context>, route: RouteMatch)
//!     -> Result<Output, DispatchError> { … }        ← user writes this
//!        ↓ routes.get("/items/{id}", show)
//! show.into_boxed_handler()                         ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(show))                         ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(ctx, route)  at request time         ← one vtable dispatch
//! ```
//!
//! The only runtime cost per request is one Arc clone plus one virtual call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::DispatchError;
use crate::respond::Output;
use crate::routes::RouteMatch;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Pin<Box<…>>` is required because the async runtime must be able to poll
/// the future in-place; it cannot move it in memory after the first poll.
/// `Send` lets tokio move the future across threads safely.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
/// External crates cannot usefully interact with this trait.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(
        &self,
        ctx: Arc<Context>,
        route: RouteMatch,
    ) -> BoxFuture<'static, Result<Output, DispatchError>>;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(ctx: Arc<Context>, route: RouteMatch) -> Result<Output, DispatchError>
/// ```
///
/// The trait is **sealed** (via the private `Sealed` supertrait): only the
/// blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// The sealing module. Because `Sealed` is private, external crates cannot
/// name it and therefore cannot implement `Handler` on their own types.
mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut> private::Sealed for F
where
    F: Fn(Arc<Context>, RouteMatch) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Output, DispatchError>> + Send + 'static,
{
}

impl<F, Fut> Handler for F
where
    F: Fn(Arc<Context>, RouteMatch) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Output, DispatchError>> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype wrapper that holds a concrete handler `F` and implements
/// [`ErasedHandler`], bridging the typed world to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut> ErasedHandler for FnHandler<F>
where
    F: Fn(Arc<Context>, RouteMatch) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Output, DispatchError>> + Send + 'static,
{
    fn call(
        &self,
        ctx: Arc<Context>,
        route: RouteMatch,
    ) -> BoxFuture<'static, Result<Output, DispatchError>> {
        Box::pin((self.0)(ctx, route))
    }
}
