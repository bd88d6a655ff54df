//! `#[register_handler(crate = ::courier_core)]` from a crate that uses the
//! core directly, without the facade.

use std::sync::Arc;

use courier_core::prelude::*;
use courier_core::{HANDLER_CANDIDATES, Kind};
use courier_macros::register_handler;

struct Ping;

impl Request for Ping {
    type Response = &'static str;
}

#[derive(Default)]
struct PingHandler;

#[register_handler(crate = ::courier_core, scope = shared)]
#[async_trait]
impl RequestHandler<Ping> for PingHandler {
    async fn handle(&self, _: Ping, _: CancellationToken) -> Result<&'static str, BoxError> {
        Ok("pong")
    }
}

struct Echo(String);

impl Request for Echo {
    type Response = String;
}

#[derive(Default)]
struct EchoHandler;

#[register_handler(crate = ::courier_core)]
#[async_trait]
impl RequestHandler<Echo> for EchoHandler {
    async fn handle(&self, req: Echo, _: CancellationToken) -> Result<String, BoxError> {
        Ok(req.0)
    }
}

#[test]
fn candidates_land_in_core_slice() {
    assert_eq!(HANDLER_CANDIDATES.len(), 2);

    let registry = HandlerRegistry::linked().unwrap();
    let ping = registry.binding::<Ping>().unwrap();
    assert_eq!(ping.handler(), Kind::of::<PingHandler>());
    assert_eq!(ping.scope(), Scope::Shared);

    let echo = registry.binding::<Echo>().unwrap();
    assert_eq!(echo.scope(), Scope::PerDispatch);
}

#[tokio::test]
async fn linked_handlers_dispatch() {
    let mut container = Container::new();
    container
        .register_default::<PingHandler>()
        .register_default::<EchoHandler>();

    let registry = HandlerRegistry::linked().unwrap();
    registry.verify(&container).unwrap();
    let sender = Sender::new(Arc::new(registry), Arc::new(container));

    assert_eq!(sender.send(Ping).await.unwrap(), "pong");
    assert_eq!(sender.send(Echo("hi".into())).await.unwrap(), "hi");
}
