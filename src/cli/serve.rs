//! linksy serve command implementation

use super::Context;
use crate::error::{Error, Result};
use crate::server;

pub fn run(ctx: &Context, bind: Option<String>) -> Result<()> {
    let storage = ctx.storage()?;
    let mut config = ctx.load_config(&storage)?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    let addr = config.bind_addr()?;
    if config.auth.tokens.is_empty() {
        tracing::warn!("no owner tokens configured; owner endpoints will reject every request");
    }

    let app = crate::service::Linksy::open(storage, config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime
        .block_on(server::serve(app, addr))
        .map_err(|err| Error::OperationFailed(format!("server error: {err:#}")))
}
