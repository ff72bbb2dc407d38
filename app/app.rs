use claim_markets::node::{self, Node};

use crate::cli::Config;

#[derive(Clone)]
pub struct App {
    pub node: Node,
}

impl App {
    pub fn new(config: &Config) -> Result<Self, node::Error> {
        tracing::info!(
            datadir = %config.datadir.display(),
            base_price = %config.market.curve.base_price,
            slope = %config.market.curve.slope,
            initial_pool = %config.market.curve.initial_pool,
            "opening node"
        );
        let node = Node::new(&config.datadir, config.market.clone())?;
        Ok(Self { node })
    }
}
