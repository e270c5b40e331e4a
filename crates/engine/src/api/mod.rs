pub mod subgraph;
pub mod telegram;

pub use subgraph::SubgraphClient;
pub use telegram::{Delivery, TelegramClient};
