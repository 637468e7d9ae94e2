mod arena;
mod bus;
mod handle;
mod lights;
mod link;
mod network;
mod scoring;
mod store;

pub use arena::{Arena, ArenaConfig};
pub use bus::{EventBus, SubscriberId, Subscription};
pub use handle::{ArenaHandle, ArenaRequest};
pub use lights::{FieldLights, LogLights};
pub use link::{ControlPacket, DsLinkHandle, DsLinkPeer, LinkCommand};
pub use network::{NetworkProvisioner, NullProvisioner};
pub use scoring::{ReferenceScoreEngine, ScoreEngine};
pub use store::{InMemoryStore, MatchStore};
