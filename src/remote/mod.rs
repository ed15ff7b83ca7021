pub mod memory;
pub mod model;
pub mod session;
pub mod store;

pub use memory::MemoryStore;
pub use model::{GameId, GameStatus, PlayerId, PlayerInfo, RemoteGame, Seat};
pub use session::{GameService, Subscription};
pub use store::{Document, GameStore, Watch};
