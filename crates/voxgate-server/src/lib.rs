pub mod error;
pub mod routes;
pub mod session;
pub mod state;
pub mod transport;

pub use error::SessionError;
pub use routes::{create_router, serve};
pub use session::{Session, SessionState};
pub use state::{AppState, SharedScheduler};
pub use transport::{FrameTransport, InboundFrame};
