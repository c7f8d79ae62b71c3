pub mod effects;
pub mod hdmi_sync;
pub mod orchestrator;
pub mod session;

pub use effects::{AmbientEffects, StatusEvent};
pub use hdmi_sync::{HdmiSyncCoordinator, SyncOutcome};
pub use orchestrator::{Collaborators, EventOrchestrator};
pub use session::{SessionManager, SessionSnapshot, SessionTicket};
