pub mod artifact;
pub mod intake;
pub mod orchestrator;
pub mod poller;
pub mod resources;
pub mod state_machine;
pub mod status;
