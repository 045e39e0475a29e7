pub mod agents;
pub mod ssh_setup;
