pub mod event_loop;
pub mod runner;
pub mod state;
pub mod transport;
