pub mod onboard;
pub mod personas;
pub mod serve;
