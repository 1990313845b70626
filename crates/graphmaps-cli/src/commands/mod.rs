// One module per subcommand; main.rs dispatches to these handlers.

pub mod places;
pub mod plot;
pub mod resolve;
pub mod seed;
