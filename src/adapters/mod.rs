//! Adapters: concrete implementations at the edges of the driver core.
//!
//! | Adapter    | Implements         | Connects to                       |
//! |------------|--------------------|-----------------------------------|
//! | `sim`      | ControlTransport   | Simulated firmware + EventQueue   |
//! | `log_sink` | log::Log           | Host stderr                       |

pub mod log_sink;
pub mod sim;
