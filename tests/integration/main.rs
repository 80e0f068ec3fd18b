//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one workflow against the
//! recording mock transport or the simulated firmware.  Everything runs on
//! the host; timeouts are shortened through `DriverConfig`.

mod auth_flow_tests;
mod mock_transport;
mod scan_flow_tests;
mod sim_flow_tests;
